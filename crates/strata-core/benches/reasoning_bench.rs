//! # Reasoning Benchmarks
//!
//! Performance benchmarks for strata-core reasoning and gate checks.
//!
//! Run with: `cargo bench -p strata-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use strata_core::{
    Decimal, Graph, Iri, Literal, OntologyConstraints, Reasoner, RuleSet, ShapeSet,
    ShapeValidator, Triple,
};

/// Create `size` coastal cities, each with one family-friendly attraction.
fn create_tourism_graph(size: usize) -> Graph {
    let t = Iri::tourism;
    let mut graph = Graph::new();
    for i in 0..size {
        let city = t(&format!("City{i}"));
        let attraction = t(&format!("Attraction{i}"));
        graph.insert(Triple::typed(city.clone(), t("City")));
        graph.insert(Triple::new(city.clone(), t("isCoastal"), Literal::boolean(i % 2 == 0)));
        graph.insert(Triple::typed(attraction.clone(), t("Attraction")));
        graph.insert(Triple::new(attraction.clone(), t("locatedIn"), city));
        graph.insert(Triple::new(attraction.clone(), t("hasAmenity"), Literal::string("Playground")));
        graph.insert(Triple::new(
            attraction,
            t("hasRating"),
            Literal::decimal(Decimal::from_millionths(4_600_000)),
        ));
    }
    graph
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_reasoning(c: &mut Criterion) {
    let mut group = c.benchmark_group("reasoning");
    let reasoner = Reasoner::new(RuleSet::standard());

    for size in [10, 100, 1000].iter() {
        let graph = create_tourism_graph(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| {
                let mut view = graph.clone();
                black_box(reasoner.run(&mut view, 10))
            });
        });
    }

    group.finish();
}

fn bench_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("shapes");
    let shapes = ShapeSet::standard();

    for size in [10, 100, 1000].iter() {
        let graph = create_tourism_graph(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| black_box(shapes.validate(graph)));
        });
    }

    group.finish();
}

fn bench_global_consistency(c: &mut Criterion) {
    let mut group = c.benchmark_group("global_consistency");
    let constraints = OntologyConstraints::standard();

    for size in [10, 100, 1000].iter() {
        let graph = create_tourism_graph(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| black_box(constraints.check_global(graph)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_reasoning,
    bench_shapes,
    bench_global_consistency
);
criterion_main!(benches);
