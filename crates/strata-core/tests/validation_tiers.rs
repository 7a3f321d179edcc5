//! # Validation Tier Tests (T0-T5)
//!
//! End-to-end scenarios through the gateway. If ANY tier fails, the
//! pipeline is INVALID.
//!
//! ## Tiers
//! - T0: Happy path (derivation chain, provenance, promotion)
//! - T1: Shape rejection
//! - T2: Logic contradiction
//! - T3: Tolerance gating across layers
//! - T4: Commit atomicity and rollback
//! - T5: Concurrent commits into one session

use std::sync::atomic::{AtomicBool, Ordering};
use strata_core::{
    AgentId, ContradictionKind, DeltaOperation, ErrorCategory, GateError, Gateway, Graph,
    GraphName, Iri, LayerStore, MemoryStore, Permission, PipelineState, RedbStore, SessionId,
    ShapeSet, Snapshot, StoreError, StrataConfig, Triple, parse_graph,
};

const BASE: &str = "http://example.org";

const DUBAI: &str = r#"
    tourism:Dubai a tourism:City ; tourism:isCoastal true .
    tourism:DubaiAquarium a tourism:Attraction ;
        tourism:locatedIn tourism:Dubai ;
        tourism:hasAmenity "Playground" ;
        tourism:hasRating 4.6 .
"#;

fn agent(name: &str) -> AgentId {
    AgentId::new(name).expect("agent id")
}

fn session(name: &str) -> SessionId {
    SessionId::new(name).expect("session id")
}

fn staging_uri(name: &str) -> String {
    GraphName::Staging(agent(name)).uri(BASE)
}

fn gateway_over<S: LayerStore>(store: S) -> Gateway<S> {
    let gateway = Gateway::new(StrataConfig::default(), store, Box::new(ShapeSet::standard()))
        .expect("gateway");
    for name in ["a1", "a2"] {
        gateway
            .register_agent(
                agent(name),
                &format!("{name}-secret"),
                &[Permission::Read, Permission::WriteStaging, Permission::WriteConsensus],
            )
            .expect("register");
    }
    gateway
}

fn gateway() -> Gateway<MemoryStore> {
    gateway_over(MemoryStore::new())
}

fn layer<S: LayerStore>(gateway: &Gateway<S>, name: &GraphName) -> Graph {
    gateway.store().fetch(name).expect("fetch")
}

/// Seed Main directly, bypassing the gates.
fn seed_main<S: LayerStore>(gateway: &Gateway<S>, turtle: &str) {
    let mut snapshot = Snapshot::default();
    snapshot
        .layers
        .insert(GraphName::Main, parse_graph(turtle).expect("parse"));
    gateway.import_snapshot(&snapshot).expect("import");
}

// =============================================================================
// TIER T0: HAPPY PATH
// =============================================================================

mod t0_happy_path {
    use super::*;

    /// T0.1: The Dubai delta derives the full chain.
    #[test]
    fn dubai_derives_destination() {
        let gateway = gateway();
        let result =
            gateway.submit_delta(&agent("a1"), &session("s1"), &staging_uri("a1"), DUBAI, DeltaOperation::Add);
        assert!(result.success, "{result:?}");
        assert!(result.reached_fixpoint);

        let derived: Vec<&Triple> = result.derived.iter().map(|i| &i.triple).collect();
        let aquarium = Iri::tourism("DubaiAquarium");
        assert!(derived.contains(&&Triple::typed(aquarium.clone(), Iri::tourism("CoastalAttraction"))));
        assert!(derived.contains(&&Triple::typed(aquarium, Iri::tourism("FamilyFriendlyAttraction"))));

        let destination = Iri::tourism("CoastalFamilyDestination_Dubai_DubaiAquarium");
        let destinations: Vec<&&Triple> = derived
            .iter()
            .filter(|t| t.subject == destination)
            .collect();
        assert!(destinations.iter().any(|t| t.predicate == Iri::tourism("hasCity")));
        assert!(destinations.iter().any(|t| t.predicate == Iri::tourism("hasPrimaryAttraction")));
    }

    /// T0.2: Every derived fact is attributed to the requester.
    #[test]
    fn provenance_attributes_requester() {
        let gateway = gateway();
        let result =
            gateway.submit_delta(&agent("a1"), &session("s1"), &staging_uri("a1"), DUBAI, DeltaOperation::Add);
        let records = gateway.provenance(Some(&agent("a1")));
        assert_eq!(records.len(), result.derived.len());
        assert!(records.iter().all(|r| r.session_id == session("s1")));
        assert!(records.iter().all(|r| r.graph == staging_uri("a1")));
        assert!(gateway.provenance(Some(&agent("a2"))).is_empty());
    }

    /// T0.3: Staging → Consensus → Main moves asserted triples only.
    #[test]
    fn two_stage_commit_promotes_asserted_triples() {
        let gateway = gateway();
        let (a1, s1) = (agent("a1"), session("s1"));
        assert!(gateway.submit_delta(&a1, &s1, &staging_uri("a1"), DUBAI, DeltaOperation::Add).success);
        assert!(gateway.commit_session(&a1, &s1, &staging_uri("a1")).success);
        assert!(gateway.promote_session(&a1, &s1).success);

        let main = layer(&gateway, &GraphName::Main);
        assert_eq!(main, parse_graph(DUBAI).expect("parse"));
        assert!(layer(&gateway, &GraphName::Consensus(s1)).is_empty());
        assert!(layer(&gateway, &GraphName::Staging(a1)).is_empty());

        let metrics = gateway.metrics();
        assert_eq!(metrics.successful, 3);
        assert_eq!(metrics.failed, 0);
    }
}

// =============================================================================
// TIER T1: SHAPE REJECTION
// =============================================================================

mod t1_shape_rejection {
    use super::*;

    /// T1.1: A non-numeric entry fee fails the shape gate; nothing is written.
    #[test]
    fn non_numeric_fee_rejected() {
        let gateway = gateway();
        let payload = r#"tourism:BurjKhalifa a tourism:Attraction ;
            tourism:locatedIn tourism:Dubai ;
            tourism:hasEntryFeeAmount "free" ."#;
        let result =
            gateway.submit_delta(&agent("a1"), &session("s1"), &staging_uri("a1"), payload, DeltaOperation::Add);

        assert!(!result.success);
        assert_eq!(result.failed_gate, Some(PipelineState::ShapeValid));
        assert!(!result.errors.is_empty());
        assert!(result.errors.iter().all(|e| matches!(e, GateError::Shape(_))));
        assert!(result.derived.is_empty());
        assert!(layer(&gateway, &GraphName::Staging(agent("a1"))).is_empty());
        assert_eq!(gateway.metrics().shape_violations, 1);
    }

    /// T1.2: Every violation of the gate is reported, not just the first.
    #[test]
    fn all_violations_reported() {
        let gateway = gateway();
        let payload = r#"tourism:X a tourism:Attraction ;
            tourism:hasEntryFeeAmount "free" ;
            tourism:hasEntryFeeCurrency "GBP" ."#;
        let result =
            gateway.submit_delta(&agent("a1"), &session("s1"), &staging_uri("a1"), payload, DeltaOperation::Add);
        assert_eq!(result.errors.len(), 2);
    }

    /// T1.3: An integer rating too large for any exact value is not a decimal.
    #[test]
    fn oversized_integer_rating_rejected() {
        let gateway = gateway();
        let payload = r#"tourism:Reef a tourism:Attraction ;
            tourism:hasName "Reef" ;
            tourism:hasRating "99999999999999999999"^^xsd:integer ."#;
        let result =
            gateway.submit_delta(&agent("a1"), &session("s1"), &staging_uri("a1"), payload, DeltaOperation::Add);

        assert!(!result.success);
        assert_eq!(result.failed_gate, Some(PipelineState::ShapeValid));
        assert!(layer(&gateway, &GraphName::Staging(agent("a1"))).is_empty());
    }
}

// =============================================================================
// TIER T2: LOGIC CONTRADICTION
// =============================================================================

mod t2_contradiction {
    use super::*;

    /// T2.1: Playground + minimum age 16 is both family-friendly and not.
    #[test]
    fn family_friendly_conflict_rejected() {
        let gateway = gateway();
        let payload = r#"tourism:SkyDive a tourism:Attraction ;
            tourism:hasAmenity "Playground" ;
            tourism:hasMinAge 16 ."#;
        let result =
            gateway.submit_delta(&agent("a1"), &session("s1"), &staging_uri("a1"), payload, DeltaOperation::Add);

        assert_eq!(result.failed_gate, Some(PipelineState::Reasoned));
        assert_eq!(result.category(), Some(ErrorCategory::Contradiction));
        assert_eq!(result.errors.len(), 1);
        let GateError::Contradiction(contradiction) = &result.errors[0] else {
            unreachable!("category checked above");
        };
        assert_eq!(contradiction.entity, Iri::tourism("SkyDive"));
        assert_eq!(contradiction.kind, ContradictionKind::DisjointClass);
        assert!(layer(&gateway, &GraphName::Staging(agent("a1"))).is_empty());
        assert!(gateway.provenance(None).is_empty());
    }

    /// T2.2: Asserting both types directly is caught before reasoning.
    #[test]
    fn asserted_disjoint_types_rejected_at_agent_gate() {
        let gateway = gateway();
        let payload = "tourism:Park a tourism:FamilyFriendlyAttraction , tourism:NotFamilyFriendlyAttraction .";
        let result =
            gateway.submit_delta(&agent("a1"), &session("s1"), &staging_uri("a1"), payload, DeltaOperation::Add);
        assert_eq!(result.failed_gate, Some(PipelineState::AgentConsistent));
        assert_eq!(result.category(), Some(ErrorCategory::Consistency));
    }

    /// T2.3: A contradiction already sitting in Staging stops the commit
    /// before anything reaches Consensus.
    #[test]
    fn contradiction_rejects_commit_before_promotion() {
        let gateway = gateway();
        let (a1, s1) = (agent("a1"), session("s1"));
        let staged = parse_graph(
            r#"tourism:SkyDive a tourism:Attraction ;
                tourism:hasAmenity "Playground" ;
                tourism:hasMinAge 16 ."#,
        )
        .expect("parse");
        let consensus = parse_graph("tourism:Dubai a tourism:City ; tourism:isCoastal true .")
            .expect("parse");
        let mut snapshot = Snapshot::default();
        snapshot
            .layers
            .insert(GraphName::Staging(a1.clone()), staged.clone());
        snapshot
            .layers
            .insert(GraphName::Consensus(s1.clone()), consensus.clone());
        gateway.import_snapshot(&snapshot).expect("import");

        let result = gateway.commit_session(&a1, &s1, &staging_uri("a1"));

        assert!(!result.success);
        assert_eq!(result.failed_gate, Some(PipelineState::Reasoned));
        assert_eq!(result.category(), Some(ErrorCategory::Contradiction));
        assert_eq!(layer(&gateway, &GraphName::Consensus(s1)), consensus);
        assert_eq!(layer(&gateway, &GraphName::Staging(a1)), staged);
        assert!(layer(&gateway, &GraphName::Main).is_empty());
    }
}

// =============================================================================
// TIER T3: TOLERANCE GATING
// =============================================================================

mod t3_tolerance {
    use super::*;

    const MAIN_RATING: &str = "tourism:Aquarium a tourism:Attraction ; tourism:hasRating 4.0 .";

    /// T3.1: 4.0 in Main vs 4.8 staged is drift; it merges and supersedes.
    #[test]
    fn drift_within_tolerance_merges() {
        let gateway = gateway();
        seed_main(&gateway, MAIN_RATING);
        let (a1, s1) = (agent("a1"), session("s1"));
        let result = gateway.submit_delta(
            &a1,
            &s1,
            &staging_uri("a1"),
            "tourism:Aquarium tourism:hasRating 4.8 .",
            DeltaOperation::Add,
        );
        assert!(result.success, "{result:?}");
        assert!(gateway.commit_session(&a1, &s1, &staging_uri("a1")).success);
        assert!(gateway.promote_session(&a1, &s1).success);

        let main = layer(&gateway, &GraphName::Main);
        let ratings = main.objects(&Iri::tourism("Aquarium"), &Iri::tourism("hasRating"));
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].to_string(), "4.8");
    }

    /// T3.2: 4.0 in Main vs 5.5 staged differs by 1.5 and is flagged.
    #[test]
    fn jump_beyond_tolerance_flagged() {
        let gateway = gateway();
        seed_main(&gateway, MAIN_RATING);
        let result = gateway.submit_delta(
            &agent("a1"),
            &session("s1"),
            &staging_uri("a1"),
            "tourism:Aquarium tourism:hasRating 5.5 .",
            DeltaOperation::Add,
        );
        assert_eq!(result.failed_gate, Some(PipelineState::AgentConsistent));
        assert!(result.errors.iter().any(|e| matches!(
            e,
            GateError::Consistency(c) if c.kind == ContradictionKind::CrossLayer
        )));
    }

    /// T3.3: Non-numeric values need an exact match across layers.
    #[test]
    fn boolean_conflict_with_consensus_flagged() {
        let gateway = gateway();
        let s1 = session("s1");
        let city = "tourism:Dubai a tourism:City ; tourism:isCoastal true .";
        assert!(gateway.submit_delta(&agent("a1"), &s1, &staging_uri("a1"), city, DeltaOperation::Add).success);
        assert!(gateway.commit_session(&agent("a1"), &s1, &staging_uri("a1")).success);

        let result = gateway.submit_delta(
            &agent("a2"),
            &s1,
            &staging_uri("a2"),
            "tourism:Dubai tourism:isCoastal false .",
            DeltaOperation::Add,
        );
        assert_eq!(result.failed_gate, Some(PipelineState::AgentConsistent));
        assert_eq!(gateway.metrics().consistency_violations, 1);
    }

    /// T3.4: Extra fractional digits are not rounded into the valid range.
    #[test]
    fn rating_just_above_bound_flagged() {
        let gateway = gateway();
        let result = gateway.submit_delta(
            &agent("a1"),
            &session("s1"),
            &staging_uri("a1"),
            "tourism:Reef tourism:hasRating 5.0000001 .",
            DeltaOperation::Add,
        );
        assert_eq!(result.failed_gate, Some(PipelineState::GloballyConsistent));
        assert!(result.errors.iter().any(|e| matches!(
            e,
            GateError::Consistency(c) if c.kind == ContradictionKind::Range
        )));
        assert!(layer(&gateway, &GraphName::Staging(agent("a1"))).is_empty());
    }
}

// =============================================================================
// TIER T4: COMMIT ATOMICITY
// =============================================================================

mod t4_atomicity {
    use super::*;

    /// Store that slips extra triples into the first Consensus write, as a
    /// writer outside the gateway would.
    struct TamperingStore {
        inner: MemoryStore,
        armed: AtomicBool,
        extra: Graph,
    }

    impl LayerStore for TamperingStore {
        fn fetch(&self, graph: &GraphName) -> Result<Graph, StoreError> {
            self.inner.fetch(graph)
        }

        fn insert(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError> {
            self.inner.insert(graph, triples)
        }

        fn delete(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError> {
            self.inner.delete(graph, triples)
        }

        fn clear(&self, graph: &GraphName) -> Result<(), StoreError> {
            self.inner.clear(graph)
        }

        fn replace(&self, graph: &GraphName, content: &Graph) -> Result<(), StoreError> {
            if matches!(graph, GraphName::Consensus(_)) && self.armed.swap(false, Ordering::SeqCst) {
                return self.inner.replace(graph, &content.union(&self.extra));
            }
            self.inner.replace(graph, content)
        }

        fn graph_names(&self) -> Result<Vec<GraphName>, StoreError> {
            self.inner.graph_names()
        }
    }

    /// T4.1: A failing second gate restores Consensus and keeps Staging.
    #[test]
    fn failed_second_gate_rolls_back() {
        let gateway = gateway_over(TamperingStore {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
            extra: parse_graph("tourism:Reef a tourism:Attraction ; tourism:hasRating 7.0 .")
                .expect("parse"),
        });
        let (a1, s1) = (agent("a1"), session("s1"));
        let city = "tourism:Dubai a tourism:City ; tourism:isCoastal true .";
        assert!(gateway.submit_delta(&a1, &s1, &staging_uri("a1"), city, DeltaOperation::Add).success);

        gateway.store().armed.store(true, Ordering::SeqCst);
        let result = gateway.commit_session(&a1, &s1, &staging_uri("a1"));

        assert!(!result.success);
        assert!(result.rolled_back);
        assert_eq!(result.failed_gate, Some(PipelineState::GloballyConsistent));
        assert!(layer(&gateway, &GraphName::Main).is_empty());
        assert!(layer(&gateway, &GraphName::Consensus(s1)).is_empty());
        assert_eq!(layer(&gateway, &GraphName::Staging(a1)), parse_graph(city).expect("parse"));
        assert_eq!(gateway.metrics().rollbacks, 1);
    }

    /// T4.2: A rejected promotion leaves Main exactly as it was.
    #[test]
    fn rejected_promotion_keeps_main() {
        let gateway = gateway();
        seed_main(&gateway, "tourism:Dubai a tourism:City ; tourism:isCoastal false .");
        let before = layer(&gateway, &GraphName::Main);

        // Consensus written around the gates so it disagrees with Main.
        let mut snapshot = Snapshot::default();
        snapshot.layers.insert(
            GraphName::Consensus(session("s1")),
            parse_graph("tourism:Dubai tourism:isCoastal true .").expect("parse"),
        );
        gateway.import_snapshot(&snapshot).expect("import");

        let result = gateway.promote_session(&agent("a1"), &session("s1"));
        assert!(!result.success);
        assert_eq!(layer(&gateway, &GraphName::Main), before);
        assert_eq!(layer(&gateway, &GraphName::Consensus(session("s1"))).len(), 1);
    }

    /// T4.3: The disk store gives the same outcome and keeps it on reopen.
    #[test]
    fn redb_backed_commit_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("strata.redb");
        {
            let gateway = gateway_over(RedbStore::open(&path).expect("open"));
            let (a1, s1) = (agent("a1"), session("s1"));
            assert!(gateway.submit_delta(&a1, &s1, &staging_uri("a1"), DUBAI, DeltaOperation::Add).success);
            assert!(gateway.commit_session(&a1, &s1, &staging_uri("a1")).success);
        }
        let store = RedbStore::open(&path).expect("reopen");
        assert_eq!(
            store.fetch(&GraphName::Consensus(session("s1"))).expect("fetch"),
            parse_graph(DUBAI).expect("parse")
        );
    }
}

// =============================================================================
// TIER T5: CONCURRENT COMMITS
// =============================================================================

mod t5_concurrency {
    use super::*;

    /// T5.1: Two conflicting commits into one session: exactly one wins.
    #[test]
    fn conflicting_commits_are_serialized() {
        let gateway = gateway();
        let s1 = session("s1");
        for (name, value) in [("a1", "true"), ("a2", "false")] {
            let payload = format!("tourism:Dubai a tourism:City ; tourism:isCoastal {value} .");
            let result =
                gateway.submit_delta(&agent(name), &s1, &staging_uri(name), &payload, DeltaOperation::Add);
            assert!(result.success, "{result:?}");
        }

        let results: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = ["a1", "a2"]
                .into_iter()
                .map(|name| {
                    let (gateway, s1) = (&gateway, &s1);
                    scope.spawn(move || {
                        gateway
                            .commit_session(&agent(name), s1, &staging_uri(name))
                            .success
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("commit thread"))
                .collect()
        });

        assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
        let consensus = layer(&gateway, &GraphName::Consensus(s1));
        let values = consensus.objects(&Iri::tourism("Dubai"), &Iri::tourism("isCoastal"));
        assert_eq!(values.len(), 1);
    }
}
