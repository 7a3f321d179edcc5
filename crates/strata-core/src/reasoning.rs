//! # Reasoning Engine
//!
//! Forward chaining to a fixpoint.
//!
//! Each round evaluates every derivation rule, in declaration order, against
//! the graph as it stood at the start of the round. New triples are added
//! after the round; then contradiction checks scan the updated graph. A
//! round that adds nothing is the fixpoint and ends the run. Running out of
//! rounds is reported through `reached_fixpoint = false`, never as an error.

use crate::rules::{RuleOutput, RuleSet};
use crate::{Contradiction, ContradictionKind, Graph, Iri, Term, Triple};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A triple added by a derivation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inference {
    pub triple: Triple,
    pub rule_id: String,
    /// 1-based round in which the triple was added.
    pub iteration: u32,
}

/// Result of one reasoning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningOutcome {
    /// New triples, in the order they were added.
    pub inferences: Vec<Inference>,
    /// Each distinct contradiction once, in the order first found.
    pub contradictions: Vec<Contradiction>,
    /// Rounds executed.
    pub iterations: u32,
    pub reached_fixpoint: bool,
}

impl ReasoningOutcome {
    /// Derived triples per rule id.
    #[must_use]
    pub fn summary(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for inference in &self.inferences {
            *counts.entry(inference.rule_id.clone()).or_insert(0usize) += 1;
        }
        counts
    }
}

/// Holds a rule set and runs it over graphs.
#[derive(Debug, Clone)]
pub struct Reasoner {
    rules: RuleSet,
}

impl Reasoner {
    /// Malformed rules are kept; they are logged and skipped on every run.
    #[must_use]
    pub fn new(rules: RuleSet) -> Self {
        for err in rules.malformed() {
            tracing::warn!(error = %err, "rule will be skipped");
        }
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Run to fixpoint or `max_iterations` rounds, extending `graph` in place.
    pub fn run(&self, graph: &mut Graph, max_iterations: u32) -> ReasoningOutcome {
        let mut outcome = ReasoningOutcome::default();
        let mut seen: BTreeSet<(Iri, ContradictionKind, BTreeSet<Term>)> = BTreeSet::new();

        for iteration in 1..=max_iterations {
            outcome.iterations = iteration;
            tracing::debug!(iteration, triples = graph.len(), "reasoning round");

            let mut candidates: Vec<(Triple, &str)> = Vec::new();
            for rule in self.rules.iter().filter(|r| r.derives_facts()) {
                match rule.evaluate(graph) {
                    Ok(RuleOutput::Derived(triples)) => {
                        candidates.extend(triples.into_iter().map(|t| (t, rule.id())));
                    }
                    Ok(RuleOutput::Contradictions(_)) => {}
                    Err(e) => tracing::warn!(rule = rule.id(), error = %e, "rule skipped"),
                }
            }

            let mut added = 0usize;
            for (triple, rule_id) in candidates {
                if graph.insert(triple.clone()) {
                    tracing::debug!(rule = rule_id, %triple, "derived");
                    outcome.inferences.push(Inference {
                        triple,
                        rule_id: rule_id.to_string(),
                        iteration,
                    });
                    added = added.saturating_add(1);
                }
            }

            for rule in self.rules.iter().filter(|r| r.detects_contradictions()) {
                match rule.evaluate(graph) {
                    Ok(RuleOutput::Contradictions(found)) => {
                        for c in found {
                            let key = (c.entity.clone(), c.kind, c.conflicting.clone());
                            if seen.insert(key) {
                                tracing::warn!(rule = rule.id(), explanation = %c.explanation, "contradiction detected");
                                outcome.contradictions.push(c);
                            }
                        }
                    }
                    Ok(RuleOutput::Derived(_)) => {}
                    Err(e) => tracing::warn!(rule = rule.id(), error = %e, "rule skipped"),
                }
            }

            if added == 0 {
                outcome.reached_fixpoint = true;
                tracing::info!(iterations = iteration, derived = outcome.inferences.len(), "reached fixpoint");
                break;
            }
        }

        if !outcome.reached_fixpoint {
            tracing::warn!(max_iterations, "reached maximum iterations without fixpoint");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::parse_graph;
    use crate::graph::{PatternTerm, TriplePattern};
    use crate::rules::{Rule, TemplateTerm, TripleTemplate};

    fn dubai() -> Graph {
        parse_graph(
            r#"tourism:Dubai a tourism:City ; tourism:isCoastal true .
               tourism:DubaiAquarium a tourism:Attraction ;
                   tourism:locatedIn tourism:Dubai ;
                   tourism:hasAmenity "Playground" ;
                   tourism:hasRating 4.6 ."#,
        )
        .expect("parse")
    }

    #[test]
    fn derives_standard_chain() {
        let mut graph = dubai();
        let outcome = Reasoner::new(RuleSet::standard()).run(&mut graph, 10);
        assert!(outcome.reached_fixpoint);
        assert!(outcome.contradictions.is_empty());

        let aquarium = Iri::tourism("DubaiAquarium");
        assert!(graph.contains(&Triple::typed(aquarium.clone(), Iri::tourism("CoastalAttraction"))));
        assert!(graph.contains(&Triple::typed(aquarium, Iri::tourism("FamilyFriendlyAttraction"))));
        let destinations = graph.subjects_with_type(&Iri::tourism("CoastalFamilyDestination"));
        assert_eq!(
            destinations,
            vec![&Iri::tourism("CoastalFamilyDestination_Dubai_DubaiAquarium")]
        );
    }

    #[test]
    fn iterations_count_includes_fixpoint_round() {
        let mut graph = dubai();
        let outcome = Reasoner::new(RuleSet::standard()).run(&mut graph, 10);
        // CoastalCity + FamilyFriendly, then CoastalAttraction + destination, then nothing.
        assert_eq!(outcome.iterations, 3);
        let last = outcome.inferences.iter().map(|i| i.iteration).max();
        assert_eq!(last, Some(2));
    }

    #[test]
    fn exhausted_cap_keeps_partial_results() {
        let mut graph = dubai();
        let outcome = Reasoner::new(RuleSet::standard()).run(&mut graph, 1);
        assert!(!outcome.reached_fixpoint);
        assert_eq!(outcome.iterations, 1);
        assert!(!outcome.inferences.is_empty());
    }

    #[test]
    fn malformed_rule_does_not_abort_run() {
        let mut rules = RuleSet::standard();
        rules.rules.insert(
            0,
            Rule::Derivation {
                id: "broken".into(),
                pattern: vec![],
                filters: vec![],
                action: vec![TripleTemplate::new(
                    TemplateTerm::var("x"),
                    TemplateTerm::iri(Iri::rdf_type()),
                    TemplateTerm::iri(Iri::tourism("X")),
                )],
            },
        );
        let mut graph = dubai();
        let outcome = Reasoner::new(rules).run(&mut graph, 10);
        assert!(outcome.reached_fixpoint);
        assert!(outcome.inferences.iter().all(|i| i.rule_id != "broken"));
        assert!(!outcome.inferences.is_empty());
    }

    #[test]
    fn contradiction_reported_once_across_rounds() {
        let mut graph = parse_graph(
            r#"tourism:Park a tourism:Attraction ;
                   tourism:hasAmenity "Playground" ;
                   tourism:hasMinAge 16 ."#,
        )
        .expect("parse");
        let outcome = Reasoner::new(RuleSet::standard()).run(&mut graph, 10);
        assert_eq!(outcome.contradictions.len(), 1);
        assert_eq!(outcome.contradictions[0].entity, Iri::tourism("Park"));
        assert_eq!(outcome.contradictions[0].kind, ContradictionKind::DisjointClass);
    }

    #[test]
    fn rule_order_decides_attribution() {
        let first = Rule::Derivation {
            id: "first".into(),
            pattern: vec![TriplePattern::new(
                PatternTerm::var("c"),
                PatternTerm::iri(Iri::rdf_type()),
                PatternTerm::iri(Iri::tourism("City")),
            )],
            filters: vec![],
            action: vec![TripleTemplate::new(
                TemplateTerm::var("c"),
                TemplateTerm::iri(Iri::rdf_type()),
                TemplateTerm::iri(Iri::tourism("Place")),
            )],
        };
        let mut second = first.clone();
        if let Rule::Derivation { id, .. } = &mut second {
            *id = "second".into();
        }
        let rules = RuleSet::new(1, vec![first, second]).expect("rules");
        let mut graph = parse_graph("tourism:Dubai a tourism:City .").expect("parse");
        let outcome = Reasoner::new(rules).run(&mut graph, 10);
        assert_eq!(outcome.inferences.len(), 1);
        assert_eq!(outcome.inferences[0].rule_id, "first");
        assert_eq!(outcome.summary().get("first"), Some(&1));
    }
}
