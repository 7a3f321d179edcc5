//! # Consistency Checker
//!
//! Ontology-level checks that run alongside reasoning:
//!
//! - disjoint classes: no entity may carry two mutually exclusive types
//! - functional properties: at most one value per subject
//! - numeric ranges: declared bounds are violations, never clamped
//! - cross-layer: two layers disagreeing on a functional value
//!
//! Numeric values of functional properties are compared with a tolerance.
//! Two layers whose values differ by at most the tolerance are harmless
//! drift: the upper layer's value shadows the lower one when layers merge.
//! Above the tolerance, both values are kept and reported. Non-numeric
//! values (and types) must match exactly.

use crate::{Contradiction, ContradictionKind, Decimal, Graph, GraphName, Iri, Term, Triple};
use crate::primitives::DEFAULT_TOLERANCE_MILLIONTHS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inclusive numeric bounds for one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeConstraint {
    pub property: Iri,
    pub min: Decimal,
    pub max: Decimal,
}

impl RangeConstraint {
    #[must_use]
    pub fn contains(&self, value: Decimal) -> bool {
        value >= self.min && value <= self.max
    }
}

/// The constraint declarations the checker enforces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyConstraints {
    /// Pairs of classes no entity may hold together.
    pub disjoint_classes: Vec<(Iri, Iri)>,
    /// Single-valued properties.
    pub functional_properties: Vec<Iri>,
    pub ranges: Vec<RangeConstraint>,
    /// Largest numeric difference between layers treated as drift.
    /// Not read from the constraints table; `StrataConfig::tolerance` sets it.
    #[serde(skip, default = "default_tolerance")]
    pub tolerance: Decimal,
}

fn default_tolerance() -> Decimal {
    Decimal::from_millionths(DEFAULT_TOLERANCE_MILLIONTHS)
}

impl Default for OntologyConstraints {
    fn default() -> Self {
        Self::standard()
    }
}

impl OntologyConstraints {
    /// Tourism constraints with a tolerance of 1.0.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            disjoint_classes: vec![(
                Iri::tourism("FamilyFriendlyAttraction"),
                Iri::tourism("NotFamilyFriendlyAttraction"),
            )],
            functional_properties: vec![
                Iri::tourism("locatedIn"),
                Iri::tourism("hasRating"),
                Iri::tourism("isCoastal"),
            ],
            ranges: vec![RangeConstraint {
                property: Iri::tourism("hasRating"),
                min: Decimal::ZERO,
                max: Decimal::from_int(5),
            }],
            tolerance: default_tolerance(),
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn within_tolerance(&self, a: &Term, b: &Term) -> bool {
        match (a.as_decimal(), b.as_decimal()) {
            (Some(x), Some(y)) => x.abs_diff(y) <= self.tolerance,
            _ => false,
        }
    }

    /// Same value: equal terms, or equal numbers in different lexical forms.
    fn same_value(a: &Term, b: &Term) -> bool {
        if a == b {
            return true;
        }
        matches!((a.as_decimal(), b.as_decimal()), (Some(x), Some(y)) if x == y)
    }

    // =========================================================================
    // SINGLE-VIEW CHECKS
    // =========================================================================

    /// Entities typed with both classes of a disjoint pair.
    #[must_use]
    pub fn check_disjoint(&self, view: &Graph) -> Vec<Contradiction> {
        let mut found = Vec::new();
        for (a, b) in &self.disjoint_classes {
            for entity in view.subjects_with_type(a) {
                if view.types_of(entity).contains(b) {
                    found.push(Contradiction {
                        kind: ContradictionKind::DisjointClass,
                        entity: entity.clone(),
                        property: None,
                        conflicting: [Term::Iri(a.clone()), Term::Iri(b.clone())].into(),
                        explanation: format!(
                            "Entity {entity} cannot be both {} and {}",
                            a.local_name(),
                            b.local_name()
                        ),
                    });
                }
            }
        }
        found
    }

    /// Subjects with more than one distinct value for a functional property.
    #[must_use]
    pub fn check_functional(&self, view: &Graph) -> Vec<Contradiction> {
        let mut found = Vec::new();
        for property in &self.functional_properties {
            for (subject, values) in view.property_values(property) {
                let mut distinct: Vec<&Term> = Vec::new();
                for value in values {
                    if !distinct.iter().any(|d| Self::same_value(d, value)) {
                        distinct.push(value);
                    }
                }
                if distinct.len() > 1 {
                    let listed: Vec<String> = distinct.iter().map(ToString::to_string).collect();
                    found.push(Contradiction {
                        kind: ContradictionKind::FunctionalProperty,
                        entity: subject.clone(),
                        property: Some(property.clone()),
                        conflicting: distinct.into_iter().cloned().collect(),
                        explanation: format!(
                            "Entity {subject} has multiple values for {}: {}",
                            property.local_name(),
                            listed.join(", ")
                        ),
                    });
                }
            }
        }
        found
    }

    /// Numeric values outside their declared bounds.
    ///
    /// A numeric literal with no exact fixed-point value (too large, too many
    /// fractional digits, malformed) cannot be shown to lie inside the bounds
    /// and is reported too. Non-numeric values are left to shape validation.
    #[must_use]
    pub fn check_ranges(&self, view: &Graph) -> Vec<Contradiction> {
        let mut found = Vec::new();
        for range in &self.ranges {
            for (subject, values) in view.property_values(&range.property) {
                for value in values {
                    let Some(literal) = value.as_literal() else {
                        continue;
                    };
                    if !literal.datatype.is_numeric() {
                        continue;
                    }
                    let Some(number) = literal.as_decimal() else {
                        found.push(Contradiction {
                            kind: ContradictionKind::Range,
                            entity: subject.clone(),
                            property: Some(range.property.clone()),
                            conflicting: [value.clone()].into(),
                            explanation: format!(
                                "{} '{}' of {subject} is not an exact number within [{}, {}]",
                                range.property.local_name(),
                                literal.lexical,
                                range.min,
                                range.max
                            ),
                        });
                        continue;
                    };
                    if !range.contains(number) {
                        found.push(Contradiction {
                            kind: ContradictionKind::Range,
                            entity: subject.clone(),
                            property: Some(range.property.clone()),
                            conflicting: [value.clone()].into(),
                            explanation: format!(
                                "{} {number} of {subject} is outside valid range [{}, {}]",
                                range.property.local_name(),
                                range.min,
                                range.max
                            ),
                        });
                    }
                }
            }
        }
        found
    }

    /// Disjoint, functional and range checks over one view.
    #[must_use]
    pub fn check_global(&self, view: &Graph) -> Vec<Contradiction> {
        let mut found = self.check_disjoint(view);
        found.extend(self.check_functional(view));
        found.extend(self.check_ranges(view));
        found
    }

    // =========================================================================
    // CROSS-LAYER
    // =========================================================================

    /// Functional values of `upper` that disagree with `lower`.
    ///
    /// Numbers conflict only when they differ by more than the tolerance;
    /// anything else conflicts when not equal.
    #[must_use]
    pub fn cross_layer(
        &self,
        upper: &Graph,
        lower: &Graph,
        upper_layer: &GraphName,
        lower_layer: &GraphName,
    ) -> Vec<Contradiction> {
        let mut found = Vec::new();
        for property in &self.functional_properties {
            for (subject, upper_values) in upper.property_values(property) {
                for lower_value in lower.objects(subject, property) {
                    for upper_value in &upper_values {
                        if Self::same_value(upper_value, lower_value)
                            || self.within_tolerance(upper_value, lower_value)
                        {
                            continue;
                        }
                        let detail = match (upper_value.as_decimal(), lower_value.as_decimal()) {
                            (Some(u), Some(l)) => format!(
                                "difference {} exceeds tolerance {}",
                                u.abs_diff(l),
                                self.tolerance
                            ),
                            _ => "values differ".to_string(),
                        };
                        found.push(Contradiction {
                            kind: ContradictionKind::CrossLayer,
                            entity: subject.clone(),
                            property: Some(property.clone()),
                            conflicting: [(*upper_value).clone(), lower_value.clone()].into(),
                            explanation: format!(
                                "{} of {subject} is {upper_value} in {upper_layer} but {lower_value} in {lower_layer}: {detail}",
                                property.local_name()
                            ),
                        });
                    }
                }
            }
        }
        found
    }

    /// Conflicts an agent's candidate staging data introduces.
    ///
    /// Covers candidate values clashing with Consensus or Main, disjoint
    /// types that only arise once the candidate is combined with those
    /// layers, and candidate data that contradicts itself. Contradictions
    /// already present in Consensus + Main are not the candidate's doing and
    /// are not reported here.
    #[must_use]
    pub fn check_agent(
        &self,
        staging: &GraphName,
        session: &GraphName,
        candidate: &Graph,
        consensus: &Graph,
        main: &Graph,
    ) -> Vec<Contradiction> {
        let mut found = self.cross_layer(candidate, consensus, staging, session);
        found.extend(self.cross_layer(candidate, main, staging, &GraphName::Main));

        let shared = consensus.union(main);
        let before: BTreeSet<Contradiction> = self.check_disjoint(&shared).into_iter().collect();
        let combined = candidate.union(&shared);
        found.extend(
            self.check_disjoint(&combined)
                .into_iter()
                .filter(|c| !before.contains(c)),
        );
        found.extend(self.check_functional(candidate));
        dedup(found)
    }

    // =========================================================================
    // MERGING
    // =========================================================================

    /// Triples of `lower` hidden by a within-tolerance functional value in
    /// `upper`.
    #[must_use]
    pub fn shadowed(&self, upper: &Graph, lower: &Graph) -> Graph {
        let mut hidden = Graph::new();
        for property in &self.functional_properties {
            for (subject, upper_values) in upper.property_values(property) {
                for lower_value in lower.objects(subject, property) {
                    let kept = upper_values.iter().any(|u| Self::same_value(u, lower_value));
                    let drifted = upper_values
                        .iter()
                        .any(|u| self.within_tolerance(u, lower_value));
                    if !kept && drifted {
                        hidden.insert(Triple::new(
                            subject.clone(),
                            property.clone(),
                            lower_value.clone(),
                        ));
                    }
                }
            }
        }
        hidden
    }

    /// `upper` laid over `lower`, with drifted lower values shadowed.
    #[must_use]
    pub fn overlay(&self, upper: &Graph, lower: &Graph) -> Graph {
        let hidden = self.shadowed(upper, lower);
        let mut merged = lower.difference(&hidden);
        merged.extend(upper.iter());
        merged
    }

    /// The merged view: Main, then Consensus, then the candidate on top.
    #[must_use]
    pub fn merge_layers(&self, main: &Graph, consensus: &Graph, candidate: &Graph) -> Graph {
        let shared = self.overlay(consensus, main);
        self.overlay(candidate, &shared)
    }
}

/// Drop repeated contradictions, keeping first-seen order.
#[must_use]
pub fn dedup(found: Vec<Contradiction>) -> Vec<Contradiction> {
    let mut seen = BTreeSet::new();
    found
        .into_iter()
        .filter(|c| seen.insert((c.entity.clone(), c.kind, c.conflicting.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::parse_graph;
    use crate::{AgentId, SessionId};

    fn graph(text: &str) -> Graph {
        parse_graph(text).expect("parse")
    }

    fn staging() -> GraphName {
        GraphName::Staging(AgentId::new("a1").expect("id"))
    }

    fn consensus() -> GraphName {
        GraphName::Consensus(SessionId::new("s1").expect("id"))
    }

    #[test]
    fn disjoint_types_flagged() {
        let c = OntologyConstraints::standard();
        let view = graph(
            "tourism:X a tourism:FamilyFriendlyAttraction, tourism:NotFamilyFriendlyAttraction .",
        );
        let found = c.check_disjoint(&view);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ContradictionKind::DisjointClass);
        assert!(found[0].explanation.contains("FamilyFriendlyAttraction"));
    }

    #[test]
    fn functional_property_names_both_values() {
        let c = OntologyConstraints::standard();
        let view = graph("tourism:A tourism:locatedIn tourism:Dubai, tourism:AbuDhabi .");
        let found = c.check_functional(&view);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].conflicting.len(), 2);
        assert_eq!(found[0].property, Some(Iri::tourism("locatedIn")));
    }

    #[test]
    fn functional_treats_equal_numbers_as_one_value() {
        let c = OntologyConstraints::standard();
        let view = graph(r#"tourism:A tourism:hasRating 4.5, "4.50"^^xsd:decimal ."#);
        assert!(c.check_functional(&view).is_empty());
    }

    #[test]
    fn range_violation_not_clamped() {
        let c = OntologyConstraints::standard();
        let view = graph("tourism:A tourism:hasRating 7.0 . tourism:B tourism:hasRating 5 .");
        let found = c.check_ranges(&view);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity, Iri::tourism("A"));
        assert!(found[0].explanation.contains("[0.0, 5.0]"));
    }

    #[test]
    fn unrepresentable_numbers_are_out_of_range() {
        let c = OntologyConstraints::standard();
        let view = graph(
            r#"tourism:A tourism:hasRating "99999999999999999999"^^xsd:integer .
               tourism:B tourism:hasRating 5.0000001 .
               tourism:C tourism:hasRating "1e99999999999"^^xsd:double .
               tourism:D tourism:hasRating 4.9999999 ."#,
        );
        let found = c.check_ranges(&view);
        let entities: Vec<_> = found.iter().map(|f| f.entity.local_name()).collect();
        assert_eq!(entities, vec!["A", "B", "C", "D"]);
        assert!(found.iter().all(|f| f.kind == ContradictionKind::Range));

        let exact = graph(r#"tourism:E tourism:hasRating "5.000000000"^^xsd:decimal ."#);
        assert!(c.check_ranges(&exact).is_empty());
    }

    #[test]
    fn tolerance_gates_numeric_conflicts() {
        let c = OntologyConstraints::standard();
        let lower = graph("tourism:A tourism:hasRating 4.0 .");

        let drift = graph("tourism:A tourism:hasRating 4.8 .");
        assert!(c.cross_layer(&drift, &lower, &staging(), &consensus()).is_empty());

        let jump = graph("tourism:A tourism:hasRating 5.5 .");
        let found = c.cross_layer(&jump, &lower, &staging(), &consensus());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ContradictionKind::CrossLayer);
        assert!(found[0].explanation.contains("exceeds tolerance 1.0"));
    }

    #[test]
    fn non_numeric_values_need_exact_match() {
        let c = OntologyConstraints::standard();
        let main = graph("tourism:Dubai tourism:isCoastal true .");
        let upper = graph("tourism:Dubai tourism:isCoastal false .");
        let found = c.cross_layer(&upper, &main, &consensus(), &GraphName::Main);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn merge_shadows_drift_and_keeps_jumps() {
        let c = OntologyConstraints::standard();
        let main = graph("tourism:A tourism:hasRating 4.0 . tourism:B tourism:hasRating 4.0 .");
        let candidate = graph("tourism:A tourism:hasRating 4.8 . tourism:B tourism:hasRating 5.5 .");
        let merged = c.merge_layers(&main, &Graph::new(), &candidate);

        let rating = Iri::tourism("hasRating");
        assert_eq!(merged.objects(&Iri::tourism("A"), &rating).len(), 1);
        assert_eq!(merged.objects(&Iri::tourism("B"), &rating).len(), 2);
        assert!(c.check_functional(&merged).iter().all(|f| f.entity == Iri::tourism("B")));
    }

    #[test]
    fn agent_check_ignores_existing_shared_conflicts() {
        let c = OntologyConstraints::standard();
        let main = graph(
            "tourism:Old a tourism:FamilyFriendlyAttraction, tourism:NotFamilyFriendlyAttraction .",
        );
        let consensus_graph = graph("tourism:New a tourism:NotFamilyFriendlyAttraction .");
        let candidate = graph("tourism:New a tourism:FamilyFriendlyAttraction .");
        let found = c.check_agent(&staging(), &consensus(), &candidate, &consensus_graph, &main);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity, Iri::tourism("New"));
    }

    #[test]
    fn agent_check_flags_self_contradiction() {
        let c = OntologyConstraints::standard();
        let candidate = graph("tourism:A tourism:locatedIn tourism:Dubai, tourism:Muscat .");
        let found = c.check_agent(&staging(), &consensus(), &candidate, &Graph::new(), &Graph::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ContradictionKind::FunctionalProperty);
    }
}
