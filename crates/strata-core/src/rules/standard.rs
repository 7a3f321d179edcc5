//! The tourism rule set.
//!
//! Mirrors `config/standard_rules.toml`; a test keeps the two in sync.

use super::{Rule, RuleSet, TemplateTerm, TripleTemplate};
use crate::graph::{CompareOp, Filter, PatternTerm, TriplePattern};
use crate::{ContradictionKind, Decimal, Iri, Literal, Term};

fn var(name: &str) -> PatternTerm {
    PatternTerm::var(name)
}

fn tourism(local: &str) -> PatternTerm {
    PatternTerm::iri(Iri::tourism(local))
}

fn is_a(subject: &str, class: &str) -> TriplePattern {
    TriplePattern::new(var(subject), PatternTerm::iri(Iri::rdf_type()), tourism(class))
}

fn has(subject: &str, property: &str, object: PatternTerm) -> TriplePattern {
    TriplePattern::new(var(subject), tourism(property), object)
}

fn not_typed(subject: &str, class: &str) -> Filter {
    Filter::NotExists {
        patterns: vec![is_a(subject, class)],
    }
}

fn classify(subject: &str, class: &str) -> TripleTemplate {
    TripleTemplate::new(
        TemplateTerm::var(subject),
        TemplateTerm::iri(Iri::rdf_type()),
        TemplateTerm::iri(Iri::tourism(class)),
    )
}

pub(super) fn rule_set() -> RuleSet {
    let destination = || TemplateTerm::Mint {
        mint: Iri::tourism("CoastalFamilyDestination"),
        parts: vec!["city".to_string(), "attraction".to_string()],
    };

    let rules = vec![
        Rule::Derivation {
            id: "coastal_city".to_string(),
            pattern: vec![
                is_a("city", "City"),
                has(
                    "city",
                    "isCoastal",
                    PatternTerm::Const(Term::Literal(Literal::boolean(true))),
                ),
            ],
            filters: vec![not_typed("city", "CoastalCity")],
            action: vec![classify("city", "CoastalCity")],
        },
        Rule::Derivation {
            id: "coastal_attraction".to_string(),
            pattern: vec![
                has("attraction", "locatedIn", var("city")),
                is_a("city", "CoastalCity"),
                is_a("attraction", "Attraction"),
            ],
            filters: vec![not_typed("attraction", "CoastalAttraction")],
            action: vec![classify("attraction", "CoastalAttraction")],
        },
        Rule::Derivation {
            id: "family_friendly_playground".to_string(),
            pattern: vec![
                is_a("attraction", "Attraction"),
                has(
                    "attraction",
                    "hasAmenity",
                    PatternTerm::Const(Term::Literal(Literal::string("Playground"))),
                ),
            ],
            filters: vec![not_typed("attraction", "FamilyFriendlyAttraction")],
            action: vec![classify("attraction", "FamilyFriendlyAttraction")],
        },
        Rule::Derivation {
            id: "not_family_friendly_age".to_string(),
            pattern: vec![
                is_a("attraction", "Attraction"),
                has("attraction", "hasMinAge", var("minAge")),
            ],
            filters: vec![
                Filter::Compare {
                    var: "minAge".to_string(),
                    op: CompareOp::Gt,
                    value: Decimal::from_int(12),
                },
                not_typed("attraction", "NotFamilyFriendlyAttraction"),
            ],
            action: vec![classify("attraction", "NotFamilyFriendlyAttraction")],
        },
        Rule::Derivation {
            id: "coastal_family_destination".to_string(),
            pattern: vec![
                is_a("city", "CoastalCity"),
                is_a("attraction", "FamilyFriendlyAttraction"),
                has("attraction", "locatedIn", var("city")),
                has("attraction", "hasRating", var("rating")),
            ],
            filters: vec![
                Filter::Compare {
                    var: "rating".to_string(),
                    op: CompareOp::Ge,
                    value: Decimal::from_millionths(4_500_000),
                },
                Filter::NotExists {
                    patterns: vec![
                        is_a("destination", "CoastalFamilyDestination"),
                        has("destination", "hasCity", var("city")),
                        has("destination", "hasPrimaryAttraction", var("attraction")),
                    ],
                },
            ],
            action: vec![
                TripleTemplate::new(
                    destination(),
                    TemplateTerm::iri(Iri::rdf_type()),
                    TemplateTerm::iri(Iri::tourism("CoastalFamilyDestination")),
                ),
                TripleTemplate::new(
                    destination(),
                    TemplateTerm::iri(Iri::tourism("hasCity")),
                    TemplateTerm::var("city"),
                ),
                TripleTemplate::new(
                    destination(),
                    TemplateTerm::iri(Iri::tourism("hasPrimaryAttraction")),
                    TemplateTerm::var("attraction"),
                ),
                TripleTemplate::new(
                    destination(),
                    TemplateTerm::iri(Iri::tourism("hasRating")),
                    TemplateTerm::var("rating"),
                ),
            ],
        },
        Rule::ContradictionCheck {
            id: "family_friendly_disjoint".to_string(),
            pattern: vec![
                is_a("entity", "FamilyFriendlyAttraction"),
                is_a("entity", "NotFamilyFriendlyAttraction"),
            ],
            filters: Vec::new(),
            entity: "entity".to_string(),
            conflicting: vec![
                tourism("FamilyFriendlyAttraction"),
                tourism("NotFamilyFriendlyAttraction"),
            ],
            kind: ContradictionKind::DisjointClass,
            explanation: "Entity {entity} cannot be both FamilyFriendly and NotFamilyFriendly"
                .to_string(),
        },
    ];

    RuleSet { version: 1, rules }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD_RULES_TOML: &str = include_str!("../../config/standard_rules.toml");

    #[test]
    fn shipped_rule_file_matches_builtin_set() {
        let from_file = RuleSet::from_toml(STANDARD_RULES_TOML).expect("rule file parses");
        assert_eq!(from_file, rule_set());
    }

    #[test]
    fn ids_are_unique() {
        let rules = rule_set();
        assert!(RuleSet::new(rules.version, rules.rules).is_ok());
    }
}
