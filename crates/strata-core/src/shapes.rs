//! # Shape Validation
//!
//! The structural gate. A `ShapeValidator` takes a data graph and answers
//! with a conformance flag plus violation records; the gateway treats it as
//! a black box.
//!
//! `ShapeSet` is the built-in validator: SHACL-style node shapes with
//! property constraints (`datatype`, `min_count`, `max_count`, `in`,
//! `node_kind`). Shape sets are read from a shapes graph with named
//! property shapes:
//!
//! ```text
//! tourism:AttractionShape a sh:NodeShape ;
//!     sh:targetClass tourism:Attraction ;
//!     sh:property tourism:AttractionRatingShape .
//! tourism:AttractionRatingShape sh:path tourism:hasRating ;
//!     sh:datatype xsd:decimal ; sh:maxCount 1 .
//! ```
//!
//! Blank nodes are not part of the graph syntax, so `sh:in` is written as
//! repeated `sh:in` values instead of an RDF list.

use crate::{Datatype, Graph, Iri, Literal, StrataError, Term, Triple};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// REPORT
// =============================================================================

/// Severity of a shape violation. Only `Violation` breaks conformance.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Violation,
    Warning,
    Info,
}

impl Severity {
    fn from_iri(iri: &Iri) -> Option<Self> {
        match iri.as_str().strip_prefix(crate::primitives::SHACL) {
            Some("Violation") => Some(Self::Violation),
            Some("Warning") => Some(Self::Warning),
            Some("Info") => Some(Self::Info),
            _ => None,
        }
    }

    fn iri(self) -> Iri {
        Iri::shacl(match self {
            Self::Violation => "Violation",
            Self::Warning => "Warning",
            Self::Info => "Info",
        })
    }
}

/// One constraint breach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeViolation {
    pub focus_node: Iri,
    pub path: Option<Iri>,
    pub message: String,
    pub severity: Severity,
}

/// Result of validating a data graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeReport {
    pub conforms: bool,
    pub violations: Vec<ShapeViolation>,
}

impl ShapeReport {
    #[must_use]
    pub fn from_violations(violations: Vec<ShapeViolation>) -> Self {
        let conforms = violations
            .iter()
            .all(|v| v.severity != Severity::Violation);
        Self {
            conforms,
            violations,
        }
    }
}

/// Validates a data graph against shape constraints.
pub trait ShapeValidator: Send + Sync {
    fn validate(&self, data: &Graph) -> ShapeReport;
}

// =============================================================================
// SHAPES
// =============================================================================

/// Required kind of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Iri,
    Literal,
}

/// Constraints on one property of a focus node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyShape {
    pub id: Iri,
    pub path: Iri,
    pub datatype: Option<Datatype>,
    pub min_count: Option<usize>,
    pub max_count: Option<usize>,
    /// Allowed values; empty means unrestricted.
    pub allowed: Vec<Term>,
    pub node_kind: Option<NodeKind>,
    pub severity: Severity,
    /// Replaces the generated message.
    pub message: Option<String>,
}

impl PropertyShape {
    #[must_use]
    pub fn new(id: Iri, path: Iri) -> Self {
        Self {
            id,
            path,
            datatype: None,
            min_count: None,
            max_count: None,
            allowed: Vec::new(),
            node_kind: None,
            severity: Severity::Violation,
            message: None,
        }
    }

    fn violation(&self, focus: &Iri, generated: String) -> ShapeViolation {
        ShapeViolation {
            focus_node: focus.clone(),
            path: Some(self.path.clone()),
            message: self.message.clone().unwrap_or(generated),
            severity: self.severity,
        }
    }

    fn check(&self, data: &Graph, focus: &Iri, out: &mut Vec<ShapeViolation>) {
        let values = data.objects(focus, &self.path);
        let name = self.path.local_name();

        if let Some(min) = self.min_count {
            if values.len() < min {
                out.push(self.violation(focus, format!("Less than {min} values on {name}")));
            }
        }
        if let Some(max) = self.max_count {
            if values.len() > max {
                out.push(self.violation(focus, format!("More than {max} values on {name}")));
            }
        }

        for value in values {
            if let Some(kind) = self.node_kind {
                let ok = match kind {
                    NodeKind::Iri => value.as_iri().is_some(),
                    NodeKind::Literal => value.as_literal().is_some(),
                };
                if !ok {
                    out.push(self.violation(
                        focus,
                        format!("Value {value} of {name} is not of node kind {kind:?}"),
                    ));
                }
            }
            if let Some(datatype) = &self.datatype {
                if !has_datatype(value, datatype) {
                    out.push(self.violation(
                        focus,
                        format!(
                            "Value {value} of {name} does not have datatype {}",
                            datatype.iri()
                        ),
                    ));
                }
            }
            if !self.allowed.is_empty() && !self.allowed.contains(value) {
                out.push(self.violation(
                    focus,
                    format!("Value {value} of {name} is not one of the allowed values"),
                ));
            }
        }
    }
}

/// Whether `value` is a well-formed literal of `datatype`.
///
/// `xsd:integer` values satisfy `xsd:decimal`.
fn has_datatype(value: &Term, datatype: &Datatype) -> bool {
    let Some(literal) = value.as_literal() else {
        return false;
    };
    let declared = match (&literal.datatype, datatype) {
        (Datatype::Integer, Datatype::Decimal) => true,
        (actual, wanted) => actual == wanted,
    };
    declared && well_formed(literal)
}

fn well_formed(literal: &Literal) -> bool {
    match literal.datatype {
        Datatype::Integer => {
            let digits = literal.lexical.strip_prefix(['-', '+']).unwrap_or(&literal.lexical);
            !digits.is_empty()
                && digits.bytes().all(|b| b.is_ascii_digit())
                && literal.as_decimal().is_some()
        }
        Datatype::Decimal | Datatype::Double => literal.as_decimal().is_some(),
        Datatype::Boolean => literal.as_bool().is_some(),
        _ => true,
    }
}

/// Property constraints applied to every instance of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeShape {
    pub id: Iri,
    pub target_class: Iri,
    pub properties: Vec<PropertyShape>,
}

/// An ordered set of node shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeSet {
    pub shapes: Vec<NodeShape>,
}

impl ShapeValidator for ShapeSet {
    fn validate(&self, data: &Graph) -> ShapeReport {
        let mut violations = Vec::new();
        for shape in &self.shapes {
            for focus in data.subjects_with_type(&shape.target_class) {
                for property in &shape.properties {
                    property.check(data, focus, &mut violations);
                }
            }
        }
        ShapeReport::from_violations(violations)
    }
}

impl ShapeSet {
    /// Tourism shapes for cities and attractions.
    #[must_use]
    pub fn standard() -> Self {
        let t = Iri::tourism;
        let typed = |id: &str, path: &str, datatype: Datatype| PropertyShape {
            datatype: Some(datatype),
            max_count: Some(1),
            ..PropertyShape::new(t(id), t(path))
        };

        let city = NodeShape {
            id: t("CityShape"),
            target_class: t("City"),
            properties: vec![
                typed("CityNameShape", "hasName", Datatype::String),
                typed("CityCoastalShape", "isCoastal", Datatype::Boolean),
            ],
        };

        let attraction = NodeShape {
            id: t("AttractionShape"),
            target_class: t("Attraction"),
            properties: vec![
                typed("AttractionNameShape", "hasName", Datatype::String),
                PropertyShape {
                    node_kind: Some(NodeKind::Iri),
                    max_count: Some(1),
                    ..PropertyShape::new(t("AttractionLocationShape"), t("locatedIn"))
                },
                typed("AttractionRatingShape", "hasRating", Datatype::Decimal),
                typed("AttractionMinAgeShape", "hasMinAge", Datatype::Integer),
                typed("AttractionFeeAmountShape", "hasEntryFeeAmount", Datatype::Decimal),
                PropertyShape {
                    max_count: Some(1),
                    allowed: ["AED", "USD", "EUR"]
                        .into_iter()
                        .map(|code| Term::Literal(Literal::string(code)))
                        .collect(),
                    ..PropertyShape::new(t("AttractionFeeCurrencyShape"), t("hasEntryFeeCurrency"))
                },
                PropertyShape {
                    datatype: Some(Datatype::String),
                    ..PropertyShape::new(t("AttractionAmenityShape"), t("hasAmenity"))
                },
            ],
        };

        Self {
            shapes: vec![city, attraction],
        }
    }

    /// Read node shapes from a shapes graph.
    pub fn from_graph(graph: &Graph) -> Result<Self, StrataError> {
        let sh = Iri::shacl;
        let mut shapes = Vec::new();
        for id in graph.subjects_with_type(&sh("NodeShape")) {
            let target_class = single_iri(graph, id, &sh("targetClass"))?
                .ok_or_else(|| invalid(id, "has no sh:targetClass"))?;
            let mut properties = Vec::new();
            for object in graph.objects(id, &sh("property")) {
                let property = object
                    .as_iri()
                    .ok_or_else(|| invalid(id, "sh:property must name a property shape"))?;
                properties.push(property_from_graph(graph, property)?);
            }
            shapes.push(NodeShape {
                id: id.clone(),
                target_class,
                properties,
            });
        }
        Ok(Self { shapes })
    }

    /// The shapes graph `from_graph` reads.
    #[must_use]
    pub fn to_graph(&self) -> Graph {
        let sh = Iri::shacl;
        let mut graph = Graph::new();
        for shape in &self.shapes {
            graph.insert(Triple::typed(shape.id.clone(), sh("NodeShape")));
            graph.insert(Triple::new(
                shape.id.clone(),
                sh("targetClass"),
                shape.target_class.clone(),
            ));
            for property in &shape.properties {
                let id = &property.id;
                graph.insert(Triple::new(shape.id.clone(), sh("property"), id.clone()));
                graph.insert(Triple::new(id.clone(), sh("path"), property.path.clone()));
                if let Some(datatype) = &property.datatype {
                    if let Ok(iri) = Iri::new(datatype.iri()) {
                        graph.insert(Triple::new(id.clone(), sh("datatype"), iri));
                    }
                }
                for (local, count) in [("minCount", property.min_count), ("maxCount", property.max_count)] {
                    if let Some(count) = count.and_then(|c| i64::try_from(c).ok()) {
                        graph.insert(Triple::new(id.clone(), sh(local), Literal::integer(count)));
                    }
                }
                for value in &property.allowed {
                    graph.insert(Triple::new(id.clone(), sh("in"), value.clone()));
                }
                if let Some(kind) = property.node_kind {
                    let kind = match kind {
                        NodeKind::Iri => sh("IRI"),
                        NodeKind::Literal => sh("Literal"),
                    };
                    graph.insert(Triple::new(id.clone(), sh("nodeKind"), kind));
                }
                if property.severity != Severity::Violation {
                    graph.insert(Triple::new(id.clone(), sh("severity"), property.severity.iri()));
                }
                if let Some(message) = &property.message {
                    graph.insert(Triple::new(id.clone(), sh("message"), Literal::string(message)));
                }
            }
        }
        graph
    }
}

fn invalid(id: &Iri, message: &str) -> StrataError {
    StrataError::Config(format!("shape {id} {message}"))
}

fn single<'g>(graph: &'g Graph, id: &Iri, predicate: &Iri) -> Result<Option<&'g Term>, StrataError> {
    let values = graph.objects(id, predicate);
    match values.as_slice() {
        [] => Ok(None),
        [value] => Ok(Some(*value)),
        _ => Err(invalid(id, &format!("has several {} values", predicate.local_name()))),
    }
}

fn single_iri(graph: &Graph, id: &Iri, predicate: &Iri) -> Result<Option<Iri>, StrataError> {
    match single(graph, id, predicate)? {
        None => Ok(None),
        Some(Term::Iri(iri)) => Ok(Some(iri.clone())),
        Some(Term::Literal(_)) => Err(invalid(id, &format!("{} must be an IRI", predicate.local_name()))),
    }
}

fn count(graph: &Graph, id: &Iri, predicate: &Iri) -> Result<Option<usize>, StrataError> {
    match single(graph, id, predicate)? {
        None => Ok(None),
        Some(term) => term
            .as_literal()
            .and_then(|lit| lit.lexical.parse::<usize>().ok())
            .map(Some)
            .ok_or_else(|| invalid(id, &format!("{} must be a non-negative integer", predicate.local_name()))),
    }
}

fn property_from_graph(graph: &Graph, id: &Iri) -> Result<PropertyShape, StrataError> {
    let sh = Iri::shacl;
    let path = single_iri(graph, id, &sh("path"))?.ok_or_else(|| invalid(id, "has no sh:path"))?;

    let node_kind = match single_iri(graph, id, &sh("nodeKind"))? {
        None => None,
        Some(kind) if kind == sh("IRI") => Some(NodeKind::Iri),
        Some(kind) if kind == sh("Literal") => Some(NodeKind::Literal),
        Some(kind) => return Err(invalid(id, &format!("has unsupported node kind {kind}"))),
    };
    let severity = match single_iri(graph, id, &sh("severity"))? {
        None => Severity::Violation,
        Some(iri) => Severity::from_iri(&iri)
            .ok_or_else(|| invalid(id, &format!("has unknown severity {iri}")))?,
    };
    let message = single(graph, id, &sh("message"))?
        .and_then(Term::as_literal)
        .map(|lit| lit.lexical.clone());
    let allowed: BTreeSet<&Term> = graph.objects(id, &sh("in")).into_iter().collect();

    Ok(PropertyShape {
        id: id.clone(),
        path,
        datatype: single_iri(graph, id, &sh("datatype"))?.map(|iri| Datatype::from_iri(&iri)),
        min_count: count(graph, id, &sh("minCount"))?,
        max_count: count(graph, id, &sh("maxCount"))?,
        allowed: allowed.into_iter().cloned().collect(),
        node_kind,
        severity,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::parse_graph;

    const SHAPES_TTL: &str = include_str!("../config/tourism_shapes.ttl");

    fn violations(data: &str) -> Vec<ShapeViolation> {
        let graph = parse_graph(data).expect("parse");
        ShapeSet::standard().validate(&graph).violations
    }

    #[test]
    fn shipped_shapes_match_builtin_set() {
        let graph = parse_graph(SHAPES_TTL).expect("shapes parse");
        let loaded = ShapeSet::from_graph(&graph).expect("shapes load");
        assert_eq!(loaded.shapes.len(), 2);
        assert_eq!(loaded.to_graph(), ShapeSet::standard().to_graph());
    }

    #[test]
    fn to_graph_reads_back() {
        let standard = ShapeSet::standard();
        let reloaded = ShapeSet::from_graph(&standard.to_graph()).expect("reload");
        assert_eq!(reloaded.to_graph(), standard.to_graph());
    }

    #[test]
    fn well_typed_attraction_conforms() {
        let graph = parse_graph(
            r#"tourism:DubaiAquarium a tourism:Attraction ;
                   tourism:locatedIn tourism:Dubai ;
                   tourism:hasRating 4.6 ;
                   tourism:hasMinAge 3 ;
                   tourism:hasEntryFeeAmount 120 ;
                   tourism:hasEntryFeeCurrency "AED" ;
                   tourism:hasAmenity "Playground" ."#,
        )
        .expect("parse");
        let report = ShapeSet::standard().validate(&graph);
        assert!(report.conforms, "{:?}", report.violations);
    }

    #[test]
    fn non_numeric_fee_is_a_violation() {
        let found = violations(r#"tourism:A a tourism:Attraction ; tourism:hasEntryFeeAmount "free" ."#);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].focus_node, Iri::tourism("A"));
        assert_eq!(found[0].path, Some(Iri::tourism("hasEntryFeeAmount")));
        assert!(found[0].message.contains("XMLSchema#decimal"));
    }

    #[test]
    fn ill_formed_typed_literal_is_a_violation() {
        let found = violations(r#"tourism:A a tourism:Attraction ; tourism:hasRating "high"^^xsd:decimal ."#);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn cardinality_and_allowed_values() {
        let found = violations(
            r#"tourism:A a tourism:Attraction ;
                   tourism:locatedIn tourism:Dubai, tourism:Muscat ;
                   tourism:hasEntryFeeCurrency "GBP" ."#,
        );
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|v| v.message.starts_with("More than 1")));
        assert!(found.iter().any(|v| v.message.contains("allowed values")));
    }

    #[test]
    fn warnings_do_not_break_conformance() {
        let mut shapes = ShapeSet::standard();
        for shape in &mut shapes.shapes {
            for property in &mut shape.properties {
                property.severity = Severity::Warning;
            }
        }
        let graph = parse_graph(r#"tourism:A a tourism:Attraction ; tourism:hasRating "x" ."#)
            .expect("parse");
        let report = shapes.validate(&graph);
        assert!(report.conforms);
        assert_eq!(report.violations.len(), 1);
    }

    #[test]
    fn untargeted_nodes_are_ignored() {
        assert!(violations(r#"tourism:X tourism:hasRating "x" ."#).is_empty());
    }
}
