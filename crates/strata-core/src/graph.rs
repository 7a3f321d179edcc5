//! # Graph Engine
//!
//! The deterministic in-memory triple set for Strata CORE.
//!
//! A `Graph` is what every gate works on: merged views, reasoning state and
//! layer snapshots are all plain `Graph` values. Storage backends exchange
//! whole graphs with the gateway (see `storage`).
//!
//! All data structures use `BTreeMap`/`BTreeSet` for deterministic ordering.

use crate::formats::turtle;
use crate::{Decimal, Iri, Term, Triple};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH
// =============================================================================

/// An in-memory set of triples with subject and predicate indexes.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
/// No `HashMap` allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    /// subject -> predicate -> objects
    spo: BTreeMap<Iri, BTreeMap<Iri, BTreeSet<Term>>>,
    /// predicate -> object -> subjects
    pos: BTreeMap<Iri, BTreeMap<Term, BTreeSet<Iri>>>,
    len: usize,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple. Returns `false` if it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        let Triple {
            subject,
            predicate,
            object,
        } = triple;
        let added = self
            .spo
            .entry(subject.clone())
            .or_default()
            .entry(predicate.clone())
            .or_default()
            .insert(object.clone());
        if added {
            self.pos
                .entry(predicate)
                .or_default()
                .entry(object)
                .or_default()
                .insert(subject);
            self.len = self.len.saturating_add(1);
        }
        added
    }

    /// Remove a triple. Returns `false` if it was absent.
    pub fn remove(&mut self, triple: &Triple) -> bool {
        let Some(predicates) = self.spo.get_mut(&triple.subject) else {
            return false;
        };
        let Some(objects) = predicates.get_mut(&triple.predicate) else {
            return false;
        };
        if !objects.remove(&triple.object) {
            return false;
        }
        if objects.is_empty() {
            predicates.remove(&triple.predicate);
        }
        if predicates.is_empty() {
            self.spo.remove(&triple.subject);
        }

        if let Some(by_object) = self.pos.get_mut(&triple.predicate) {
            if let Some(subjects) = by_object.get_mut(&triple.object) {
                subjects.remove(&triple.subject);
                if subjects.is_empty() {
                    by_object.remove(&triple.object);
                }
            }
            if by_object.is_empty() {
                self.pos.remove(&triple.predicate);
            }
        }
        self.len = self.len.saturating_sub(1);
        true
    }

    #[must_use]
    pub fn contains(&self, triple: &Triple) -> bool {
        self.spo
            .get(&triple.subject)
            .and_then(|p| p.get(&triple.predicate))
            .is_some_and(|o| o.contains(&triple.object))
    }

    /// Insert every triple; returns how many were new.
    pub fn extend(&mut self, triples: impl IntoIterator<Item = Triple>) -> usize {
        triples
            .into_iter()
            .filter(|t| self.insert(t.clone()))
            .count()
    }

    /// All triples in (subject, predicate, object) order.
    pub fn iter(&self) -> impl Iterator<Item = Triple> + '_ {
        self.spo.iter().flat_map(|(s, preds)| {
            preds.iter().flat_map(move |(p, objects)| {
                objects
                    .iter()
                    .map(move |o| Triple::new(s.clone(), p.clone(), o.clone()))
            })
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Union of two graphs.
    #[must_use]
    pub fn union(&self, other: &Graph) -> Graph {
        let mut merged = self.clone();
        merged.extend(other.iter());
        merged
    }

    /// Triples of `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Graph) -> Graph {
        self.iter().filter(|t| !other.contains(t)).collect()
    }

    /// Objects of `subject predicate ?o`.
    #[must_use]
    pub fn objects(&self, subject: &Iri, predicate: &Iri) -> Vec<&Term> {
        self.spo
            .get(subject)
            .and_then(|p| p.get(predicate))
            .map(|objects| objects.iter().collect())
            .unwrap_or_default()
    }

    /// Subjects carrying `rdf:type class`.
    #[must_use]
    pub fn subjects_with_type(&self, class: &Iri) -> Vec<&Iri> {
        self.pos
            .get(&Iri::rdf_type())
            .and_then(|by_object| by_object.get(&Term::Iri(class.clone())))
            .map(|subjects| subjects.iter().collect())
            .unwrap_or_default()
    }

    /// Classes asserted for `subject`.
    #[must_use]
    pub fn types_of(&self, subject: &Iri) -> BTreeSet<&Iri> {
        self.objects(subject, &Iri::rdf_type())
            .into_iter()
            .filter_map(Term::as_iri)
            .collect()
    }

    /// Every subject's values for one predicate.
    #[must_use]
    pub fn property_values(&self, predicate: &Iri) -> BTreeMap<&Iri, Vec<&Term>> {
        let mut out: BTreeMap<&Iri, Vec<&Term>> = BTreeMap::new();
        if let Some(by_object) = self.pos.get(predicate) {
            for (object, subjects) in by_object {
                for subject in subjects {
                    out.entry(subject).or_default().push(object);
                }
            }
        }
        out
    }

    /// Triples matching a partially bound (s, p, o).
    #[must_use]
    pub fn matching(
        &self,
        subject: Option<&Iri>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> Vec<Triple> {
        let mut out = Vec::new();
        if let Some(s) = subject {
            let Some(preds) = self.spo.get(s) else {
                return out;
            };
            for (p, objects) in preds {
                if predicate.is_some_and(|want| want != p) {
                    continue;
                }
                for o in objects {
                    if object.is_none_or(|want| want == o) {
                        out.push(Triple::new(s.clone(), p.clone(), o.clone()));
                    }
                }
            }
            return out;
        }

        if let Some(p) = predicate {
            let Some(by_object) = self.pos.get(p) else {
                return out;
            };
            for (o, subjects) in by_object {
                if object.is_some_and(|want| want != o) {
                    continue;
                }
                for s in subjects {
                    out.push(Triple::new(s.clone(), p.clone(), o.clone()));
                }
            }
            return out;
        }

        self.iter()
            .filter(|t| object.is_none_or(|want| want == &t.object))
            .collect()
    }

    // =========================================================================
    // PATTERN MATCHING
    // =========================================================================

    /// All solutions of a conjunctive pattern, joined in pattern order.
    #[must_use]
    pub fn solve(&self, patterns: &[TriplePattern]) -> Vec<Bindings> {
        let mut out = Vec::new();
        self.solve_into(patterns, Bindings::new(), &mut out, usize::MAX);
        out
    }

    /// Solutions extending `seed`, up to `limit`.
    #[must_use]
    pub fn solve_seeded(
        &self,
        patterns: &[TriplePattern],
        seed: &Bindings,
        limit: usize,
    ) -> Vec<Bindings> {
        let mut out = Vec::new();
        self.solve_into(patterns, seed.clone(), &mut out, limit);
        out
    }

    fn solve_into(
        &self,
        patterns: &[TriplePattern],
        bindings: Bindings,
        out: &mut Vec<Bindings>,
        limit: usize,
    ) {
        if out.len() >= limit {
            return;
        }
        let Some((first, rest)) = patterns.split_first() else {
            out.push(bindings);
            return;
        };

        let subject = match first.subject.resolve(&bindings) {
            Some(Term::Iri(iri)) => Some(iri),
            // A literal can never be a subject.
            Some(Term::Literal(_)) => return,
            None => None,
        };
        let predicate = match first.predicate.resolve(&bindings) {
            Some(Term::Iri(iri)) => Some(iri),
            Some(Term::Literal(_)) => return,
            None => None,
        };
        let object = first.object.resolve(&bindings);

        for triple in self.matching(subject.as_ref(), predicate.as_ref(), object.as_ref()) {
            let mut next = bindings.clone();
            if first.subject.bind(&mut next, Term::Iri(triple.subject))
                && first.predicate.bind(&mut next, Term::Iri(triple.predicate))
                && first.object.bind(&mut next, triple.object)
            {
                self.solve_into(rest, next, out, limit);
                if out.len() >= limit {
                    return;
                }
            }
        }
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut graph = Graph::new();
        graph.extend(iter);
        graph
    }
}

// =============================================================================
// SERIALIZABLE GRAPH
// =============================================================================

/// Flat, serializable form of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub triples: Vec<Triple>,
}

impl From<&Graph> for SerializableGraph {
    fn from(graph: &Graph) -> Self {
        Self {
            triples: graph.iter().collect(),
        }
    }
}

impl From<SerializableGraph> for Graph {
    fn from(sg: SerializableGraph) -> Self {
        sg.triples.into_iter().collect()
    }
}

// =============================================================================
// PATTERNS
// =============================================================================

/// Variable bindings produced by pattern matching.
pub type Bindings = BTreeMap<String, Term>;

/// One position of a triple pattern.
///
/// Serialized as its textual form: `?name` for variables, otherwise the
/// same term syntax accepted in graph payloads (`tourism:City`, `"4.5"`,
/// `<http://...>`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PatternTerm {
    Var(String),
    Const(Term),
}

impl PatternTerm {
    #[must_use]
    pub fn var(name: &str) -> Self {
        Self::Var(name.to_string())
    }

    #[must_use]
    pub fn iri(iri: Iri) -> Self {
        Self::Const(Term::Iri(iri))
    }

    /// Current value under `bindings`, if known.
    #[must_use]
    pub fn resolve(&self, bindings: &Bindings) -> Option<Term> {
        match self {
            Self::Var(name) => bindings.get(name).cloned(),
            Self::Const(term) => Some(term.clone()),
        }
    }

    /// Unify with `value`, extending `bindings`. Returns `false` on mismatch.
    fn bind(&self, bindings: &mut Bindings, value: Term) -> bool {
        match self {
            Self::Const(term) => *term == value,
            Self::Var(name) => match bindings.get(name) {
                Some(existing) => *existing == value,
                None => {
                    bindings.insert(name.clone(), value);
                    true
                }
            },
        }
    }

    #[must_use]
    pub fn as_var(&self) -> Option<&str> {
        match self {
            Self::Var(name) => Some(name),
            Self::Const(_) => None,
        }
    }
}

impl fmt::Display for PatternTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "?{name}"),
            Self::Const(term) => f.write_str(&turtle::render_term(term)),
        }
    }
}

impl TryFrom<String> for PatternTerm {
    type Error = turtle::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        turtle::parse_pattern_term(&value)
    }
}

impl From<PatternTerm> for String {
    fn from(value: PatternTerm) -> Self {
        value.to_string()
    }
}

/// A triple pattern. Serialized as a three-element array.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[PatternTerm; 3]", into = "[PatternTerm; 3]")]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    #[must_use]
    pub fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Variables mentioned by the pattern.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<&str> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(PatternTerm::as_var)
            .collect()
    }
}

impl From<[PatternTerm; 3]> for TriplePattern {
    fn from([subject, predicate, object]: [PatternTerm; 3]) -> Self {
        Self::new(subject, predicate, object)
    }
}

impl From<TriplePattern> for [PatternTerm; 3] {
    fn from(value: TriplePattern) -> Self {
        [value.subject, value.predicate, value.object]
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

// =============================================================================
// FILTERS
// =============================================================================

/// Numeric comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
}

impl CompareOp {
    #[must_use]
    pub fn holds(self, left: Decimal, right: Decimal) -> bool {
        match self {
            Self::Gt => left > right,
            Self::Ge => left >= right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Eq => left == right,
        }
    }
}

/// A condition applied to each solution of a rule pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    /// `?var <op> value`, compared numerically.
    Compare {
        var: String,
        op: CompareOp,
        value: Decimal,
    },
    /// Two variables bound to different terms.
    NotEqual { left: String, right: String },
    /// No solution exists for the patterns under the current bindings.
    NotExists { patterns: Vec<TriplePattern> },
}

/// Why a filter could not be evaluated for one solution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("variable ?{0} is not bound")]
    Unbound(String),
    #[error("?{var} is bound to non-numeric value '{value}'")]
    NotNumeric { var: String, value: String },
}

impl Filter {
    /// Variables that must already be bound when the filter runs.
    #[must_use]
    pub fn required_variables(&self) -> BTreeSet<&str> {
        match self {
            Self::Compare { var, .. } => BTreeSet::from([var.as_str()]),
            Self::NotEqual { left, right } => BTreeSet::from([left.as_str(), right.as_str()]),
            Self::NotExists { .. } => BTreeSet::new(),
        }
    }

    /// Evaluate under `bindings` against `graph`.
    pub fn evaluate(&self, graph: &Graph, bindings: &Bindings) -> Result<bool, FilterError> {
        match self {
            Self::Compare { var, op, value } => {
                let bound = bindings
                    .get(var)
                    .ok_or_else(|| FilterError::Unbound(var.clone()))?;
                let number = bound.as_decimal().ok_or_else(|| FilterError::NotNumeric {
                    var: var.clone(),
                    value: bound.to_string(),
                })?;
                Ok(op.holds(number, *value))
            }
            Self::NotEqual { left, right } => {
                let l = bindings
                    .get(left)
                    .ok_or_else(|| FilterError::Unbound(left.clone()))?;
                let r = bindings
                    .get(right)
                    .ok_or_else(|| FilterError::Unbound(right.clone()))?;
                Ok(l != r)
            }
            Self::NotExists { patterns } => {
                Ok(graph.solve_seeded(patterns, bindings, 1).is_empty())
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
