//! # Rules
//!
//! Derivation and contradiction rules, represented as data.
//!
//! A rule is a conjunctive pattern plus filters, evaluated against a graph
//! view with the same join `Graph::solve` provides. What happens with each
//! solution depends on the variant:
//!
//! - `Derivation`: instantiate the action templates into new triples
//! - `ContradictionCheck`: report the bound entity as self-contradictory
//!
//! Rule sets load from TOML (see `config/standard_rules.toml`) or are built
//! in code with `RuleSet::standard()`.

mod standard;

use crate::graph::{Bindings, Filter, PatternTerm, TriplePattern};
use crate::primitives::RDFS;
use crate::{Contradiction, ContradictionKind, Graph, Iri, Literal, StrataError, Term, Triple};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

// =============================================================================
// ERRORS
// =============================================================================

/// A rule that cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The rule's structure is invalid.
    #[error("rule '{rule}' is malformed: {message}")]
    Malformed { rule: String, message: String },

    /// Two rules share an id.
    #[error("duplicate rule id '{0}'")]
    DuplicateId(String),

    /// The rule file could not be read.
    #[error("invalid rule file: {0}")]
    Format(String),
}

// =============================================================================
// TEMPLATES
// =============================================================================

/// One position of a derivation template.
///
/// In TOML a template term is either a pattern term string (`"?a"`,
/// `"tourism:CoastalAttraction"`) or a mint table
/// (`{ mint = "http://example.org/tourism#Destination", parts = ["c", "a"] }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateTerm {
    /// Deterministic IRI: `mint` + `_<local name of ?part>` for each part.
    Mint { mint: Iri, parts: Vec<String> },
    Pattern(PatternTerm),
}

impl TemplateTerm {
    #[must_use]
    pub fn var(name: &str) -> Self {
        Self::Pattern(PatternTerm::var(name))
    }

    #[must_use]
    pub fn iri(iri: Iri) -> Self {
        Self::Pattern(PatternTerm::iri(iri))
    }

    fn variables(&self) -> Vec<&str> {
        match self {
            Self::Mint { parts, .. } => parts.iter().map(String::as_str).collect(),
            Self::Pattern(term) => term.as_var().into_iter().collect(),
        }
    }

    fn instantiate(&self, bindings: &Bindings) -> Result<Term, String> {
        match self {
            Self::Pattern(PatternTerm::Const(term)) => Ok(term.clone()),
            Self::Pattern(PatternTerm::Var(name)) => bindings
                .get(name)
                .cloned()
                .ok_or_else(|| format!("?{name} is not bound")),
            Self::Mint { mint, parts } => {
                let mut minted = mint.as_str().to_string();
                for part in parts {
                    let bound = bindings
                        .get(part)
                        .ok_or_else(|| format!("?{part} is not bound"))?;
                    let iri = bound
                        .as_iri()
                        .ok_or_else(|| format!("?{part} must be bound to an IRI to mint a name"))?;
                    minted.push('_');
                    minted.push_str(iri.local_name());
                }
                Iri::new(minted)
                    .map(Term::Iri)
                    .map_err(|e| e.to_string())
            }
        }
    }
}

/// A triple template in a derivation action. Serialized as a 3-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[TemplateTerm; 3]", into = "[TemplateTerm; 3]")]
pub struct TripleTemplate {
    pub subject: TemplateTerm,
    pub predicate: TemplateTerm,
    pub object: TemplateTerm,
}

impl TripleTemplate {
    #[must_use]
    pub fn new(subject: TemplateTerm, predicate: TemplateTerm, object: TemplateTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    fn instantiate(&self, bindings: &Bindings) -> Result<Triple, String> {
        let subject = match self.subject.instantiate(bindings)? {
            Term::Iri(iri) => iri,
            Term::Literal(lit) => return Err(format!("literal '{lit}' in subject position")),
        };
        let predicate = match self.predicate.instantiate(bindings)? {
            Term::Iri(iri) => iri,
            Term::Literal(lit) => return Err(format!("literal '{lit}' in predicate position")),
        };
        Ok(Triple::new(subject, predicate, self.object.instantiate(bindings)?))
    }
}

impl From<[TemplateTerm; 3]> for TripleTemplate {
    fn from([subject, predicate, object]: [TemplateTerm; 3]) -> Self {
        Self::new(subject, predicate, object)
    }
}

impl From<TripleTemplate> for [TemplateTerm; 3] {
    fn from(value: TripleTemplate) -> Self {
        [value.subject, value.predicate, value.object]
    }
}

// =============================================================================
// RULE
// =============================================================================

/// A rule: pattern + filters + what to do with each solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    /// Produces new triples from each solution.
    Derivation {
        id: String,
        pattern: Vec<TriplePattern>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        filters: Vec<Filter>,
        action: Vec<TripleTemplate>,
    },
    /// Flags the bound entity as holding mutually exclusive facts.
    ContradictionCheck {
        id: String,
        pattern: Vec<TriplePattern>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        filters: Vec<Filter>,
        /// Variable holding the contradictory entity.
        entity: String,
        /// Conflicting values to report (constants or variables).
        conflicting: Vec<PatternTerm>,
        kind: ContradictionKind,
        /// Message; `{entity}` is replaced by the entity IRI.
        explanation: String,
    },
}

/// What one evaluation of a rule produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutput {
    Derived(Vec<Triple>),
    Contradictions(Vec<Contradiction>),
}

impl Rule {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Derivation { id, .. } | Self::ContradictionCheck { id, .. } => id,
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &[TriplePattern] {
        match self {
            Self::Derivation { pattern, .. } | Self::ContradictionCheck { pattern, .. } => pattern,
        }
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        match self {
            Self::Derivation { filters, .. } | Self::ContradictionCheck { filters, .. } => filters,
        }
    }

    #[must_use]
    pub fn derives_facts(&self) -> bool {
        matches!(self, Self::Derivation { .. })
    }

    #[must_use]
    pub fn detects_contradictions(&self) -> bool {
        matches!(self, Self::ContradictionCheck { .. })
    }

    fn malformed(&self, message: impl Into<String>) -> RuleError {
        RuleError::Malformed {
            rule: self.id().to_string(),
            message: message.into(),
        }
    }

    /// Structural check: every variable a filter, template or report uses
    /// must be bound by the pattern.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.id().trim().is_empty() {
            return Err(self.malformed("empty id"));
        }
        if self.pattern().is_empty() {
            return Err(self.malformed("empty pattern"));
        }
        let bound: BTreeSet<&str> = self
            .pattern()
            .iter()
            .flat_map(TriplePattern::variables)
            .collect();
        let require = |var: &str, context: &str| -> Result<(), RuleError> {
            if bound.contains(var) {
                Ok(())
            } else {
                Err(self.malformed(format!("{context} uses ?{var}, which the pattern does not bind")))
            }
        };

        for filter in self.filters() {
            for var in filter.required_variables() {
                require(var, "filter")?;
            }
        }

        match self {
            Self::Derivation { action, .. } => {
                if action.is_empty() {
                    return Err(self.malformed("derivation has no action"));
                }
                for template in action {
                    for term in [&template.subject, &template.predicate] {
                        if matches!(term, TemplateTerm::Pattern(PatternTerm::Const(Term::Literal(_)))) {
                            return Err(self.malformed("literal in subject or predicate template"));
                        }
                    }
                    for term in [&template.subject, &template.predicate, &template.object] {
                        for var in term.variables() {
                            require(var, "action")?;
                        }
                    }
                }
            }
            Self::ContradictionCheck {
                entity,
                conflicting,
                ..
            } => {
                require(entity, "entity")?;
                if conflicting.is_empty() {
                    return Err(self.malformed("contradiction check names no conflicting values"));
                }
                for term in conflicting {
                    if let Some(var) = term.as_var() {
                        require(var, "conflicting")?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Evaluate against `graph`.
    ///
    /// Structural problems fail the whole evaluation. A solution whose
    /// filter or template cannot be evaluated (non-numeric comparison
    /// operand, literal where an IRI is required) is logged and skipped.
    pub fn evaluate(&self, graph: &Graph) -> Result<RuleOutput, RuleError> {
        self.validate()?;

        let mut solutions = Vec::new();
        'solutions: for bindings in graph.solve(self.pattern()) {
            for filter in self.filters() {
                match filter.evaluate(graph, &bindings) {
                    Ok(true) => {}
                    Ok(false) => continue 'solutions,
                    Err(e) => {
                        tracing::warn!(rule = self.id(), error = %e, "skipping solution");
                        continue 'solutions;
                    }
                }
            }
            solutions.push(bindings);
        }

        match self {
            Self::Derivation { action, .. } => {
                let mut derived = Vec::new();
                for bindings in &solutions {
                    for template in action {
                        match template.instantiate(bindings) {
                            Ok(triple) => derived.push(triple),
                            Err(message) => {
                                tracing::warn!(rule = self.id(), error = %message, "skipping template");
                            }
                        }
                    }
                }
                Ok(RuleOutput::Derived(derived))
            }
            Self::ContradictionCheck {
                entity,
                conflicting,
                kind,
                explanation,
                ..
            } => {
                let mut found = Vec::new();
                for bindings in &solutions {
                    let Some(Term::Iri(subject)) = bindings.get(entity) else {
                        tracing::warn!(rule = self.id(), "entity is not an IRI, skipping solution");
                        continue;
                    };
                    let values: BTreeSet<Term> = conflicting
                        .iter()
                        .filter_map(|term| term.resolve(bindings))
                        .collect();
                    found.push(Contradiction {
                        kind: *kind,
                        entity: subject.clone(),
                        property: None,
                        conflicting: values,
                        explanation: explanation.replace("{entity}", subject.as_str()),
                    });
                }
                Ok(RuleOutput::Contradictions(found))
            }
        }
    }
}

// =============================================================================
// RULE SET
// =============================================================================

/// Rules in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Version stamped on provenance records.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, rename = "rule")]
    pub rules: Vec<Rule>,
}

fn default_version() -> u32 {
    1
}

impl RuleSet {
    /// Build a set, rejecting duplicate ids.
    pub fn new(version: u32, rules: Vec<Rule>) -> Result<Self, RuleError> {
        let mut seen = BTreeMap::new();
        for (index, rule) in rules.iter().enumerate() {
            if seen.insert(rule.id().to_string(), index).is_some() {
                return Err(RuleError::DuplicateId(rule.id().to_string()));
            }
        }
        Ok(Self { version, rules })
    }

    /// Parse a TOML rule file.
    pub fn from_toml(text: &str) -> Result<Self, StrataError> {
        let parsed: RuleSet =
            toml::from_str(text).map_err(|e| RuleError::Format(e.to_string()))?;
        Ok(Self::new(parsed.version, parsed.rules)?)
    }

    /// The tourism rule set: five derivations and one contradiction check.
    #[must_use]
    pub fn standard() -> Self {
        standard::rule_set()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    /// Describe the set as triples for the standing rules graph.
    ///
    /// Each rule becomes `<base>/rules/<id>`, typed `<base>/rules#Derivation`
    /// or `<base>/rules#ContradictionCheck`, labelled with its id and
    /// stamped with the set version.
    pub fn catalogue(&self, base: &str) -> Result<Graph, StrataError> {
        let base = base.trim_end_matches('/');
        let vocab = |local: &str| Iri::new(format!("{base}/rules#{local}"));
        let label = Iri::new(format!("{RDFS}label"))?;
        let version = vocab("version")?;

        let mut graph = Graph::new();
        for rule in &self.rules {
            let subject = Iri::new(format!("{base}/rules/{}", rule.id()))?;
            let class = if rule.derives_facts() {
                "Derivation"
            } else {
                "ContradictionCheck"
            };
            graph.insert(Triple::typed(subject.clone(), vocab(class)?));
            graph.insert(Triple::new(
                subject.clone(),
                label.clone(),
                Literal::string(rule.id()),
            ));
            graph.insert(Triple::new(
                subject,
                version.clone(),
                Literal::integer(i64::from(self.version)),
            ));
        }
        Ok(graph)
    }

    /// Every rule that fails `Rule::validate`.
    #[must_use]
    pub fn malformed(&self) -> Vec<RuleError> {
        self.rules
            .iter()
            .filter_map(|r| r.validate().err())
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
