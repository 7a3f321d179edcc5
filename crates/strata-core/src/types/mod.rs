//! # Core Type Definitions
//!
//! This module contains the data model shared by every pipeline stage:
//! - RDF terms (`Iri`, `Literal`, `Term`) and the `Triple`
//! - Identifiers (`AgentId`, `SessionId`) and permissions
//! - Named graph layers (`GraphName`)
//! - Error types (`StrataError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Use integer arithmetic only (see `Decimal`)

mod decimal;

pub use decimal::Decimal;

use crate::formats::turtle::ParseError;
use crate::primitives::{self, MAX_IDENTIFIER_LENGTH, MAX_IRI_LENGTH, MAX_LITERAL_LENGTH};
use crate::rules::RuleError;
use crate::storage::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// TERMS
// =============================================================================

/// An absolute IRI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iri(String);

impl Iri {
    /// Validate and wrap an IRI.
    ///
    /// Rejects empty values, values over `MAX_IRI_LENGTH`, values without a
    /// scheme and values containing whitespace or characters that are
    /// illegal inside `<...>`.
    pub fn new(value: impl Into<String>) -> Result<Self, StrataError> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_IRI_LENGTH {
            return Err(StrataError::InvalidTerm(format!(
                "IRI length must be 1..={MAX_IRI_LENGTH}"
            )));
        }
        if let Some(bad) = value
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || "<>\"{}|^`\\".contains(*c))
        {
            return Err(StrataError::InvalidTerm(format!(
                "illegal character {bad:?} in IRI '{value}'"
            )));
        }
        if !value.contains(':') {
            return Err(StrataError::InvalidTerm(format!(
                "IRI '{value}' has no scheme"
            )));
        }
        Ok(Self(value))
    }

    /// An IRI in the tourism namespace.
    #[must_use]
    pub fn tourism(local: &str) -> Self {
        Self(format!("{}{local}", primitives::TOURISM))
    }

    /// An IRI in the `sh:` namespace.
    #[must_use]
    pub fn shacl(local: &str) -> Self {
        Self(format!("{}{local}", primitives::SHACL))
    }

    /// `rdf:type`.
    #[must_use]
    pub fn rdf_type() -> Self {
        Self(primitives::RDF_TYPE.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after the last `#` or `/`.
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.0
            .rfind(['#', '/'])
            .map(|idx| &self.0[idx + 1..])
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Iri {
    type Error = StrataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Iri> for String {
    fn from(value: Iri) -> Self {
        value.0
    }
}

/// Literal datatype.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Datatype {
    String,
    /// Language-tagged string (`"..."@en`).
    LangString(String),
    Integer,
    Decimal,
    Double,
    Boolean,
    DateTime,
    Other(Iri),
}

impl Datatype {
    /// Map a datatype IRI onto the known variants.
    #[must_use]
    pub fn from_iri(iri: &Iri) -> Self {
        match iri.as_str().strip_prefix(primitives::XSD) {
            Some("string") => Self::String,
            Some("integer" | "int" | "long" | "short" | "nonNegativeInteger") => Self::Integer,
            Some("decimal") => Self::Decimal,
            Some("double" | "float") => Self::Double,
            Some("boolean") => Self::Boolean,
            Some("dateTime") => Self::DateTime,
            _ => Self::Other(iri.clone()),
        }
    }

    /// The datatype IRI as text.
    #[must_use]
    pub fn iri(&self) -> String {
        let xsd = |local: &str| format!("{}{local}", primitives::XSD);
        match self {
            Self::String => xsd("string"),
            Self::LangString(_) => format!("{}langString", primitives::RDF),
            Self::Integer => xsd("integer"),
            Self::Decimal => xsd("decimal"),
            Self::Double => xsd("double"),
            Self::Boolean => xsd("boolean"),
            Self::DateTime => xsd("dateTime"),
            Self::Other(iri) => iri.as_str().to_string(),
        }
    }

    /// `true` for integer, decimal and double.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal | Self::Double)
    }
}

/// A typed literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Datatype,
}

impl Literal {
    /// Build a literal, enforcing `MAX_LITERAL_LENGTH`.
    pub fn new(lexical: impl Into<String>, datatype: Datatype) -> Result<Self, StrataError> {
        let lexical = lexical.into();
        if lexical.len() > MAX_LITERAL_LENGTH {
            return Err(StrataError::InvalidTerm(format!(
                "literal exceeds {MAX_LITERAL_LENGTH} bytes"
            )));
        }
        Ok(Self { lexical, datatype })
    }

    /// Plain `xsd:string` literal.
    #[must_use]
    pub fn string(value: &str) -> Self {
        Self {
            lexical: value.to_string(),
            datatype: Datatype::String,
        }
    }

    #[must_use]
    pub fn decimal(value: Decimal) -> Self {
        Self {
            lexical: value.to_string(),
            datatype: Datatype::Decimal,
        }
    }

    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self {
            lexical: value.to_string(),
            datatype: Datatype::Integer,
        }
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self {
            lexical: value.to_string(),
            datatype: Datatype::Boolean,
        }
    }

    /// Exact numeric value, when the datatype is numeric and the lexical form
    /// parses without losing digits.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        if self.datatype.is_numeric() {
            Decimal::parse_exact(&self.lexical)
        } else {
            None
        }
    }

    /// Boolean value of an `xsd:boolean` literal.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match (&self.datatype, self.lexical.as_str()) {
            (Datatype::Boolean, "true" | "1") => Some(true),
            (Datatype::Boolean, "false" | "0") => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical)
    }
}

/// Object position of a triple: an IRI or a literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    Iri(Iri),
    Literal(Literal),
}

impl Term {
    #[must_use]
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Self::Iri(iri) => Some(iri),
            Self::Literal(_) => None,
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(lit) => Some(lit),
            Self::Iri(_) => None,
        }
    }

    /// Numeric value of a numeric literal.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        self.as_literal().and_then(Literal::as_decimal)
    }
}

impl From<Iri> for Term {
    fn from(value: Iri) -> Self {
        Self::Iri(value)
    }
}

impl From<Literal> for Term {
    fn from(value: Literal) -> Self {
        Self::Literal(value)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => iri.fmt(f),
            Self::Literal(lit) => lit.fmt(f),
        }
    }
}

// =============================================================================
// TRIPLE
// =============================================================================

/// A (subject, predicate, object) statement. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Iri,
    pub predicate: Iri,
    pub object: Term,
}

impl Triple {
    #[must_use]
    pub fn new(subject: Iri, predicate: Iri, object: impl Into<Term>) -> Self {
        Self {
            subject,
            predicate,
            object: object.into(),
        }
    }

    /// `subject rdf:type class`.
    #[must_use]
    pub fn typed(subject: Iri, class: Iri) -> Self {
        Self::new(subject, Iri::rdf_type(), class)
    }

    /// Stable content identifier (BLAKE3 over the postcard encoding).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let bytes = postcard::to_stdvec(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex()[..16].to_string()
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

fn validate_identifier(kind: &str, value: &str) -> Result<(), StrataError> {
    if value.is_empty() || value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(StrataError::InvalidIdentifier(format!(
            "{kind} must be 1..={MAX_IDENTIFIER_LENGTH} characters"
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(StrataError::InvalidIdentifier(format!(
            "{kind} '{value}' may only contain [A-Za-z0-9._-]"
        )));
    }
    Ok(())
}

/// Identifier of an agent. Safe to embed in a graph URI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    pub fn new(value: impl Into<String>) -> Result<Self, StrataError> {
        let value = value.into();
        validate_identifier("agent id", &value)?;
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a collaboration session. Safe to embed in a graph URI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Result<Self, StrataError> {
        let value = value.into();
        validate_identifier("session id", &value)?;
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! identifier_conversions {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = StrataError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }
    };
}

identifier_conversions!(AgentId);
identifier_conversions!(SessionId);

/// Permission flags held by an agent credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    WriteStaging,
    WriteConsensus,
}

impl Permission {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::WriteStaging => "write_staging",
            Self::WriteConsensus => "write_consensus",
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write_staging" | "write-staging" => Ok(Self::WriteStaging),
            "write_consensus" | "write-consensus" => Ok(Self::WriteConsensus),
            other => Err(StrataError::InvalidIdentifier(format!(
                "unknown permission '{other}'"
            ))),
        }
    }
}

// =============================================================================
// GRAPH LAYERS
// =============================================================================

/// A named graph partition.
///
/// `Main`, `Consensus` and `Staging` are the isolation layers data moves
/// through; `Ontology`, `Shapes` and `Rules` are the standing definition
/// graphs loaded once at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "layer", content = "id", rename_all = "snake_case")]
pub enum GraphName {
    Main,
    Consensus(SessionId),
    Staging(AgentId),
    Ontology,
    Shapes,
    Rules,
}

impl GraphName {
    /// Render the graph URI under `base`.
    #[must_use]
    pub fn uri(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self {
            Self::Main => format!("{base}/main"),
            Self::Consensus(session) => format!("{base}/consensus/{session}"),
            Self::Staging(agent) => format!("{base}/staging/{agent}"),
            Self::Ontology => format!("{base}/ontology"),
            Self::Shapes => format!("{base}/shapes"),
            Self::Rules => format!("{base}/rules"),
        }
    }

    /// Inverse of [`GraphName::uri`]. `None` for URIs outside `base`.
    #[must_use]
    pub fn parse(base: &str, uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(base.trim_end_matches('/'))?;
        let rest = rest.strip_prefix('/')?;
        match rest {
            "main" => Some(Self::Main),
            "ontology" => Some(Self::Ontology),
            "shapes" => Some(Self::Shapes),
            "rules" => Some(Self::Rules),
            _ => {
                if let Some(session) = rest.strip_prefix("consensus/") {
                    SessionId::new(session).ok().map(Self::Consensus)
                } else if let Some(agent) = rest.strip_prefix("staging/") {
                    AgentId::new(agent).ok().map(Self::Staging)
                } else {
                    None
                }
            }
        }
    }

    /// Short, URI-independent key (`main`, `consensus/s1`, ...).
    #[must_use]
    pub fn key(&self) -> String {
        self.uri("")
            .trim_start_matches('/')
            .to_string()
    }

    /// Inverse of [`GraphName::key`].
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::parse("", &format!("/{key}"))
    }
}

impl fmt::Display for GraphName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// =============================================================================
// CONTRADICTIONS
// =============================================================================

/// Classification of a contradiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    /// Entity typed with two mutually exclusive classes.
    DisjointClass,
    /// Single-valued property with several values.
    FunctionalProperty,
    /// Numeric value outside its declared bounds.
    Range,
    /// Two layers disagree on the same entity/property.
    CrossLayer,
}

impl ContradictionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DisjointClass => "disjoint_class",
            Self::FunctionalProperty => "functional_property",
            Self::Range => "range",
            Self::CrossLayer => "cross_layer",
        }
    }
}

/// An entity holding mutually exclusive facts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Contradiction {
    pub kind: ContradictionKind,
    pub entity: Iri,
    /// Property involved, for property-level checks.
    pub property: Option<Iri>,
    /// The conflicting types or values.
    pub conflicting: BTreeSet<Term>,
    pub explanation: String,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Strata CORE.
///
/// - No silent failures
/// - Use `Result<T, StrataError>` for fallible operations
/// - The CORE never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum StrataError {
    /// A term (IRI or literal) is malformed.
    #[error("Invalid term: {0}")]
    InvalidTerm(String),

    /// An agent, session or permission identifier is malformed.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Textual graph or query input could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A query is well-formed but outside the accepted limits.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The layer store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A rule definition is malformed.
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================
