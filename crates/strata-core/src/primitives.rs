//! # Pipeline Primitives
//!
//! Compiled-in constants for the Strata CORE.
//!
//! Values that the deployment may want to tune (iteration cap, tolerance,
//! store timeouts) are defaults only; `StrataConfig` carries the live values.

// =============================================================================
// NAMESPACES
// =============================================================================

/// `rdf:` namespace.
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// `rdfs:` namespace.
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";

/// `xsd:` namespace.
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// `owl:` namespace.
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";

/// `sh:` namespace (shape definitions).
pub const SHACL: &str = "http://www.w3.org/ns/shacl#";

/// Tourism domain namespace used by the standard rules, shapes and constraints.
pub const TOURISM: &str = "http://example.org/tourism#";

/// `rdf:type`.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Default base URI for named graph layers.
///
/// Layers are rendered as `<base>/main`, `<base>/consensus/<session>` and
/// `<base>/staging/<agent>`.
pub const DEFAULT_BASE_URI: &str = "http://example.org";

// =============================================================================
// REASONING
// =============================================================================

/// Default cap on forward-chaining rounds per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Hard ceiling for a configured iteration cap.
pub const MAX_ITERATIONS_LIMIT: u32 = 1000;

// =============================================================================
// FIXED-POINT NUMERICS
// =============================================================================

/// Scale of `Decimal`: values are stored in millionths.
pub const DECIMAL_SCALE: i64 = 1_000_000;

/// Number of fractional digits kept by `Decimal`.
pub const DECIMAL_DIGITS: u32 = 6;

/// Default cross-layer tolerance, in millionths (1.0 on a 0-5 scale).
pub const DEFAULT_TOLERANCE_MILLIONTHS: i64 = 1_000_000;

// =============================================================================
// STORE ACCESS
// =============================================================================

/// Default deadline for one store call including its retries.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Default number of retries on a transient store failure.
pub const DEFAULT_STORE_RETRIES: u32 = 3;

/// Default pause between retries; attempt `n` waits `n * backoff`.
pub const DEFAULT_STORE_BACKOFF_MS: u64 = 50;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a textual payload accepted by the gateway (2 MiB).
pub const MAX_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Maximum number of triples in one delta.
pub const MAX_DELTA_TRIPLES: usize = 10_000;

/// Maximum length of an IRI.
pub const MAX_IRI_LENGTH: usize = 2048;

/// Maximum length of a literal's lexical form (64KB).
pub const MAX_LITERAL_LENGTH: usize = 65536;

/// Maximum length of an agent or session identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Maximum number of triple patterns in a query.
pub const MAX_QUERY_PATTERNS: usize = 32;

/// Maximum number of rows returned by a query.
pub const MAX_QUERY_ROWS: usize = 10_000;

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Magic bytes for the Strata snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"STRA";

/// Current snapshot format version.
pub const FORMAT_VERSION: u8 = 1;
