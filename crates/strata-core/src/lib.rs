//! # strata-core
//!
//! The validation-and-promotion pipeline for Strata - THE LOGIC.
//!
//! Agents write candidate facts into private Staging graphs. Every write is
//! checked by a fixed sequence of gates (authentication, parsing, layer
//! consistency, shapes, forward-chaining reasoning, global consistency)
//! before it becomes visible, and a two-stage commit promotes validated data
//! from Staging into a per-session Consensus graph and from there into Main.
//!
//! ## Layout
//!
//! - `types`, `graph`, `formats`, `query`: the triple model, pattern
//!   matching, the Turtle subset and `SELECT` queries
//! - `rules`, `reasoning`: rules as data and the forward-chaining engine
//! - `consistency`, `shapes`: the checks the gates run
//! - `storage`: the layer store seam and its backends
//! - `gateway`: the service context orchestrating all of the above
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies
//! - Deterministic: BTreeMap/BTreeSet only, fixed-point numerics, no floats
//! - Store calls are the only blocking points and are bounded by deadlines

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod consistency;
pub mod formats;
pub mod gateway;
pub mod graph;
pub mod primitives;
pub mod query;
pub mod reasoning;
pub mod rules;
pub mod shapes;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AgentId, Contradiction, ContradictionKind, Datatype, Decimal, GraphName, Iri, Literal,
    Permission, SessionId, StrataError, Term, Triple,
};

// =============================================================================
// RE-EXPORTS: Pipeline
// =============================================================================

pub use config::{StoreConfig, StrataConfig};
pub use consistency::{OntologyConstraints, RangeConstraint};
pub use gateway::{
    AgentSummary, DeltaOperation, ErrorCategory, Gateway, GatewayStatus, GateError, Metrics,
    PipelineState, ProvenanceRecord, Rejection, StandingGraphs, ValidationResult,
};
pub use graph::{Bindings, Graph, PatternTerm, TriplePattern};
pub use query::{QueryResult, SelectQuery};
pub use reasoning::{Inference, Reasoner, ReasoningOutcome};
pub use rules::{Rule, RuleError, RuleSet};
pub use shapes::{Severity, ShapeReport, ShapeSet, ShapeValidator, ShapeViolation};
pub use storage::{
    LayerStore, MemoryStore, RedbStore, RetryingStore, StorageBackend, StoreError, StoreSettings,
};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{ParseError, Snapshot, parse_graph, snapshot_from_bytes, snapshot_to_bytes, to_turtle};
