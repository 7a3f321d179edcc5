//! # Pipeline Outcomes
//!
//! Typed results of the gate sequence.
//!
//! | State | Gate passed |
//! |-------|-------------|
//! | Received | request accepted for processing |
//! | Authenticated | agent exists, is active, holds the permissions |
//! | Parsed | payload is a well-formed set of triples |
//! | AgentConsistent | staged data agrees with Consensus and Main |
//! | ShapeValid | merged view conforms to the shapes |
//! | Reasoned | forward chaining found no contradiction |
//! | GloballyConsistent | functional/range checks pass |
//! | Committed | data written |
//!
//! Failing any gate moves the request to `Rejected` with every error that
//! gate found.

use crate::reasoning::Inference;
use crate::shapes::ShapeViolation;
use crate::Contradiction;
use crate::formats::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// PIPELINE STATE
// =============================================================================

/// Where a request stands in the gate sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Authenticated,
    Parsed,
    AgentConsistent,
    ShapeValid,
    Reasoned,
    GloballyConsistent,
    Committed,
    Rejected,
}

impl PipelineState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Authenticated => "authenticated",
            Self::Parsed => "parsed",
            Self::AgentConsistent => "agent_consistent",
            Self::ShapeValid => "shape_valid",
            Self::Reasoned => "reasoned",
            Self::GloballyConsistent => "globally_consistent",
            Self::Committed => "committed",
            Self::Rejected => "rejected",
        }
    }

    /// The state reached by passing the next gate.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Authenticated),
            Self::Authenticated => Some(Self::Parsed),
            Self::Parsed => Some(Self::AgentConsistent),
            Self::AgentConsistent => Some(Self::ShapeValid),
            Self::ShapeValid => Some(Self::Reasoned),
            Self::Reasoned => Some(Self::GloballyConsistent),
            Self::GloballyConsistent => Some(Self::Committed),
            Self::Committed | Self::Rejected => None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Rejected)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Failure category, used for metrics and for callers that only need to
/// tell "your data is invalid" from "the system failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Parse,
    Shape,
    Contradiction,
    Consistency,
    System,
}

/// One error reported by a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum GateError {
    Authentication {
        message: String,
    },
    Parse {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },
    /// One shape constraint breach.
    Shape(ShapeViolation),
    /// A contradiction found by reasoning.
    Contradiction(Contradiction),
    /// A functional, range, disjointness or cross-layer violation.
    Consistency(Contradiction),
    /// Backend failure. The message never carries internal detail.
    System {
        message: String,
    },
}

impl GateError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Parse { .. } => ErrorCategory::Parse,
            Self::Shape(_) => ErrorCategory::Shape,
            Self::Contradiction(_) => ErrorCategory::Contradiction,
            Self::Consistency(_) => ErrorCategory::Consistency,
            Self::System { .. } => ErrorCategory::System,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Authentication { message } | Self::Parse { message, .. } | Self::System { message } => {
                message
            }
            Self::Shape(violation) => &violation.message,
            Self::Contradiction(c) | Self::Consistency(c) => &c.explanation,
        }
    }

    pub(crate) fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub(crate) fn system() -> Self {
        Self::System {
            message: "the system could not process the request".to_string(),
        }
    }
}

impl From<ParseError> for GateError {
    fn from(err: ParseError) -> Self {
        Self::Parse {
            message: err.message,
            line: Some(err.line),
            column: Some(err.column),
        }
    }
}

/// A failed gate and everything it found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// The state the request failed to reach.
    pub gate: PipelineState,
    pub errors: Vec<GateError>,
    /// A promotion was made and then reverted.
    pub rolled_back: bool,
}

impl Rejection {
    #[must_use]
    pub fn new(gate: PipelineState, errors: Vec<GateError>) -> Self {
        Self {
            gate,
            errors,
            rolled_back: false,
        }
    }

    #[must_use]
    pub fn single(gate: PipelineState, error: GateError) -> Self {
        Self::new(gate, vec![error])
    }

    /// Category of the rejection (of its first error).
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.errors
            .first()
            .map(GateError::category)
            .unwrap_or(ErrorCategory::System)
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        if self.category() == ErrorCategory::System {
            return "System failure";
        }
        match self.gate {
            PipelineState::Authenticated => "Authentication failed",
            PipelineState::Parsed => "Invalid payload",
            PipelineState::AgentConsistent => "Staged data conflicts with shared layers",
            PipelineState::ShapeValid => "Shape validation failed",
            PipelineState::Reasoned => "Logic contradiction detected",
            PipelineState::GloballyConsistent => "Consistency validation failed",
            _ => "Request rejected",
        }
    }
}

// =============================================================================
// VALIDATION RESULT
// =============================================================================

/// What the gate sequence produced for an accepted candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Accepted {
    pub derived: Vec<Inference>,
    pub iterations: u32,
    pub reached_fixpoint: bool,
}

/// Result of `submit_delta`, `commit_session` and `promote_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    /// `Committed` or `Rejected`.
    pub state: PipelineState,
    pub message: String,
    /// Gate that failed, when rejected.
    pub failed_gate: Option<PipelineState>,
    pub errors: Vec<GateError>,
    pub derived: Vec<Inference>,
    pub iterations: u32,
    pub reached_fixpoint: bool,
    pub rolled_back: bool,
    pub processing_micros: u64,
}

impl ValidationResult {
    pub(crate) fn accepted(message: &str, accepted: Accepted, processing_micros: u64) -> Self {
        Self {
            success: true,
            state: PipelineState::Committed,
            message: message.to_string(),
            failed_gate: None,
            errors: Vec::new(),
            derived: accepted.derived,
            iterations: accepted.iterations,
            reached_fixpoint: accepted.reached_fixpoint,
            rolled_back: false,
            processing_micros,
        }
    }

    pub(crate) fn rejected(rejection: Rejection, processing_micros: u64) -> Self {
        Self {
            success: false,
            state: PipelineState::Rejected,
            message: rejection.message().to_string(),
            failed_gate: Some(rejection.gate),
            errors: rejection.errors,
            derived: Vec::new(),
            iterations: 0,
            reached_fixpoint: false,
            rolled_back: rejection.rolled_back,
            processing_micros,
        }
    }

    /// Category of the failure, `None` on success.
    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        self.errors.first().map(GateError::category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_advance_in_gate_order() {
        let mut state = PipelineState::Received;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            visited.push(next);
            state = next;
        }
        assert_eq!(visited.len(), 8);
        assert_eq!(state, PipelineState::Committed);
        assert!(state.is_terminal());
        assert!(PipelineState::Rejected.next().is_none());
    }

    #[test]
    fn gate_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(GateError::parse("bad")).expect("serialize");
        assert_eq!(json["category"], "parse");
        assert_eq!(json["message"], "bad");
    }

    #[test]
    fn system_rejection_hides_gate_message() {
        let rejection = Rejection::single(PipelineState::ShapeValid, GateError::system());
        assert_eq!(rejection.category(), ErrorCategory::System);
        assert_eq!(rejection.message(), "System failure");

        let result = ValidationResult::rejected(rejection, 5);
        assert!(!result.success);
        assert_eq!(result.failed_gate, Some(PipelineState::ShapeValid));
        assert_eq!(result.category(), Some(ErrorCategory::System));
    }

    #[test]
    fn parse_error_keeps_position() {
        let err = GateError::from(ParseError {
            line: 3,
            column: 7,
            message: "expected '.'".to_string(),
        });
        assert!(matches!(err, GateError::Parse { line: Some(3), column: Some(7), .. }));
    }
}
