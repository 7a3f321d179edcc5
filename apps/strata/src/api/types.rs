//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Write operations answer with the gateway's `ValidationResult` as is;
//! the types here cover everything around it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_core::{
    AgentId, AgentSummary, DeltaOperation, GateError, GatewayStatus, Permission, PipelineState,
    QueryResult, Rejection, SessionId, StrataError, formats::turtle::render_term,
};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Layer status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Graph key to triple count.
    pub layers: BTreeMap<String, usize>,
    pub total_triples: usize,
    pub agents: usize,
    pub rule_version: u32,
    pub rules: usize,
}

impl From<GatewayStatus> for StatusResponse {
    fn from(status: GatewayStatus) -> Self {
        Self {
            total_triples: status.layers.values().sum(),
            layers: status.layers,
            agents: status.agents,
            rule_version: status.rule_version,
            rules: status.rules,
        }
    }
}

// =============================================================================
// AGENT REGISTRATION
// =============================================================================

/// Agent registration request (admin).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAgentRequest {
    pub agent_id: String,
    pub secret: String,
    /// Empty grants `read` and `write_staging`.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl RegisterAgentRequest {
    /// Validate the identifier and secret.
    pub fn to_agent(&self) -> Result<AgentId, StrataError> {
        if self.secret.is_empty() {
            return Err(StrataError::InvalidIdentifier(
                "secret must not be empty".to_string(),
            ));
        }
        AgentId::new(self.agent_id.as_str())
    }
}

/// Agent registration response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAgentResponse {
    pub success: bool,
    /// False when an existing agent was re-registered.
    pub created: bool,
    pub error: Option<String>,
}

impl RegisterAgentResponse {
    #[must_use]
    pub fn success(created: bool) -> Self {
        Self {
            success: true,
            created,
            error: None,
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            created: false,
            error: Some(msg.into()),
        }
    }
}

/// Registered agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentSummary>,
}

// =============================================================================
// DELTA / COMMIT / PROMOTE REQUESTS
// =============================================================================

/// Submit a delta to the caller's staging graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaRequest {
    pub session_id: String,
    /// URI of the caller's staging graph.
    pub target_graph: String,
    /// Turtle text.
    pub payload: String,
    #[serde(default)]
    pub operation: DeltaOperation,
}

/// Commit the caller's staging graph into the session's consensus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub session_id: String,
    /// Defaults to the caller's own staging graph.
    #[serde(default)]
    pub staging_graph: Option<String>,
}

/// Promote the session's consensus into main.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteRequest {
    pub session_id: String,
}

/// Parse a session id from a request body.
pub fn parse_session(raw: &str) -> Result<SessionId, StrataError> {
    SessionId::new(raw)
}

// =============================================================================
// QUERY REQUEST/RESPONSE
// =============================================================================

/// `SELECT` query request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Scope to one named graph; all graphs when absent.
    #[serde(default)]
    pub graph_uri: Option<String>,
}

/// Query response. Bound terms are rendered in payload syntax.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub variables: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
    pub error: Option<String>,
    #[serde(default)]
    pub errors: Vec<GateError>,
}

impl QueryResponse {
    #[must_use]
    pub fn success(result: &QueryResult) -> Self {
        let rows = result
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(var, term)| (var.clone(), render_term(term)))
                    .collect()
            })
            .collect();
        Self {
            success: true,
            variables: result.variables.clone(),
            rows,
            error: None,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn rejected(rejection: Rejection) -> Self {
        Self {
            success: false,
            variables: Vec::new(),
            rows: Vec::new(),
            error: Some(rejection.message().to_string()),
            errors: rejection.errors,
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Error body for requests that never reached the gateway or failed
/// outside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(default)]
    pub failed_gate: Option<PipelineState>,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
            failed_gate: None,
        }
    }

    #[must_use]
    pub fn at_gate(msg: impl Into<String>, gate: PipelineState) -> Self {
        Self {
            failed_gate: Some(gate),
            ..Self::new(msg)
        }
    }
}

/// Query string of `GET /provenance`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvenanceParams {
    #[serde(default)]
    pub agent_id: Option<String>,
}
