//! # API Endpoint Handlers
//!
//! Thin request/response mapping over the gateway. Gateway calls block on
//! the layer store, so every one of them runs on tokio's blocking pool.
//!
//! Status codes: 200 on success, 422 for validation rejections, 401 for
//! authentication failures, 503 for system failures.

use super::{
    AppState,
    auth::AuthenticatedAgent,
    types::{
        AgentsResponse, CommitRequest, DeltaRequest, ErrorResponse, HealthResponse,
        PromoteRequest, ProvenanceParams, QueryRequest, QueryResponse, RegisterAgentRequest,
        RegisterAgentResponse, StatusResponse, parse_session,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use strata_core::{
    AgentId, ErrorCategory, Gateway, GraphName, PipelineState, StorageBackend, ValidationResult,
};

// =============================================================================
// HELPERS
// =============================================================================

/// HTTP status for a failure category.
pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Authentication => StatusCode::UNAUTHORIZED,
        ErrorCategory::System => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Parse
        | ErrorCategory::Shape
        | ErrorCategory::Contradiction
        | ErrorCategory::Consistency => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn system_unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::new("System failure")),
    )
        .into_response()
}

fn bad_request(gate: PipelineState, msg: impl Into<String>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse::at_gate(msg, gate)),
    )
        .into_response()
}

/// Run a gateway call on the blocking pool.
async fn blocking<T, F>(state: &AppState, call: F) -> Result<T, Response>
where
    F: FnOnce(&Gateway<StorageBackend>) -> T + Send + 'static,
    T: Send + 'static,
{
    let gateway = state.gateway.clone();
    tokio::task::spawn_blocking(move || call(&gateway))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "gateway task failed");
            system_unavailable()
        })
}

fn validation_response(result: ValidationResult) -> Response {
    let status = result.category().map(status_for).unwrap_or(StatusCode::OK);
    (status, Json(result)).into_response()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// OPERATOR HANDLERS
// =============================================================================

/// Per-layer triple counts.
pub async fn status_handler(State(state): State<AppState>) -> Response {
    match blocking(&state, |gateway| gateway.status()).await {
        Ok(Ok(status)) => (StatusCode::OK, Json(StatusResponse::from(status))).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "status failed");
            system_unavailable()
        }
        Err(response) => response,
    }
}

/// Gateway metrics.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.gateway.metrics())
}

/// Provenance records, optionally for one agent.
pub async fn provenance_handler(
    State(state): State<AppState>,
    Query(params): Query<ProvenanceParams>,
) -> Response {
    let agent = match params.agent_id.as_deref().map(AgentId::new).transpose() {
        Ok(agent) => agent,
        Err(e) => return bad_request(PipelineState::Parsed, e.to_string()),
    };
    Json(state.gateway.provenance(agent.as_ref())).into_response()
}

/// Registered agents.
pub async fn list_agents_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(AgentsResponse {
        agents: state.gateway.agents(),
    })
}

/// Register (or re-register) an agent.
pub async fn register_agent_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterAgentRequest>,
) -> impl IntoResponse {
    let agent = match request.to_agent() {
        Ok(agent) => agent,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(RegisterAgentResponse::error(format!("Invalid agent: {e}"))),
            );
        }
    };

    match state
        .gateway
        .register_agent(agent, &request.secret, &request.permissions)
    {
        Ok(created) => (StatusCode::OK, Json(RegisterAgentResponse::success(created))),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(RegisterAgentResponse::error(format!("Registration failed: {e}"))),
        ),
    }
}

/// Deactivate an agent. Its credentials stop authenticating immediately.
pub async fn deactivate_agent_handler(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Response {
    let agent = match AgentId::new(&agent_id) {
        Ok(agent) => agent,
        Err(e) => return bad_request(PipelineState::Parsed, e.to_string()),
    };
    if state.gateway.deactivate_agent(&agent) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Unknown agent '{agent}'"))),
        )
            .into_response()
    }
}

// =============================================================================
// PIPELINE HANDLERS
// =============================================================================

/// Submit a delta to the caller's staging graph.
pub async fn delta_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedAgent(agent)): Extension<AuthenticatedAgent>,
    Json(request): Json<DeltaRequest>,
) -> Response {
    let session = match parse_session(&request.session_id) {
        Ok(session) => session,
        Err(e) => return bad_request(PipelineState::Parsed, e.to_string()),
    };

    match blocking(&state, move |gateway| {
        gateway.submit_delta(
            &agent,
            &session,
            &request.target_graph,
            &request.payload,
            request.operation,
        )
    })
    .await
    {
        Ok(result) => validation_response(result),
        Err(response) => response,
    }
}

/// Commit the caller's staging graph into the session's consensus.
pub async fn commit_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedAgent(agent)): Extension<AuthenticatedAgent>,
    Json(request): Json<CommitRequest>,
) -> Response {
    let session = match parse_session(&request.session_id) {
        Ok(session) => session,
        Err(e) => return bad_request(PipelineState::Parsed, e.to_string()),
    };
    let staging_graph = request
        .staging_graph
        .unwrap_or_else(|| GraphName::Staging(agent.clone()).uri(state.gateway.base_uri()));

    match blocking(&state, move |gateway| {
        gateway.commit_session(&agent, &session, &staging_graph)
    })
    .await
    {
        Ok(result) => validation_response(result),
        Err(response) => response,
    }
}

/// Promote the session's consensus into main.
pub async fn promote_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedAgent(agent)): Extension<AuthenticatedAgent>,
    Json(request): Json<PromoteRequest>,
) -> Response {
    let session = match parse_session(&request.session_id) {
        Ok(session) => session,
        Err(e) => return bad_request(PipelineState::Parsed, e.to_string()),
    };

    match blocking(&state, move |gateway| gateway.promote_session(&agent, &session)).await {
        Ok(result) => validation_response(result),
        Err(response) => response,
    }
}

/// Run a `SELECT` query.
pub async fn query_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedAgent(agent)): Extension<AuthenticatedAgent>,
    Json(request): Json<QueryRequest>,
) -> Response {
    match blocking(&state, move |gateway| {
        gateway.query_graph(&agent, &request.query, request.graph_uri.as_deref())
    })
    .await
    {
        Ok(Ok(result)) => (StatusCode::OK, Json(QueryResponse::success(&result))).into_response(),
        Ok(Err(rejection)) => {
            let status = status_for(rejection.category());
            (status, Json(QueryResponse::rejected(rejection))).into_response()
        }
        Err(response) => response,
    }
}
