//! # Authentication Module
//!
//! Two credentials guard the HTTP API.
//!
//! ## Agent credentials
//!
//! Pipeline endpoints (`/delta`, `/commit`, `/promote`, `/query`) identify
//! the caller with two headers, checked against the gateway's credential
//! registry:
//! ```text
//! X-Agent-Id: <agent id>
//! Authorization: Bearer <agent secret>
//! ```
//!
//! ## Admin key
//!
//! `STRATA_ADMIN_KEY` guards agent registration and the operator
//! endpoints (`/agents`, `/status`, `/metrics`, `/provenance`). If it is
//! unset those endpoints are open.

use super::AppState;
use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use strata_core::{AgentId, PipelineState};
use subtle::ConstantTimeEq;

/// Header carrying the calling agent's id.
pub const AGENT_ID_HEADER: &str = "x-agent-id";

/// The authenticated caller, placed in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAgent(pub AgentId);

fn unauthorized(reason: &'static str) -> Response {
    tracing::warn!(event = "auth_failure", reason, "Authentication failed");
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::at_gate(
            "Authentication failed",
            PipelineState::Authenticated,
        )),
    )
        .into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    Some(value.strip_prefix("Bearer ").unwrap_or(value))
}

// =============================================================================
// ADMIN KEY
// =============================================================================

/// Get the admin key from the environment.
///
/// Returns `Some(key)` if `STRATA_ADMIN_KEY` is set and non-empty,
/// `None` otherwise (leaving the operator endpoints open).
pub fn get_admin_key_from_env() -> Option<String> {
    std::env::var("STRATA_ADMIN_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Constant-time key comparison.
///
/// Both keys are padded to the same length so `ct_eq` always runs over
/// the same number of bytes.
pub fn keys_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

/// Admin key middleware for the operator routes.
pub async fn admin_key_middleware(request: Request<Body>, next: Next) -> Response {
    let Some(expected) = get_admin_key_from_env() else {
        return next.run(request).await;
    };

    match bearer(request.headers()) {
        Some(provided) if keys_match(provided, &expected) => next.run(request).await,
        Some(_) => unauthorized("invalid_admin_key"),
        None => unauthorized("missing_authorization_header"),
    }
}

// =============================================================================
// AGENT AUTHENTICATION
// =============================================================================

/// Agent authentication middleware for the pipeline routes.
///
/// On success the caller's id is attached as `AuthenticatedAgent`.
/// Permission checks happen inside the gateway.
pub async fn agent_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(raw_id) = request
        .headers()
        .get(AGENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return unauthorized("missing_agent_id");
    };
    let Ok(agent) = AgentId::new(raw_id) else {
        return unauthorized("malformed_agent_id");
    };
    let Some(secret) = bearer(request.headers()) else {
        return unauthorized("missing_authorization_header");
    };

    if !state.gateway.authenticate(&agent, secret) {
        return unauthorized("invalid_agent_credentials");
    }

    request.extensions_mut().insert(AuthenticatedAgent(agent));
    next.run(request).await
}

// =============================================================================
// TESTS
// =============================================================================
