//! # Strata HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /agents` - Register an agent (admin)
//! - `GET /agents` - List agents (admin)
//! - `DELETE /agents/{agent_id}` - Deactivate an agent (admin)
//! - `POST /delta` - Submit a delta to the caller's staging graph
//! - `POST /commit` - Commit staging into the session's consensus
//! - `POST /promote` - Promote the session's consensus into main
//! - `POST /query` - Run a `SELECT` query
//! - `GET /status` - Per-layer triple counts (admin)
//! - `GET /metrics` - Gateway metrics (admin)
//! - `GET /provenance[?agent_id=]` - Provenance of derived facts (admin)
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `STRATA_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `STRATA_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `STRATA_ADMIN_KEY`: If set, requires Bearer token authentication on admin routes

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{AGENT_ID_HEADER, AuthenticatedAgent, get_admin_key_from_env, keys_match};
pub use handlers::status_for;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    AgentsResponse, CommitRequest, DeltaRequest, ErrorResponse, HealthResponse, PromoteRequest,
    ProvenanceParams, QueryRequest, QueryResponse, RegisterAgentRequest, RegisterAgentResponse,
    StatusResponse,
};

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use strata_core::{Gateway, StorageBackend, StrataError};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body. Room for the largest delta payload
/// plus its JSON envelope.
const MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the gateway.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway<StorageBackend>>,
}

impl AppState {
    /// Create new app state around a gateway.
    #[must_use]
    pub fn new(gateway: Gateway<StorageBackend>) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `STRATA_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode - use with caution!)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("STRATA_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            // Explicit wildcard - warn about security implications
            tracing::warn!(
                "CORS: Allowing ALL origins (STRATA_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            // Parse comma-separated origins
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in STRATA_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                    .allow_headers(allowed_headers())
            }
        }
        None => {
            // No configuration - default to localhost only (restrictive)
            tracing::info!("CORS: No STRATA_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn allowed_headers() -> [HeaderName; 3] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(AGENT_ID_HEADER),
    ]
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let localhost_origins = vec![
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(allowed_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - rejects payloads above `MAX_BODY_BYTES`
/// 4. Rate Limiting - protects against DoS (if enabled)
/// 5. Authentication - admin key or agent credentials, per route group
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    if get_admin_key_from_env().is_some() {
        tracing::info!("Admin key authentication enabled");
    } else {
        tracing::warn!(
            "Admin key authentication DISABLED - agent registration is publicly accessible! \
             Set STRATA_ADMIN_KEY environment variable to enable authentication."
        );
    }

    let admin = Router::new()
        .route(
            "/agents",
            get(handlers::list_agents_handler).post(handlers::register_agent_handler),
        )
        .route(
            "/agents/{agent_id}",
            delete(handlers::deactivate_agent_handler),
        )
        .route("/status", get(handlers::status_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/provenance", get(handlers::provenance_handler))
        .route_layer(axum_middleware::from_fn(auth::admin_key_middleware));

    let pipeline = Router::new()
        .route("/delta", post(handlers::delta_handler))
        .route("/commit", post(handlers::commit_handler))
        .route("/promote", post(handlers::promote_handler))
        .route("/query", post(handlers::query_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::agent_auth_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(admin)
        .merge(pipeline);

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server. Stops on Ctrl-C and logs the final metrics.
pub async fn run_server(addr: &str, gateway: Gateway<StorageBackend>) -> Result<(), StrataError> {
    let state = AppState::new(gateway);
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| StrataError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Strata HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
        .map_err(|e| StrataError::Io(format!("Server error: {}", e)))?;

    match Arc::try_unwrap(state.gateway) {
        Ok(gateway) => {
            gateway.shutdown();
        }
        Err(_) => tracing::warn!("gateway still shared at shutdown, final metrics not logged"),
    }
    Ok(())
}
