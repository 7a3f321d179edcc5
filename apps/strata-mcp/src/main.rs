//! # Strata MCP Server
//!
//! Entry point for the MCP (Model Context Protocol) bridge to Strata.
//!
//! Reads configuration from environment variables:
//! - `STRATA_URL`: Strata server URL (default: `http://localhost:8080`)
//! - `STRATA_AGENT_ID`: agent the bridge submits as (required)
//! - `STRATA_AGENT_SECRET`: that agent's secret (required)
//! - `STRATA_SESSION_ID`: session used when a tool names none (default: `mcp`)
//! - `STRATA_BASE_URI`: base URI of the server's graphs (default: `http://example.org`)
//! - `STRATA_ADMIN_KEY`: optional Bearer token for the status and provenance tools
//!
//! Communicates with AI clients via MCP over stdio and forwards requests to
//! the Strata HTTP API.

mod client;
mod server;

use client::{AgentCredentials, StrataClient};
use rmcp::{ServiceExt, transport::stdio};
use server::{BridgeSettings, StrataMcp};

fn required_env(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(format!("{name} must be set").into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout is reserved for the MCP stdio transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let url = std::env::var("STRATA_URL").unwrap_or_else(|_| "http://localhost:8080".into());
    let agent = AgentCredentials {
        agent_id: required_env("STRATA_AGENT_ID")?,
        secret: required_env("STRATA_AGENT_SECRET")?,
    };
    let admin_key = std::env::var("STRATA_ADMIN_KEY").ok();
    let settings = BridgeSettings {
        base_uri: std::env::var("STRATA_BASE_URI")
            .unwrap_or_else(|_| "http://example.org".into()),
        default_session: std::env::var("STRATA_SESSION_ID").unwrap_or_else(|_| "mcp".into()),
    };

    tracing::info!(
        "Strata MCP server starting, target: {}, agent: {}",
        url,
        agent.agent_id
    );

    let client = StrataClient::new(url, agent, admin_key);
    let mcp = StrataMcp::new(client, settings);

    let service = mcp.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("MCP serve error: {:?}", e);
    })?;

    service.waiting().await?;
    Ok(())
}
