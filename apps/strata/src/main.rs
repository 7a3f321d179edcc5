//! # Strata - Validator Gateway Server
//!
//! The main binary for the Strata multi-agent knowledge graph pipeline.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for bootstrapping, validation and snapshots
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  apps/strata (THE BINARY)                │
//! │                                                          │
//! │      ┌─────────────┐            ┌─────────────┐          │
//! │      │    CLI      │            │   HTTP API  │          │
//! │      │   (clap)    │            │   (axum)    │          │
//! │      └──────┬──────┘            └──────┬──────┘          │
//! │             └─────────────┬────────────┘                 │
//! │                           ▼                              │
//! │                   ┌───────────────┐                      │
//! │                   │  strata-core  │                      │
//! │                   │  (THE LOGIC)  │                      │
//! │                   └───────────────┘                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Load the standing graphs, then serve
//! strata init
//! strata server --host 0.0.0.0 --port 8080
//!
//! # Dry-run a delta file through every gate
//! strata validate -f delta.ttl
//! strata query -q "SELECT ?c WHERE { ?c a tourism:CoastalCity }"
//! ```

use clap::Parser;
use strata::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // STRATA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("STRATA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_env("STRATA_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "strata=info,strata_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Strata startup banner.
fn print_banner() {
    println!(
        r#"
  ███████╗████████╗██████╗  █████╗ ████████╗ █████╗
  ██╔════╝╚══██╔══╝██╔══██╗██╔══██╗╚══██╔══╝██╔══██╗
  ███████╗   ██║   ██████╔╝███████║   ██║   ███████║
  ╚════██║   ██║   ██╔══██╗██╔══██║   ██║   ██╔══██║
  ███████║   ██║   ██║  ██║██║  ██║   ██║   ██║  ██║
  ╚══════╝   ╚═╝   ╚═╝  ╚═╝╚═╝  ╚═╝   ╚═╝   ╚═╝  ╚═╝

  Validator Gateway v{}

  Staged • Reasoned • Consistent
"#,
        env!("CARGO_PKG_VERSION")
    );
}
