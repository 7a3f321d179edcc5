//! # Strata CLI Module
//!
//! This module implements the CLI interface for Strata.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Create the database and load the standing graphs
//! - `validate` - Dry-run a delta file through every gate
//! - `query` - Run a `SELECT` query
//! - `status` - Show per-layer triple counts
//! - `export` - Write a binary snapshot of every layer
//! - `import` - Restore layers from a snapshot

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use strata_core::{DeltaOperation, StrataError};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Strata - Validator Gateway
///
/// Agents stage candidate facts; every write is checked by shapes,
/// forward-chaining reasoning and consistency gates before it is promoted.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the TOML configuration (defaults apply when missing)
    #[arg(short = 'c', long, global = true, default_value = "strata.toml")]
    pub config: PathBuf,

    /// Path to the layer database
    #[arg(short = 'D', long, global = true, default_value = "strata.redb")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Create the database and load the standing graphs
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Dry-run a delta file through every gate (nothing is written)
    Validate {
        /// Turtle file holding the delta
        #[arg(short, long)]
        file: PathBuf,

        /// Session the delta is checked against
        #[arg(short, long, default_value = "dry-run")]
        session: String,

        /// Delta operation
        #[arg(short, long, value_enum, default_value = "add")]
        operation: OperationArg,
    },

    /// Run a SELECT query
    Query {
        /// Query text, e.g. "SELECT ?c WHERE { ?c a tourism:City }"
        query: String,

        /// Scope to one named graph URI
        #[arg(short, long)]
        graph: Option<String>,
    },

    /// Show per-layer triple counts
    Status,

    /// Export every layer as a binary snapshot
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import layers from a binary snapshot
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

/// `--operation` values.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationArg {
    Add,
    Remove,
}

impl From<OperationArg> for DeltaOperation {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Add => Self::Add,
            OperationArg::Remove => Self::Remove,
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), StrataError> {
    let store = StoreArgs {
        config: cli.config,
        database: cli.database,
        backend: cli.backend,
    };
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&store, &host, port).await,
        Some(Commands::Init { force }) => cmd_init(&store, force),
        Some(Commands::Validate {
            file,
            session,
            operation,
        }) => cmd_validate(&store, json_mode, &file, &session, operation.into()),
        Some(Commands::Query { query, graph }) => {
            cmd_query(&store, json_mode, &query, graph.as_deref())
        }
        Some(Commands::Status) => cmd_status(&store, json_mode),
        Some(Commands::Export { output }) => cmd_export(&store, &output),
        Some(Commands::Import { input }) => cmd_import(&store, &input),
        None => {
            // No subcommand - show status by default
            cmd_status(&store, json_mode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate_command() {
        let cli = Cli::try_parse_from([
            "strata", "--backend", "memory", "validate", "-f", "delta.ttl", "-o", "remove",
        ])
        .expect("parse");
        assert_eq!(cli.backend, "memory");
        let Some(Commands::Validate {
            file,
            session,
            operation,
        }) = cli.command
        else {
            unreachable!("expected the validate command");
        };
        assert_eq!(file, PathBuf::from("delta.ttl"));
        assert_eq!(session, "dry-run");
        assert_eq!(DeltaOperation::from(operation), DeltaOperation::Remove);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["strata", "status"]).expect("parse");
        assert_eq!(cli.config, PathBuf::from("strata.toml"));
        assert_eq!(cli.database, PathBuf::from("strata.redb"));
        assert!(!cli.json_mode);
    }

    #[test]
    fn test_query_text_is_positional() {
        let cli = Cli::try_parse_from(["strata", "-q", "query", "SELECT * WHERE { ?s ?p ?o }"])
            .expect("parse");
        assert!(cli.quiet);
        assert!(matches!(cli.command, Some(Commands::Query { graph: None, .. })));
    }
}
