//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use std::path::{Path, PathBuf};
use strata_core::{
    AgentId, DeltaOperation, Gateway, GraphName, MemoryStore, Permission, SessionId, ShapeSet,
    StandingGraphs, StorageBackend, StrataConfig, StrataError, ValidationResult,
    formats::{SnapshotHeader, snapshot::MAX_SNAPSHOT_SIZE},
    formats::turtle::render_term,
    primitives::MAX_PAYLOAD_BYTES,
    snapshot_from_bytes, snapshot_to_bytes,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum delta file size: the gateway's payload limit.
const MAX_DELTA_FILE_SIZE: u64 = MAX_PAYLOAD_BYTES as u64;

/// Maximum snapshot file size for import.
const MAX_IMPORT_FILE_SIZE: u64 = MAX_SNAPSHOT_SIZE as u64;

/// In-process agent used by the local commands. Never registered on a
/// served gateway.
const LOCAL_AGENT: &str = "strata-cli";
const LOCAL_SECRET: &str = "local";

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), StrataError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| StrataError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(StrataError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path (resolving symlinks and "..") and ensures it
/// names an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, StrataError> {
    let canonical = path.canonicalize().map_err(|e| {
        StrataError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(StrataError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate an output path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, StrataError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        StrataError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(StrataError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| StrataError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), StrataError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| StrataError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// STORE ARGUMENTS
// =============================================================================

/// Where the gateway's configuration and layers come from.
#[derive(Debug, Clone)]
pub struct StoreArgs {
    pub config: PathBuf,
    pub database: PathBuf,
    pub backend: String,
}

impl StoreArgs {
    /// Open the configured backend.
    pub fn open_backend(&self) -> Result<StorageBackend, StrataError> {
        match self.backend.as_str() {
            "redb" => StorageBackend::redb(&self.database),
            "memory" => Ok(StorageBackend::default()),
            other => Err(StrataError::Config(format!(
                "Unknown backend: {}. Use: redb, memory",
                other
            ))),
        }
    }

    /// Build a gateway over the configured backend.
    pub fn open_gateway(&self) -> Result<Gateway<StorageBackend>, StrataError> {
        let config = StrataConfig::load(&self.config)?;
        Gateway::new(config, self.open_backend()?, Box::new(ShapeSet::standard()))
    }
}

/// Load the standing graphs into `gateway` (no-op for graphs already loaded).
pub fn bootstrap_standing<S: strata_core::LayerStore>(
    gateway: &Gateway<S>,
) -> Result<usize, StrataError> {
    let standing = StandingGraphs::standard(gateway.base_uri(), gateway.rules())?;
    gateway.bootstrap(&standing)
}

/// Register the in-process agent with every permission.
fn local_agent<S: strata_core::LayerStore>(gateway: &Gateway<S>) -> Result<AgentId, StrataError> {
    let agent = AgentId::new(LOCAL_AGENT)?;
    gateway.register_agent(
        agent.clone(),
        LOCAL_SECRET,
        &[
            Permission::Read,
            Permission::WriteStaging,
            Permission::WriteConsensus,
        ],
    )?;
    Ok(agent)
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(store: &StoreArgs, host: &str, port: u16) -> Result<(), StrataError> {
    let gateway = store.open_gateway()?;
    let loaded = bootstrap_standing(&gateway)?;

    println!("Strata Validator Gateway Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", store.backend);
    println!("  Database: {:?}", store.database);
    println!("  Base URI: {}", gateway.base_uri());
    println!("  Rules:    {} (version {})", gateway.rules().len(), gateway.rules().version);
    if loaded > 0 {
        println!("  Loaded {} standing triples", loaded);
    }
    println!();
    println!("Endpoints:");
    println!("  POST /agents     - Register an agent (admin)");
    println!("  POST /delta      - Submit a delta to staging");
    println!("  POST /commit     - Commit staging into consensus");
    println!("  POST /promote    - Promote consensus into main");
    println!("  POST /query      - Run a SELECT query");
    println!("  GET  /status     - Layer triple counts");
    println!("  GET  /metrics    - Gateway metrics");
    println!("  GET  /provenance - Provenance of derived facts");
    println!("  GET  /health     - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, gateway).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the database and load the standing graphs.
pub fn cmd_init(store: &StoreArgs, force: bool) -> Result<(), StrataError> {
    if store.backend == "redb" && store.database.exists() {
        if !force {
            return Err(StrataError::Io(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&store.database)
            .map_err(|e| StrataError::Io(format!("Remove database: {}", e)))?;
    }

    let gateway = store.open_gateway()?;
    let loaded = bootstrap_standing(&gateway)?;
    println!(
        "Initialized {} database at {:?} ({} standing triples)",
        store.backend, store.database, loaded
    );
    Ok(())
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Run a delta file through every gate against a copy of the stored
/// layers. The database is never written.
pub fn cmd_validate(
    store: &StoreArgs,
    json_mode: bool,
    file: &Path,
    session: &str,
    operation: DeltaOperation,
) -> Result<(), StrataError> {
    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_DELTA_FILE_SIZE)?;
    let payload = std::fs::read_to_string(&validated_path)
        .map_err(|e| StrataError::Io(format!("Read file: {}", e)))?;
    let session = SessionId::new(session)?;

    let snapshot = store.open_gateway()?.export_snapshot()?;
    let config = StrataConfig::load(&store.config)?;
    let scratch = Gateway::new(config, MemoryStore::new(), Box::new(ShapeSet::standard()))?;
    scratch.import_snapshot(&snapshot)?;
    bootstrap_standing(&scratch)?;

    let agent = local_agent(&scratch)?;
    let target = GraphName::Staging(agent.clone()).uri(scratch.base_uri());
    let result = scratch.submit_delta(&agent, &session, &target, &payload, operation);

    if json_mode {
        return print_json(&result);
    }
    print_validation(&result);
    Ok(())
}

fn print_validation(result: &ValidationResult) {
    println!("Result:     {}", result.message);
    if let Some(gate) = result.failed_gate {
        println!("Failed at:  {}", gate);
    }
    println!(
        "Reasoning:  {} iteration(s), fixpoint {}",
        result.iterations,
        if result.reached_fixpoint { "reached" } else { "not reached" }
    );
    for inference in &result.derived {
        println!("  + {}   [{}]", inference.triple, inference.rule_id);
    }
    for error in &result.errors {
        println!("  ! {:?}: {}", error.category(), error.message());
    }
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Run a `SELECT` query over the stored layers.
pub fn cmd_query(
    store: &StoreArgs,
    json_mode: bool,
    query: &str,
    graph: Option<&str>,
) -> Result<(), StrataError> {
    let gateway = store.open_gateway()?;
    let agent = local_agent(&gateway)?;
    let result = gateway.query_graph(&agent, query, graph).map_err(|rejection| {
        let detail = rejection
            .errors
            .first()
            .map(|e| e.message().to_string())
            .unwrap_or_default();
        StrataError::InvalidQuery(format!("{}: {}", rejection.message(), detail))
    })?;

    if json_mode {
        return print_json(&api::QueryResponse::success(&result));
    }

    println!("{}", result.variables.join("\t"));
    for row in &result.rows {
        let cells: Vec<String> = result
            .variables
            .iter()
            .map(|var| row.get(var).map(render_term).unwrap_or_default())
            .collect();
        println!("{}", cells.join("\t"));
    }
    println!("({} row(s))", result.rows.len());
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show per-layer triple counts.
pub fn cmd_status(store: &StoreArgs, json_mode: bool) -> Result<(), StrataError> {
    let gateway = store.open_gateway()?;
    let status = api::StatusResponse::from(gateway.status()?);

    if json_mode {
        let output = serde_json::json!({
            "database": store.database.to_string_lossy(),
            "backend": store.backend,
            "layers": status.layers,
            "total_triples": status.total_triples,
            "rule_version": status.rule_version,
            "rules": status.rules,
        });
        return print_json(&output);
    }

    println!("Strata Layer Status");
    println!("===================");
    println!("Database: {:?}", store.database);
    println!("Backend:  {}", store.backend);
    println!("Rules:    {} (version {})", status.rules, status.rule_version);
    println!();
    if status.layers.is_empty() {
        println!("No layers stored. Run `strata init` to load the standing graphs.");
    }
    for (layer, count) in &status.layers {
        println!("{:<32} {:>8}", layer, count);
    }
    println!("{:<32} {:>8}", "total", status.total_triples);

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write every layer to a binary snapshot.
pub fn cmd_export(store: &StoreArgs, output: &Path) -> Result<(), StrataError> {
    let validated_output = validate_output_path(output)?;

    let snapshot = store.open_gateway()?.export_snapshot()?;
    let data = snapshot_to_bytes(&snapshot)?;
    let header = SnapshotHeader::from_bytes(&data)?;

    std::fs::write(&validated_output, &data)
        .map_err(|e| StrataError::Io(format!("Write file: {}", e)))?;

    println!("Checksum: {}", header.checksum_hex());
    println!(
        "Exported {} layers ({} triples, {} bytes) to {:?}",
        snapshot.layers.len(),
        snapshot.triple_count(),
        data.len(),
        validated_output
    );

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Restore layers from a binary snapshot.
pub fn cmd_import(store: &StoreArgs, input: &Path) -> Result<(), StrataError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| StrataError::Io(format!("Read file: {}", e)))?;
    let snapshot = snapshot_from_bytes(&data)?;

    if store.backend == "memory" {
        return Err(StrataError::Config(
            "Import into the memory backend is lost on exit. Use redb.".to_string(),
        ));
    }

    let gateway = store.open_gateway()?;
    let triples = gateway.import_snapshot(&snapshot)?;

    println!(
        "Imported {} layers ({} triples)",
        snapshot.layers.len(),
        triples
    );

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn redb_args(dir: &Path) -> StoreArgs {
        StoreArgs {
            config: dir.join("missing.toml"),
            database: dir.join("strata.redb"),
            backend: "redb".to_string(),
        }
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let args = StoreArgs {
            backend: "file".to_string(),
            ..redb_args(Path::new("."))
        };
        assert!(matches!(args.open_backend(), Err(StrataError::Config(_))));
    }

    #[test]
    fn test_init_refuses_existing_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = redb_args(dir.path());
        cmd_init(&args, false).expect("init");
        assert!(cmd_init(&args, false).is_err());
        cmd_init(&args, true).expect("forced init");

        let status = args.open_gateway().expect("gateway").status().expect("status");
        assert!(status.layers.contains_key("ontology"));
        assert!(status.layers.contains_key("shapes"));
        assert!(status.layers.contains_key("rules"));
    }

    #[test]
    fn test_validate_does_not_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = redb_args(dir.path());
        cmd_init(&args, false).expect("init");

        let delta = dir.path().join("delta.ttl");
        std::fs::write(
            &delta,
            "tourism:Dubai a tourism:City ; tourism:isCoastal true .\n",
        )
        .expect("write delta");
        cmd_validate(&args, true, &delta, "s1", DeltaOperation::Add).expect("validate");

        let status = args.open_gateway().expect("gateway").status().expect("status");
        assert!(status.layers.keys().all(|k| !k.starts_with("staging")));
    }

    #[test]
    fn test_export_import_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = redb_args(dir.path());
        cmd_init(&args, false).expect("init");
        let before = args.open_gateway().expect("gateway").status().expect("status");

        let dump = dir.path().join("layers.strata");
        cmd_export(&args, &dump).expect("export");

        let other = StoreArgs {
            database: dir.path().join("restored.redb"),
            ..args.clone()
        };
        cmd_import(&other, &dump).expect("import");
        let after = other.open_gateway().expect("gateway").status().expect("status");
        assert_eq!(before.layers, after.layers);
    }

    #[test]
    fn test_output_path_requires_existing_parent() {
        assert!(validate_output_path(Path::new("/definitely/missing/dir/out.bin")).is_err());
        assert!(validate_output_path(Path::new("out.bin")).is_ok());
    }
}
