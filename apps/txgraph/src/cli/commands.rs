//! # CLI Command Implementations
//!
//! Every command opens the configured backend, runs, and for the `file`
//! backend writes the snapshot back if it changed anything.

use crate::api::{self, AppState};
use crate::config::{AppConfig, Backend};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use txgraph_core::{
    Direction, Engine, Graph, GraphError, NodeView, Query, QueryOutcome, QueryType,
    SerializableGraph, TransactionPatch, UpsertOutcome, UserPatch, graph_from_bytes, graph_to_bytes,
    formats::MAX_PERSISTENCE_PAYLOAD_SIZE, primitives::MAGIC_BYTES,
};

use super::seed::{self, Dataset};

/// Synthetic counts when only one of `--users` / `--transactions` is given.
const DEFAULT_SYNTHETIC_USERS: usize = 50;
const DEFAULT_SYNTHETIC_TRANSACTIONS: usize = 100;

// =============================================================================
// FILE HELPERS
// =============================================================================

fn io_error(context: &str, path: &Path, e: std::io::Error) -> GraphError {
    GraphError::StorageUnavailable(format!("{} '{}': {}", context, path.display(), e))
}

/// Canonical path of an existing regular file no larger than the snapshot limit.
fn validate_input_file(path: &Path) -> Result<PathBuf, GraphError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| io_error("invalid file path", path, e))?;
    let metadata = std::fs::metadata(&canonical).map_err(|e| io_error("cannot stat", path, e))?;
    if !metadata.is_file() {
        return Err(GraphError::Validation(format!(
            "'{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_PERSISTENCE_PAYLOAD_SIZE as u64 {
        return Err(GraphError::Validation(format!(
            "file size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }
    Ok(canonical)
}

/// Output path under an existing, canonicalized parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, GraphError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let canonical_parent = parent
        .canonicalize()
        .map_err(|e| io_error("invalid output directory", parent, e))?;
    let filename = path
        .file_name()
        .ok_or_else(|| GraphError::Validation("output path has no filename".to_string()))?;
    Ok(canonical_parent.join(filename))
}

/// Binary snapshot first, then the JSON export form.
fn read_graph(path: &Path) -> Result<Graph, GraphError> {
    let validated = validate_input_file(path)?;
    let data = std::fs::read(&validated).map_err(|e| io_error("cannot read", path, e))?;
    if data.starts_with(MAGIC_BYTES) {
        return graph_from_bytes(&data);
    }
    let serializable = serde_json::from_slice::<SerializableGraph>(&data).map_err(|_| {
        GraphError::Serialization(format!(
            "'{}' is neither a txgraph snapshot nor a JSON export",
            path.display()
        ))
    })?;
    Graph::try_from(serializable)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), GraphError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// BACKENDS
// =============================================================================

/// Open the engine for the configured backend.
pub fn open_engine(config: &AppConfig) -> Result<Engine, GraphError> {
    let engine_config = config.engine_config();
    let path = &config.storage.path;
    match config.storage.backend {
        Backend::Memory => Ok(Engine::with_config(engine_config)),
        Backend::File if path.exists() => {
            Ok(Engine::from_graph(read_graph(path)?, engine_config))
        }
        Backend::File => Ok(Engine::with_config(engine_config)),
        Backend::Redb => Engine::open(path, engine_config),
    }
}

/// Write the snapshot back for the `file` backend. Other backends are
/// either already persisted or not persisted at all.
pub fn save_engine(engine: &Engine, config: &AppConfig) -> Result<(), GraphError> {
    if config.storage.backend != Backend::File {
        return Ok(());
    }
    let data = graph_to_bytes(&engine.export_graph())?;
    let path = &config.storage.path;
    std::fs::write(path, &data).map_err(|e| io_error("cannot write", path, e))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "Saved snapshot");
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server and serve until Ctrl+C.
pub async fn cmd_server(config: &AppConfig) -> Result<(), GraphError> {
    let engine = Arc::new(open_engine(config)?);
    let addr = config.server.addr();

    println!("txgraph server starting...");
    println!();
    println!("Configuration:");
    println!("  Address:   {}", addr);
    println!("  Backend:   {}", config.storage.backend);
    println!("  Database:  {}", config.storage.path.display());
    println!("  Inference: {:?}", config.engine.inference);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::shared(Arc::clone(&engine), config);
    api::run_server(&addr, state, shutdown_signal()).await?;
    save_engine(&engine, config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

pub fn cmd_status(config: &AppConfig, json_mode: bool) -> Result<(), GraphError> {
    let engine = open_engine(config)?;
    let stats = engine.stats();

    if json_mode {
        return print_json(&serde_json::json!({
            "database": config.storage.path.to_string_lossy(),
            "backend": config.storage.backend,
            "stats": stats,
        }));
    }

    println!("txgraph Status");
    println!("==============");
    println!("Database: {}", config.storage.path.display());
    println!("Backend:  {}", config.storage.backend);
    println!();
    println!("Users:            {}", stats.users);
    println!("Transactions:     {}", stats.transactions);
    println!("Edges:            {}", stats.edges);
    println!("  SENT:             {}", stats.sent);
    println!("  RECEIVED_BY:      {}", stats.received_by);
    println!("  SHARED_ATTRIBUTE: {}", stats.shared_attribute);
    println!("  LINKED:           {}", stats.linked);
    Ok(())
}

// =============================================================================
// WRITE COMMANDS
// =============================================================================

/// Load the sample dataset, or a synthetic one when a count is given.
pub fn cmd_seed(
    config: &AppConfig,
    json_mode: bool,
    users: Option<usize>,
    transactions: Option<usize>,
) -> Result<(), GraphError> {
    let dataset = match (users, transactions) {
        (None, None) => Dataset::sample(),
        (users, transactions) => Dataset::synthetic(
            users.unwrap_or(DEFAULT_SYNTHETIC_USERS),
            transactions.unwrap_or(DEFAULT_SYNTHETIC_TRANSACTIONS),
        )?,
    };

    let engine = open_engine(config)?;
    let report = seed::seed(&engine, dataset)?;
    save_engine(&engine, config)?;

    if json_mode {
        return print_json(&report);
    }
    println!(
        "Seeded {} users and {} transactions ({} new, {} inferred edges)",
        report.users, report.transactions, report.created, report.inferred_edges
    );
    if report.cancelled > 0 {
        println!(
            "{} inference passes were cancelled; re-run seed to complete them",
            report.cancelled
        );
    }
    Ok(())
}

fn report_upsert(outcome: &UpsertOutcome, json_mode: bool) -> Result<(), GraphError> {
    let response = api::UpsertResponse::from_outcome(outcome);
    if json_mode {
        return print_json(&response);
    }
    println!("{}", response.message);
    for edge in &response.inferred {
        println!("  + {}", edge.id);
    }
    Ok(())
}

pub fn cmd_user(config: &AppConfig, json_mode: bool, patch: UserPatch) -> Result<(), GraphError> {
    let engine = open_engine(config)?;
    let outcome = engine.upsert_user(patch)?;
    save_engine(&engine, config)?;
    report_upsert(&outcome, json_mode)
}

pub fn cmd_transaction(
    config: &AppConfig,
    json_mode: bool,
    patch: TransactionPatch,
) -> Result<(), GraphError> {
    let engine = open_engine(config)?;
    let outcome = engine.upsert_transaction(patch)?;
    save_engine(&engine, config)?;
    report_upsert(&outcome, json_mode)
}

// =============================================================================
// READ COMMANDS
// =============================================================================

pub fn cmd_show(config: &AppConfig, json_mode: bool, id: &str) -> Result<(), GraphError> {
    let engine = open_engine(config)?;
    let view = NodeView::from(&engine.get(id)?);

    if json_mode {
        return print_json(&view);
    }
    println!("{} {} ({})", view.kind, view.id, view.label);
    for (name, value) in &view.attributes {
        println!("  {} = {}", name, value);
    }
    Ok(())
}

pub fn cmd_path(
    config: &AppConfig,
    json_mode: bool,
    from: &str,
    to: &str,
    timeout_ms: Option<u64>,
) -> Result<(), GraphError> {
    let engine = open_engine(config)?;
    let query_type = QueryType::ShortestPath {
        from: from.to_string(),
        to: to.to_string(),
    };
    let query = match timeout_ms.or(config.engine.query_timeout_ms) {
        Some(ms) => Query::with_timeout(query_type, ms),
        None => Query::new(query_type),
    };

    match engine.execute(&query) {
        Ok(QueryOutcome::Path(path)) => {
            let ids: Vec<&str> = path.iter().map(|key| key.id()).collect();
            if json_mode {
                return print_json(&serde_json::json!({ "found": true, "path": ids }));
            }
            println!("Shortest path {} -> {} ({} hops):", from, to, ids.len().saturating_sub(1));
            println!("  {}", ids.join(" -> "));
            Ok(())
        }
        Ok(_) => Err(GraphError::Serialization("unexpected query outcome".to_string())),
        Err(GraphError::NoPathFound { .. }) => {
            if json_mode {
                return print_json(&serde_json::json!({ "found": false, "path": [] }));
            }
            println!("No path found from {} to {}", from, to);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub fn cmd_neighbors(config: &AppConfig, json_mode: bool, id: &str) -> Result<(), GraphError> {
    let engine = open_engine(config)?;
    let around = engine.neighborhood(id)?;

    if json_mode {
        return print_json(&around);
    }
    println!("{} {} ({})", around.node.kind, around.node.id, around.node.label);
    if around.relations.is_empty() {
        println!("  no relationships");
    }
    for relation in &around.relations {
        let arrow = match relation.direction {
            Direction::Outgoing => "->",
            Direction::Incoming => "<-",
        };
        println!(
            "  {} {} {} {}",
            arrow, relation.relation, relation.connected.kind, relation.connected.id
        );
    }
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

pub fn cmd_export(config: &AppConfig, output: &Path, format: &str) -> Result<(), GraphError> {
    let validated_output = validate_output_path(output)?;
    let engine = open_engine(config)?;
    let graph = engine.export_graph();

    let data = match format {
        "binary" => graph_to_bytes(&graph)?,
        "json" => serde_json::to_vec_pretty(&SerializableGraph::from(&graph))
            .map_err(|e| GraphError::Serialization(e.to_string()))?,
        _ => {
            return Err(GraphError::Validation(format!(
                "unknown format: {}. Use: binary, json",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| io_error("cannot write", &validated_output, e))?;
    println!(
        "Exported {} nodes, {} edges ({} bytes) to {}",
        graph.node_count(),
        graph.edge_count(),
        data.len(),
        validated_output.display()
    );
    Ok(())
}

/// Replace the configured store with the contents of `input`.
pub fn cmd_import(config: &AppConfig, input: &Path) -> Result<(), GraphError> {
    let graph = read_graph(input)?;
    let (nodes, edges) = (graph.node_count(), graph.edge_count());

    let engine = open_engine(config)?;
    engine.import_graph(graph)?;
    save_engine(&engine, config)?;

    println!("Imported graph: {} nodes, {} edges", nodes, edges);
    Ok(())
}

// =============================================================================
// MAINTENANCE
// =============================================================================

pub fn cmd_reset(config: &AppConfig) -> Result<(), GraphError> {
    let engine = open_engine(config)?;
    engine.reset()?;
    save_engine(&engine, config)?;
    println!("Store reset");
    Ok(())
}

/// Create an empty database at the configured path.
pub fn cmd_init(config: &AppConfig, force: bool) -> Result<(), GraphError> {
    let path = &config.storage.path;
    if config.storage.backend == Backend::Memory {
        println!("Memory backend keeps nothing on disk; nothing to initialize");
        return Ok(());
    }
    if path.exists() {
        if !force {
            return Err(GraphError::Validation(
                "database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path).map_err(|e| io_error("cannot remove", path, e))?;
    }

    let engine = open_engine(config)?;
    save_engine(&engine, config)?;
    println!(
        "Initialized new {} database at {}",
        config.storage.backend,
        path.display()
    );
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
