//! # redb-backed Mirror
//!
//! A disk copy of the store in a redb embedded database.
//!
//! Tables:
//! - `users`: user_id → postcard `NodeRecord`
//! - `transactions`: txn_id → postcard `NodeRecord`
//! - `edges`: (source id, target id, kind code) → edge seq
//! - `metadata`: `epoch`
//!
//! Every `persist` is one ACID write transaction. Node records are only
//! overwritten by a higher revision, and write sets from an older epoch
//! are dropped, so concurrent writers may commit in any order.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

use super::{GraphMirror, WriteSet};
use crate::graph::SerializableGraph;
use crate::types::{Edge, EdgeKind, EdgeRecord, GraphError, NodeKey, NodeKind, NodeRecord};

/// Table for users: user_id -> serialized NodeRecord
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Table for transactions: txn_id -> serialized NodeRecord
const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");

/// Table for edges: (source, target, kind code) -> edge seq
const EDGES: TableDefinition<(&str, &str, u8), u64> = TableDefinition::new("edges");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const EPOCH_KEY: &str = "epoch";

fn storage_err(e: impl std::fmt::Display) -> GraphError {
    GraphError::StorageUnavailable(e.to_string())
}

fn node_table(kind: NodeKind) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match kind {
        NodeKind::User => USERS,
        NodeKind::Transaction => TRANSACTIONS,
    }
}

/// A disk-backed mirror of the graph using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize tables if they don't exist
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            let _ = write_txn.open_table(USERS).map_err(storage_err)?;
            let _ = write_txn.open_table(TRANSACTIONS).map_err(storage_err)?;
            let _ = write_txn.open_table(EDGES).map_err(storage_err)?;
            let _ = write_txn.open_table(METADATA).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        Ok(Self { db })
    }

    /// Epoch currently stored on disk.
    pub fn epoch(&self) -> Result<u64, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(METADATA).map_err(storage_err)?;
        Ok(table
            .get(EPOCH_KEY)
            .map_err(storage_err)?
            .map(|v| v.value())
            .unwrap_or(0))
    }

    /// Delete and recreate the data tables, then record `epoch`.
    fn reset_tables(write_txn: &redb::WriteTransaction, epoch: u64) -> Result<(), GraphError> {
        write_txn.delete_table(USERS).map_err(storage_err)?;
        write_txn.delete_table(TRANSACTIONS).map_err(storage_err)?;
        write_txn.delete_table(EDGES).map_err(storage_err)?;
        let _ = write_txn.open_table(USERS).map_err(storage_err)?;
        let _ = write_txn.open_table(TRANSACTIONS).map_err(storage_err)?;
        let _ = write_txn.open_table(EDGES).map_err(storage_err)?;
        let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
        meta.insert(EPOCH_KEY, epoch).map_err(storage_err)?;
        Ok(())
    }

    fn stored_epoch(write_txn: &redb::WriteTransaction) -> Result<u64, GraphError> {
        let meta = write_txn.open_table(METADATA).map_err(storage_err)?;
        let epoch = meta
            .get(EPOCH_KEY)
            .map_err(storage_err)?
            .map(|v| v.value())
            .unwrap_or(0);
        Ok(epoch)
    }

    fn write_node(
        write_txn: &redb::WriteTransaction,
        record: &NodeRecord,
        only_if_newer: bool,
    ) -> Result<(), GraphError> {
        let mut table = write_txn
            .open_table(node_table(record.node.kind()))
            .map_err(storage_err)?;
        let id = record.node.id();
        if only_if_newer {
            let stored_revision = match table.get(id).map_err(storage_err)? {
                Some(existing) => Some(decode_record(existing.value())?.revision),
                None => None,
            };
            if stored_revision.is_some_and(|r| r >= record.revision) {
                return Ok(());
            }
        }
        let bytes =
            postcard::to_allocvec(record).map_err(|e| GraphError::Serialization(e.to_string()))?;
        table.insert(id, bytes.as_slice()).map_err(storage_err)?;
        Ok(())
    }

    fn write_edges(
        write_txn: &redb::WriteTransaction,
        edges: &[EdgeRecord],
    ) -> Result<(), GraphError> {
        let mut table = write_txn.open_table(EDGES).map_err(storage_err)?;
        for record in edges {
            let edge = &record.edge;
            table
                .insert(
                    (edge.source.id(), edge.target.id(), edge.kind.code()),
                    record.seq,
                )
                .map_err(storage_err)?;
        }
        Ok(())
    }
}

fn decode_record(bytes: &[u8]) -> Result<NodeRecord, GraphError> {
    postcard::from_bytes(bytes).map_err(|e| GraphError::Serialization(e.to_string()))
}

// =============================================================================
// MIRROR IMPLEMENTATION
// =============================================================================

impl GraphMirror for RedbStore {
    fn persist(&self, writes: &WriteSet) -> Result<(), GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;

        let stored = Self::stored_epoch(&write_txn)?;
        if writes.epoch < stored {
            // Write from before a reset: drop it.
            write_txn.abort().map_err(storage_err)?;
            return Ok(());
        }
        if writes.epoch > stored {
            Self::reset_tables(&write_txn, writes.epoch)?;
        }

        if let Some(record) = &writes.node {
            Self::write_node(&write_txn, record, true)?;
        }
        Self::write_edges(&write_txn, &writes.edges)?;

        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn clear(&self, epoch: u64) -> Result<(), GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        if epoch < Self::stored_epoch(&write_txn)? {
            write_txn.abort().map_err(storage_err)?;
            return Ok(());
        }
        Self::reset_tables(&write_txn, epoch)?;
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn replace(&self, graph: &SerializableGraph) -> Result<(), GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        Self::reset_tables(&write_txn, graph.epoch)?;
        for record in &graph.nodes {
            Self::write_node(&write_txn, record, false)?;
        }
        Self::write_edges(&write_txn, &graph.edges)?;
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn load(&self) -> Result<SerializableGraph, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;

        let mut nodes = Vec::new();
        for definition in [USERS, TRANSACTIONS] {
            let table = read_txn.open_table(definition).map_err(storage_err)?;
            for entry in table.iter().map_err(storage_err)? {
                let (_, value) = entry.map_err(storage_err)?;
                nodes.push(decode_record(value.value())?);
            }
        }

        let mut edges = Vec::new();
        {
            let table = read_txn.open_table(EDGES).map_err(storage_err)?;
            for entry in table.iter().map_err(storage_err)? {
                let (key, value) = entry.map_err(storage_err)?;
                let (source, target, code) = key.value();
                let kind = EdgeKind::from_code(code).ok_or_else(|| {
                    GraphError::Serialization(format!("Unknown edge kind code: {}", code))
                })?;
                let (source_kind, target_kind) = kind.endpoint_kinds();
                edges.push(EdgeRecord {
                    seq: value.value(),
                    edge: Edge::new(
                        NodeKey::new(source_kind, source),
                        NodeKey::new(target_kind, target),
                        kind,
                    ),
                });
            }
        }

        let epoch = {
            let table = read_txn.open_table(METADATA).map_err(storage_err)?;
            table
                .get(EPOCH_KEY)
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        let revision = nodes.iter().map(|r| r.revision).max().unwrap_or(0);
        Ok(SerializableGraph {
            epoch,
            revision,
            nodes,
            edges,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
