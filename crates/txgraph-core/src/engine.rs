//! # Engine
//!
//! The constructible, thread-safe front of the graph.
//!
//! The `Engine` owns the `Graph` behind one `RwLock`, runs inference
//! after every write, and mirrors committed changes to an optional
//! persistent backend. Lifecycle: create → serve → reset/shutdown.
//!
//! ## Write path
//!
//! 1. Validate the patch (no lock).
//! 2. Upsert under the write lock.
//! 3. Plan inference under a read lock (cancellable).
//! 4. Apply planned edges under a short write lock.
//! 5. Mirror the write set, after every lock is released.
//!
//! Because each write commits before its own planning phase, two writers
//! sharing an attribute always see each other at least one way round.

use parking_lot::RwLock;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::graph::{Graph, GraphStats, SerializableGraph, Upserted};
use crate::inference::{self, InferenceOutcome, InferenceStrategy};
use crate::primitives::DEFAULT_LIST_LIMIT;
use crate::query::{Query, QueryOutcome, QueryType};
use crate::storage::{GraphMirror, RedbStore, WriteSet};
use crate::traversal::{self, Traversal};
use crate::types::{
    EdgeRecord, GraphError, Node, NodeKey, NodeKind, TransactionPatch, UserPatch,
};
use crate::validation::Validator;
use crate::views::{GraphSnapshot, Neighborhood, NodeView};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Tunables of an `Engine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How inference finds candidates.
    pub inference: InferenceStrategy,
    /// Deadline for each inference pass. `None` means unbounded.
    pub inference_timeout: Option<Duration>,
    /// Page size of `list_nodes` when the caller gives none.
    pub default_list_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inference: InferenceStrategy::default(),
            inference_timeout: None,
            default_list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Result of a user or transaction upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// The node as stored after the write.
    pub node: Node,
    pub created: bool,
    pub revision: u64,
    /// SENT / RECEIVED_BY edges created by this write.
    pub structural: Vec<EdgeRecord>,
    /// Inferred edges created by this write, and whether the pass finished.
    pub inference: InferenceOutcome,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Thread-safe graph engine. Share it as `Arc<Engine>`.
#[derive(Debug)]
pub struct Engine {
    graph: RwLock<Graph>,
    config: EngineConfig,
    mirror: Option<Box<dyn GraphMirror>>,
    /// Cancelled by `shutdown`; every pass derives from it.
    root: CancelToken,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Empty in-memory engine with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Empty in-memory engine.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::from_graph(Graph::new(), config)
    }

    /// In-memory engine over an existing graph.
    #[must_use]
    pub fn from_graph(graph: Graph, config: EngineConfig) -> Self {
        Self {
            graph: RwLock::new(graph),
            config,
            mirror: None,
            root: CancelToken::new(),
        }
    }

    /// Engine over `graph` that mirrors every write to `mirror`.
    #[must_use]
    pub fn with_mirror(graph: Graph, config: EngineConfig, mirror: Box<dyn GraphMirror>) -> Self {
        Self {
            mirror: Some(mirror),
            ..Self::from_graph(graph, config)
        }
    }

    /// Open (or create) a redb database and load its contents.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self, GraphError> {
        let store = RedbStore::open(path.as_ref())?;
        let graph = Graph::try_from(store.load()?)?;
        info!(
            path = %path.as_ref().display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Opened redb store"
        );
        Ok(Self::with_mirror(graph, config, Box::new(store)))
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True if writes are mirrored to a persistent backend.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.mirror.is_some()
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Insert or merge-patch a user, then infer `SHARED_ATTRIBUTE` edges.
    pub fn upsert_user(&self, patch: UserPatch) -> Result<UpsertOutcome, GraphError> {
        self.ensure_open()?;
        Validator::user(&patch)?;
        let (upserted, epoch) = {
            let mut graph = self.graph.write();
            let upserted = graph.upsert_user(&patch)?;
            (upserted, graph.epoch())
        };
        debug!(user_id = %patch.user_id, created = upserted.created, "Upserted user");
        self.finish_write(upserted, epoch)
    }

    /// Insert or merge-patch a transaction, link it to its users, then
    /// infer `LINKED` edges.
    pub fn upsert_transaction(&self, patch: TransactionPatch) -> Result<UpsertOutcome, GraphError> {
        self.ensure_open()?;
        Validator::transaction(&patch)?;
        let (upserted, epoch) = {
            let mut graph = self.graph.write();
            let upserted = graph.upsert_transaction(&patch)?;
            (upserted, graph.epoch())
        };
        debug!(txn_id = %patch.txn_id, created = upserted.created, "Upserted transaction");
        self.finish_write(upserted, epoch)
    }

    /// Re-run inference for one node, e.g. after a cancelled pass.
    pub fn reinfer(
        &self,
        key: &NodeKey,
        cancel: &CancelToken,
    ) -> Result<InferenceOutcome, GraphError> {
        self.ensure_open()?;
        if !self.graph.read().contains_node(key) {
            return Err(GraphError::NotFound(key.id().to_string()));
        }
        let (outcome, epoch) = self.run_inference(key, cancel);
        self.mirror_write(WriteSet {
            epoch,
            node: None,
            edges: outcome.edges.clone(),
        })?;
        Ok(outcome)
    }

    /// Remove every node and edge and start a new epoch.
    pub fn reset(&self) -> Result<(), GraphError> {
        self.ensure_open()?;
        let epoch = {
            let mut graph = self.graph.write();
            graph.clear();
            graph.epoch()
        };
        info!(epoch, "Store reset");
        if let Some(mirror) = &self.mirror {
            mirror.clear(epoch).map_err(|e| self.mirror_failure(e))?;
        }
        Ok(())
    }

    /// Replace the whole store with `graph` (snapshot import).
    ///
    /// The imported store starts a new epoch so no in-flight write from
    /// before the import can reach the mirror afterwards.
    pub fn import_graph(&self, graph: Graph) -> Result<(), GraphError> {
        self.ensure_open()?;
        let serializable = {
            let mut current = self.graph.write();
            let mut serializable = SerializableGraph::from(&graph);
            serializable.epoch = current.epoch() + 1;
            serializable.revision = serializable.revision.max(current.revision());
            *current = Graph::try_from(serializable.clone())?;
            serializable
        };
        info!(
            nodes = serializable.nodes.len(),
            edges = serializable.edges.len(),
            "Imported graph"
        );
        if let Some(mirror) = &self.mirror {
            mirror
                .replace(&serializable)
                .map_err(|e| self.mirror_failure(e))?;
        }
        Ok(())
    }

    /// Stop accepting writes and cancel in-flight passes.
    pub fn shutdown(&self) {
        if !self.root.is_cancelled() {
            info!("Engine shutting down");
        }
        self.root.cancel();
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    fn ensure_open(&self) -> Result<(), GraphError> {
        if self.root.is_cancelled() {
            return Err(GraphError::StorageUnavailable(
                "engine is shut down".to_string(),
            ));
        }
        Ok(())
    }

    fn finish_write(&self, upserted: Upserted, epoch: u64) -> Result<UpsertOutcome, GraphError> {
        let key = upserted.record.node.key();
        let cancel = self.root.child(self.config.inference_timeout);
        let (inference, inference_epoch) = self.run_inference(&key, &cancel);

        let mut writes = WriteSet {
            epoch,
            node: Some(upserted.record.clone()),
            edges: upserted.edges.clone(),
        };
        if inference_epoch == epoch {
            writes.edges.extend(inference.edges.iter().cloned());
            self.mirror_write(writes)?;
        } else {
            self.mirror_write(writes)?;
            self.mirror_write(WriteSet {
                epoch: inference_epoch,
                node: None,
                edges: inference.edges.clone(),
            })?;
        }

        Ok(UpsertOutcome {
            node: upserted.record.node,
            created: upserted.created,
            revision: upserted.record.revision,
            structural: upserted.edges,
            inference,
        })
    }

    /// Plan under a read lock, apply under a write lock. Returns the
    /// outcome and the epoch the edges were applied in.
    fn run_inference(&self, key: &NodeKey, cancel: &CancelToken) -> (InferenceOutcome, u64) {
        let (planned, epoch) = {
            let graph = self.graph.read();
            (
                inference::plan(&graph, key, self.config.inference, cancel),
                graph.epoch(),
            )
        };

        let planned = match planned {
            Ok(planned) => planned,
            Err(e) => {
                warn!(node = %key, error = %e, "Inference did not finish; reinfer to complete");
                return (InferenceOutcome::cancelled(), epoch);
            }
        };
        if planned.is_empty() {
            return (InferenceOutcome::complete(Vec::new()), epoch);
        }

        let mut graph = self.graph.write();
        if cancel.is_cancelled() {
            warn!(node = %key, "Inference cancelled before apply; reinfer to complete");
            return (InferenceOutcome::cancelled(), graph.epoch());
        }
        let created = inference::apply(&mut graph, planned);
        debug!(node = %key, created = created.len(), "Inference applied");
        (InferenceOutcome::complete(created), graph.epoch())
    }

    fn mirror_write(&self, writes: WriteSet) -> Result<(), GraphError> {
        match &self.mirror {
            Some(mirror) if !writes.is_empty() => {
                mirror.persist(&writes).map_err(|e| self.mirror_failure(e))
            }
            _ => Ok(()),
        }
    }

    fn mirror_failure(&self, error: GraphError) -> GraphError {
        warn!(error = %error, "Persistent mirror failed; in-memory state kept");
        match error {
            GraphError::StorageUnavailable(message) => GraphError::StorageUnavailable(message),
            other => GraphError::StorageUnavailable(other.to_string()),
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Fetch a node of a known kind.
    pub fn get_node(&self, kind: NodeKind, id: &str) -> Result<Node, GraphError> {
        self.graph
            .read()
            .get(&NodeKey::new(kind, id))
            .cloned()
            .ok_or_else(|| GraphError::NotFound(id.to_string()))
    }

    /// Fetch a node by bare id, whatever its kind.
    pub fn get(&self, id: &str) -> Result<Node, GraphError> {
        let graph = self.graph.read();
        graph
            .resolve(id)
            .and_then(|key| graph.get(&key).cloned())
            .ok_or_else(|| GraphError::NotFound(id.to_string()))
    }

    /// Nodes of `kind` in insertion order. `None` uses the configured default.
    #[must_use]
    pub fn list_nodes(&self, kind: NodeKind, limit: Option<usize>) -> Vec<Node> {
        let limit = limit.unwrap_or(self.config.default_list_limit);
        self.graph
            .read()
            .list(kind, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Every node and edge.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::from(&*self.graph.read())
    }

    /// A node and all of its incident edges, by bare id.
    pub fn neighborhood(&self, id: &str) -> Result<Neighborhood, GraphError> {
        let graph = self.graph.read();
        let key = graph
            .resolve(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        Neighborhood::of(&graph, &key)
    }

    #[must_use]
    pub fn stats(&self) -> GraphStats {
        self.graph.read().stats()
    }

    /// Shortest undirected path between two bare ids.
    pub fn shortest_path(&self, from: &str, to: &str) -> Result<Vec<NodeKey>, GraphError> {
        self.shortest_path_with(from, to, &self.root.child(None))
    }

    /// Shortest path with a caller-supplied cancel token.
    pub fn shortest_path_with(
        &self,
        from: &str,
        to: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<NodeKey>, GraphError> {
        let graph = self.graph.read();
        let no_path = || GraphError::NoPathFound {
            from: from.to_string(),
            to: to.to_string(),
        };
        let from_key = graph.resolve(from).ok_or_else(no_path)?;
        let to_key = graph.resolve(to).ok_or_else(no_path)?;
        traversal::shortest_path(&graph, &from_key, &to_key, cancel)
    }

    /// Nodes within `depth` hops of a bare id.
    pub fn reachable(&self, id: &str, depth: usize) -> Result<Traversal, GraphError> {
        self.reachable_with(id, depth, &self.root.child(None))
    }

    fn reachable_with(
        &self,
        id: &str,
        depth: usize,
        cancel: &CancelToken,
    ) -> Result<Traversal, GraphError> {
        let graph = self.graph.read();
        let key = graph
            .resolve(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        traversal::reachable(&graph, &key, depth, cancel)
    }

    /// Run a structured query under its own deadline.
    pub fn execute(&self, query: &Query) -> Result<QueryOutcome, GraphError> {
        let cancel = query.cancel_token(&self.root);
        cancel.check()?;
        match &query.query_type {
            QueryType::Lookup(id) => self.get(id).map(|node| QueryOutcome::Node(NodeView::from(&node))),
            QueryType::ShortestPath { from, to } => self
                .shortest_path_with(from, to, &cancel)
                .map(QueryOutcome::Path),
            QueryType::Reachable { start, depth } => self
                .reachable_with(start, *depth, &cancel)
                .map(QueryOutcome::Reachable),
            QueryType::Neighborhood(id) => self.neighborhood(id).map(QueryOutcome::Neighborhood),
        }
    }

    /// A copy of the in-memory store, e.g. for writing a snapshot file.
    #[must_use]
    pub fn export_graph(&self) -> Graph {
        self.graph.read().clone()
    }
}

// =============================================================================
// TESTS
// =============================================================================
