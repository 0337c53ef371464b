//! # Storage
//!
//! Persistent mirrors of the in-memory store.
//!
//! The `Graph` stays authoritative. After every committed write the
//! engine hands a `WriteSet` to its mirror, outside of any lock. Mirrors
//! order writes by store epoch and node revision, never by arrival.

mod redb_store;

pub use redb_store::RedbStore;

use std::fmt;

use crate::graph::SerializableGraph;
use crate::types::{EdgeRecord, GraphError, NodeRecord};

/// Everything one engine write changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    /// Store epoch the write happened in.
    pub epoch: u64,
    /// The written node, if any.
    pub node: Option<NodeRecord>,
    /// Edges created by the write and its inference pass.
    pub edges: Vec<EdgeRecord>,
}

impl WriteSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node.is_none() && self.edges.is_empty()
    }
}

/// A persistent copy of the store.
pub trait GraphMirror: Send + Sync + fmt::Debug {
    /// Apply one write. Stale epochs and older node revisions are ignored.
    fn persist(&self, writes: &WriteSet) -> Result<(), GraphError>;

    /// Drop everything and move to `epoch`.
    fn clear(&self, epoch: u64) -> Result<(), GraphError>;

    /// Replace the whole contents with `graph`.
    fn replace(&self, graph: &SerializableGraph) -> Result<(), GraphError>;

    /// Read the whole contents back.
    fn load(&self) -> Result<SerializableGraph, GraphError>;
}

impl<M: GraphMirror + ?Sized> GraphMirror for std::sync::Arc<M> {
    fn persist(&self, writes: &WriteSet) -> Result<(), GraphError> {
        (**self).persist(writes)
    }

    fn clear(&self, epoch: u64) -> Result<(), GraphError> {
        (**self).clear(epoch)
    }

    fn replace(&self, graph: &SerializableGraph) -> Result<(), GraphError> {
        (**self).replace(graph)
    }

    fn load(&self) -> Result<SerializableGraph, GraphError> {
        (**self).load()
    }
}
