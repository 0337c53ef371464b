//! # Graph Store
//!
//! The deterministic property graph of users and transactions.
//!
//! All data structures use `BTreeMap` for deterministic ordering.
//! Node and edge insertion order is tracked explicitly so listings,
//! snapshots and BFS tie-breaks are reproducible.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::index::AttributeIndex;
use crate::primitives::MAX_LIST_LIMIT;
use crate::types::{
    Edge, EdgeKind, EdgeRecord, GraphError, Node, NodeKey, NodeKind, NodeRecord, Transaction,
    TransactionPatch, User, UserPatch,
};
use crate::validation::Validator;

// =============================================================================
// ADJACENCY
// =============================================================================

/// Direction of an edge relative to the node it is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// One edge as seen from one of its endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    pub edge: Edge,
    pub neighbor: NodeKey,
    pub direction: Direction,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeSlot {
    node: Node,
    seq: u64,
    revision: u64,
}

// =============================================================================
// WRITE RESULTS
// =============================================================================

/// Result of a node upsert on the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    /// The node as stored after the write.
    pub record: NodeRecord,
    /// True if the node did not exist before.
    pub created: bool,
    /// Structural edges created by this write (SENT / RECEIVED_BY).
    pub edges: Vec<EdgeRecord>,
}

/// Node and edge counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub users: usize,
    pub transactions: usize,
    pub edges: usize,
    pub sent: usize,
    pub received_by: usize,
    pub shared_attribute: usize,
    pub linked: usize,
    pub epoch: u64,
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The main Graph structure.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
/// No `HashMap` allowed.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node storage: NodeKey -> node + bookkeeping
    nodes: BTreeMap<NodeKey, NodeSlot>,

    /// Insertion order: node seq -> NodeKey
    order: BTreeMap<u64, NodeKey>,

    /// Edge set: Edge -> edge seq
    edges: BTreeMap<Edge, u64>,

    /// Creation order: edge seq -> Edge
    edge_log: BTreeMap<u64, Edge>,

    /// Incident edges per node, both directions, in creation order
    adjacency: BTreeMap<NodeKey, Vec<Incident>>,

    /// Inverted attribute index for inference
    index: AttributeIndex,

    next_node_seq: u64,
    next_edge_seq: u64,

    /// Monotonic write counter, never reset
    revision: u64,

    /// Bumped on every clear
    epoch: u64,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Insert or merge-patch a user.
    ///
    /// Provided fields overwrite, omitted fields are kept. `name` is
    /// required when the user is new.
    pub fn upsert_user(&mut self, patch: &UserPatch) -> Result<Upserted, GraphError> {
        let key = NodeKey::user(patch.user_id.as_str());
        self.ensure_id_free(&key)?;

        let user = match self.nodes.get(&key).map(|slot| &slot.node) {
            Some(Node::User(existing)) => {
                let mut user = existing.clone();
                merge(&mut user.name, patch.name.as_ref());
                merge_opt(&mut user.email, patch.email.as_ref());
                merge_opt(&mut user.phone, patch.phone.as_ref());
                merge_opt(&mut user.address, patch.address.as_ref());
                merge_opt(&mut user.payment_method, patch.payment_method.as_ref());
                user
            }
            _ => User {
                user_id: patch.user_id.clone(),
                name: patch.name.clone().ok_or_else(|| {
                    GraphError::Validation("name is required for a new user".to_string())
                })?,
                email: patch.email.clone(),
                phone: patch.phone.clone(),
                address: patch.address.clone(),
                payment_method: patch.payment_method.clone(),
            },
        };

        let (record, created) = self.commit(Node::User(user));
        Ok(Upserted {
            record,
            created,
            edges: Vec::new(),
        })
    }

    /// Insert or merge-patch a transaction and link it to its users.
    ///
    /// Sender and receiver must exist (sender checked first) and cannot
    /// change once the transaction exists. `amount` is required when new.
    pub fn upsert_transaction(&mut self, patch: &TransactionPatch) -> Result<Upserted, GraphError> {
        let key = NodeKey::transaction(patch.txn_id.as_str());
        self.ensure_id_free(&key)?;

        let sender = NodeKey::user(patch.sender_id.as_str());
        let receiver = NodeKey::user(patch.receiver_id.as_str());
        for party in [&sender, &receiver] {
            if !self.nodes.contains_key(party) {
                return Err(GraphError::ReferenceNotFound(party.clone()));
            }
        }

        let txn = match self.nodes.get(&key).map(|slot| &slot.node) {
            Some(Node::Transaction(existing)) => {
                if existing.sender_id != patch.sender_id
                    || existing.receiver_id != patch.receiver_id
                {
                    return Err(GraphError::Validation(format!(
                        "sender_id and receiver_id of transaction {} cannot change",
                        patch.txn_id
                    )));
                }
                let mut txn = existing.clone();
                merge(&mut txn.amount, patch.amount.as_ref());
                merge_opt(&mut txn.device_id, patch.device_id.as_ref());
                merge_opt(&mut txn.ip_address, patch.ip_address.as_ref());
                txn
            }
            _ => Transaction {
                txn_id: patch.txn_id.clone(),
                sender_id: patch.sender_id.clone(),
                receiver_id: patch.receiver_id.clone(),
                amount: patch.amount.ok_or_else(|| {
                    GraphError::Validation("amount is required for a new transaction".to_string())
                })?,
                device_id: patch.device_id.clone(),
                ip_address: patch.ip_address.clone(),
            },
        };

        let (record, created) = self.commit(Node::Transaction(txn));

        let mut edges = Vec::new();
        for edge in [
            Edge::new(sender, key.clone(), EdgeKind::Sent),
            Edge::new(key, receiver, EdgeKind::ReceivedBy),
        ] {
            if let Some(created_edge) = self.insert_edge(edge)? {
                edges.push(created_edge);
            }
        }

        Ok(Upserted {
            record,
            created,
            edges,
        })
    }

    /// Insert an edge if it does not exist yet.
    ///
    /// Returns the new record, or `None` when the edge (or, for inferred
    /// kinds, its reverse) already exists. Self-loops and endpoints of the
    /// wrong kind are rejected with `Validation`, dangling endpoints with
    /// `ReferenceNotFound`.
    pub fn insert_edge(&mut self, edge: Edge) -> Result<Option<EdgeRecord>, GraphError> {
        if edge.source == edge.target {
            return Err(GraphError::Validation(format!(
                "self-loop on {} is not allowed",
                edge.source
            )));
        }
        if (edge.source.kind(), edge.target.kind()) != edge.kind.endpoint_kinds() {
            return Err(GraphError::Validation(format!(
                "{} cannot connect {} to {}",
                edge.kind,
                edge.source.kind(),
                edge.target.kind()
            )));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::ReferenceNotFound(endpoint.clone()));
            }
        }
        if self.contains_edge(&edge) {
            return Ok(None);
        }

        let seq = self.next_edge_seq;
        self.next_edge_seq = seq
            .checked_add(1)
            .ok_or_else(|| GraphError::Serialization("edge sequence exhausted".to_string()))?;

        self.adjacency
            .entry(edge.source.clone())
            .or_default()
            .push(Incident {
                edge: edge.clone(),
                neighbor: edge.target.clone(),
                direction: Direction::Outgoing,
                seq,
            });
        self.adjacency
            .entry(edge.target.clone())
            .or_default()
            .push(Incident {
                edge: edge.clone(),
                neighbor: edge.source.clone(),
                direction: Direction::Incoming,
                seq,
            });
        self.edge_log.insert(seq, edge.clone());
        self.edges.insert(edge.clone(), seq);

        Ok(Some(EdgeRecord { seq, edge }))
    }

    /// Remove every node, edge and index entry and start a new epoch.
    pub fn clear(&mut self) {
        let revision = self.revision;
        let epoch = self.epoch + 1;
        *self = Self {
            revision,
            epoch,
            ..Self::default()
        };
    }

    fn ensure_id_free(&self, key: &NodeKey) -> Result<(), GraphError> {
        let other = match key.kind() {
            NodeKind::User => NodeKey::transaction(key.id()),
            NodeKind::Transaction => NodeKey::user(key.id()),
        };
        if self.nodes.contains_key(&other) {
            return Err(GraphError::Validation(format!(
                "id {} is already used by a {}",
                key.id(),
                other.kind()
            )));
        }
        Ok(())
    }

    fn commit(&mut self, node: Node) -> (NodeRecord, bool) {
        let key = node.key();
        self.revision += 1;
        let revision = self.revision;

        let (seq, created) = match self.nodes.get_mut(&key) {
            Some(slot) => {
                self.index
                    .update(&key, &slot.node.match_attributes(), &node.match_attributes());
                slot.node = node.clone();
                slot.revision = revision;
                (slot.seq, false)
            }
            None => {
                let seq = self.next_node_seq;
                self.next_node_seq += 1;
                self.index.update(&key, &[], &node.match_attributes());
                self.order.insert(seq, key.clone());
                self.nodes.insert(
                    key,
                    NodeSlot {
                        node: node.clone(),
                        seq,
                        revision,
                    },
                );
                (seq, true)
            }
        };

        (
            NodeRecord {
                seq,
                revision,
                node,
            },
            created,
        )
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Get a node by key.
    #[must_use]
    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key).map(|slot| &slot.node)
    }

    /// Get a node with its sequence and revision.
    #[must_use]
    pub fn record(&self, key: &NodeKey) -> Option<NodeRecord> {
        self.nodes.get(key).map(|slot| NodeRecord {
            seq: slot.seq,
            revision: slot.revision,
            node: slot.node.clone(),
        })
    }

    /// Map a bare id to the key of the node carrying it.
    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<NodeKey> {
        [NodeKey::user(id), NodeKey::transaction(id)]
            .into_iter()
            .find(|key| self.nodes.contains_key(key))
    }

    #[must_use]
    pub fn contains_node(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// True if `edge` exists, or, for inferred kinds, its reverse does.
    #[must_use]
    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.edges.contains_key(edge)
            || (edge.kind.is_inferred() && self.edges.contains_key(&edge.reversed()))
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order
            .values()
            .filter_map(|key| self.nodes.get(key))
            .map(|slot| &slot.node)
    }

    /// Nodes of one kind in insertion order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> + '_ {
        self.nodes().filter(move |node| node.kind() == kind)
    }

    /// Up to `limit` nodes of `kind` in insertion order, clamped to `MAX_LIST_LIMIT`.
    #[must_use]
    pub fn list(&self, kind: NodeKind, limit: usize) -> Vec<&Node> {
        self.nodes_of_kind(kind)
            .take(limit.min(MAX_LIST_LIMIT))
            .collect()
    }

    /// All edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edge_log.values()
    }

    /// Incident edges of `key` in creation order. Empty for unknown nodes.
    #[must_use]
    pub fn incident(&self, key: &NodeKey) -> &[Incident] {
        self.adjacency.get(key).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn index(&self) -> &AttributeIndex {
        &self.index
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn edge_count_by_kind(&self, kind: EdgeKind) -> usize {
        self.edges.keys().filter(|edge| edge.kind == kind).count()
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            edges: self.edges.len(),
            epoch: self.epoch,
            ..GraphStats::default()
        };
        for slot in self.nodes.values() {
            match slot.node.kind() {
                NodeKind::User => stats.users += 1,
                NodeKind::Transaction => stats.transactions += 1,
            }
        }
        for edge in self.edges.keys() {
            match edge.kind {
                EdgeKind::Sent => stats.sent += 1,
                EdgeKind::ReceivedBy => stats.received_by += 1,
                EdgeKind::SharedAttribute => stats.shared_attribute += 1,
                EdgeKind::Linked => stats.linked += 1,
            }
        }
        stats
    }
}

fn merge<T: Clone>(field: &mut T, value: Option<&T>) {
    if let Some(v) = value {
        field.clone_from(v);
    }
}

fn merge_opt<T: Clone>(field: &mut Option<T>, value: Option<&T>) {
    if let Some(v) = value {
        *field = Some(v.clone());
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Flat, serializable form of a `Graph`.
///
/// The attribute index and adjacency are derived and rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub epoch: u64,
    pub revision: u64,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl From<&Graph> for SerializableGraph {
    fn from(graph: &Graph) -> Self {
        let nodes = graph
            .order
            .values()
            .filter_map(|key| graph.record(key))
            .collect();
        let edges = graph
            .edge_log
            .iter()
            .map(|(seq, edge)| EdgeRecord {
                seq: *seq,
                edge: edge.clone(),
            })
            .collect();
        Self {
            epoch: graph.epoch,
            revision: graph.revision,
            nodes,
            edges,
        }
    }
}

impl TryFrom<SerializableGraph> for Graph {
    type Error = GraphError;

    /// Rebuild a graph from its flat form.
    ///
    /// The input is untrusted: duplicate sequence numbers or keys, id
    /// collisions across kinds, invalid nodes, transactions whose parties
    /// are missing and edges the store would refuse all fail the load.
    fn try_from(mut sg: SerializableGraph) -> Result<Self, Self::Error> {
        sg.nodes.sort_by_key(|record| record.seq);
        sg.edges.sort_by_key(|record| record.seq);

        let mut graph = Graph {
            epoch: sg.epoch,
            ..Graph::default()
        };

        for record in sg.nodes {
            let key = record.node.key();
            Validator::node(&record.node)?;
            if graph.order.contains_key(&record.seq) {
                return Err(GraphError::Serialization(format!(
                    "duplicate node sequence {}",
                    record.seq
                )));
            }
            if graph.nodes.contains_key(&key) {
                return Err(GraphError::Serialization(format!("duplicate node {}", key)));
            }
            graph.ensure_id_free(&key)?;

            graph.index.update(&key, &[], &record.node.match_attributes());
            graph.order.insert(record.seq, key.clone());
            graph.next_node_seq = next_seq(record.seq, "node")?;
            graph.revision = graph.revision.max(record.revision);
            graph.nodes.insert(
                key,
                NodeSlot {
                    node: record.node,
                    seq: record.seq,
                    revision: record.revision,
                },
            );
        }

        for slot in graph.nodes.values() {
            if let Node::Transaction(txn) = &slot.node {
                for party in [&txn.sender_id, &txn.receiver_id] {
                    if !graph.nodes.contains_key(&NodeKey::user(party.as_str())) {
                        return Err(GraphError::Validation(format!(
                            "transaction {} references missing user {}",
                            txn.txn_id, party
                        )));
                    }
                }
            }
        }

        for record in sg.edges {
            if graph.edge_log.contains_key(&record.seq) {
                return Err(GraphError::Serialization(format!(
                    "duplicate edge sequence {}",
                    record.seq
                )));
            }
            graph.ensure_structural_edge_matches(&record.edge)?;
            graph.next_edge_seq = record.seq;
            if graph.insert_edge(record.edge.clone())?.is_none() {
                return Err(GraphError::Serialization(format!(
                    "duplicate edge {}",
                    record.edge.id()
                )));
            }
        }
        graph.next_edge_seq = match graph.edge_log.keys().next_back() {
            Some(last) => next_seq(*last, "edge")?,
            None => 0,
        };
        graph.revision = graph.revision.max(sg.revision);

        for slot in graph.nodes.values() {
            if let Node::Transaction(txn) = &slot.node {
                let key = NodeKey::transaction(txn.txn_id.as_str());
                for edge in [
                    Edge::new(NodeKey::user(txn.sender_id.as_str()), key.clone(), EdgeKind::Sent),
                    Edge::new(key, NodeKey::user(txn.receiver_id.as_str()), EdgeKind::ReceivedBy),
                ] {
                    if !graph.contains_edge(&edge) {
                        return Err(GraphError::Validation(format!(
                            "transaction {} is missing edge {}",
                            txn.txn_id,
                            edge.id()
                        )));
                    }
                }
            }
        }

        Ok(graph)
    }
}

impl Graph {
    /// A SENT or RECEIVED_BY edge must point at the transaction's own parties.
    fn ensure_structural_edge_matches(&self, edge: &Edge) -> Result<(), GraphError> {
        let (txn_key, party) = match edge.kind {
            EdgeKind::Sent => (&edge.target, &edge.source),
            EdgeKind::ReceivedBy => (&edge.source, &edge.target),
            EdgeKind::SharedAttribute | EdgeKind::Linked => return Ok(()),
        };
        match self.get(txn_key) {
            Some(Node::Transaction(txn)) => {
                let expected = if edge.kind == EdgeKind::Sent {
                    &txn.sender_id
                } else {
                    &txn.receiver_id
                };
                if party.id() == expected {
                    Ok(())
                } else {
                    Err(GraphError::Validation(format!(
                        "edge {} does not match transaction {}",
                        edge.id(),
                        txn.txn_id
                    )))
                }
            }
            _ => Ok(()),
        }
    }
}

fn next_seq(seq: u64, what: &str) -> Result<u64, GraphError> {
    seq.checked_add(1)
        .ok_or_else(|| GraphError::Serialization(format!("{} sequence {} overflows", what, seq)))
}

// =============================================================================
// TESTS
// =============================================================================
