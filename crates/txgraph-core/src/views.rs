//! # Read Views
//!
//! Serializable read-side projections of the store: the full graph
//! snapshot and the neighborhood of a single node.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::{Direction, Graph};
use crate::types::{Edge, EdgeKind, GraphError, Node, NodeKey, NodeKind};

/// A node as exposed to callers: id, type, label and its stored fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl From<&Node> for NodeView {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id().to_string(),
            kind: node.kind(),
            label: node.label().to_string(),
            attributes: node
                .fields()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }
}

/// An edge as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeView {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

impl From<&Edge> for EdgeView {
    fn from(edge: &Edge) -> Self {
        Self {
            id: edge.id(),
            source: edge.source.id().to_string(),
            target: edge.target.id().to_string(),
            kind: edge.kind,
        }
    }
}

/// Every node in insertion order and every edge in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

impl From<&Graph> for GraphSnapshot {
    fn from(graph: &Graph) -> Self {
        Self {
            nodes: graph.nodes().map(NodeView::from).collect(),
            edges: graph.edges().map(EdgeView::from).collect(),
        }
    }
}

/// One incident edge of a node, seen from that node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub relation: EdgeKind,
    pub direction: Direction,
    pub connected: NodeView,
}

/// A node and all edges touching it, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub node: NodeView,
    pub relations: Vec<Relation>,
}

impl Neighborhood {
    /// Build the neighborhood of `key`, or `NotFound`.
    pub fn of(graph: &Graph, key: &NodeKey) -> Result<Self, GraphError> {
        let node = graph
            .get(key)
            .ok_or_else(|| GraphError::NotFound(key.id().to_string()))?;
        let relations = graph
            .incident(key)
            .iter()
            .filter_map(|incident| {
                graph.get(&incident.neighbor).map(|connected| Relation {
                    relation: incident.edge.kind,
                    direction: incident.direction,
                    connected: NodeView::from(connected),
                })
            })
            .collect();
        Ok(Self {
            node: NodeView::from(node),
            relations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, TransactionPatch, UserPatch};

    fn sample() -> Graph {
        let mut graph = Graph::new();
        graph
            .upsert_user(&UserPatch::new("u1").name("Alice").email("a@x.io"))
            .expect("u1");
        graph
            .upsert_user(&UserPatch::new("u2").name("Bob"))
            .expect("u2");
        graph
            .upsert_transaction(
                &TransactionPatch::new("t1", "u1", "u2").amount(Amount::from_minor(1250)),
            )
            .expect("t1");
        graph
    }

    #[test]
    fn node_view_labels_and_fields() {
        let graph = sample();
        let snapshot = GraphSnapshot::from(&graph);

        let alice = &snapshot.nodes[0];
        assert_eq!(alice.label, "Alice");
        assert_eq!(alice.kind, NodeKind::User);
        assert_eq!(alice.attributes.get("email").map(String::as_str), Some("a@x.io"));
        assert!(!alice.attributes.contains_key("phone"));

        let txn = &snapshot.nodes[2];
        assert_eq!(txn.label, "t1");
        assert_eq!(txn.attributes.get("amount").map(String::as_str), Some("12.50"));
    }

    #[test]
    fn snapshot_keeps_creation_order() {
        let snapshot = GraphSnapshot::from(&sample());
        let ids: Vec<_> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2", "t1"]);
        let edge_ids: Vec<_> = snapshot.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(edge_ids, vec!["SENT:u1->t1", "RECEIVED_BY:t1->u2"]);
    }

    #[test]
    fn neighborhood_lists_both_directions() {
        let graph = sample();
        let around = Neighborhood::of(&graph, &NodeKey::transaction("t1")).expect("found");
        assert_eq!(around.relations.len(), 2);
        assert_eq!(around.relations[0].relation, EdgeKind::Sent);
        assert_eq!(around.relations[0].direction, Direction::Incoming);
        assert_eq!(around.relations[0].connected.id, "u1");
        assert_eq!(around.relations[1].relation, EdgeKind::ReceivedBy);
        assert_eq!(around.relations[1].direction, Direction::Outgoing);
    }

    #[test]
    fn neighborhood_of_missing_node() {
        assert!(matches!(
            Neighborhood::of(&Graph::new(), &NodeKey::user("x")),
            Err(GraphError::NotFound(_))
        ));
    }
}
