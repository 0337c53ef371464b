//! # Relationship Inference
//!
//! Materializes edges between nodes of the same kind that share an
//! identifying attribute:
//! - users on email, phone, address, payment method → `SHARED_ATTRIBUTE`
//! - transactions on device id, IP address → `LINKED`
//!
//! A pass is split in two so the engine can plan under a read lock and
//! apply under a short write lock:
//! 1. [`plan`] is read-only and cancellable.
//! 2. [`apply`] re-checks every planned edge against the current store
//!    and inserts the ones still eligible.
//!
//! Inference is additive: it never removes edges, and re-running it on an
//! unchanged store creates nothing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::graph::Graph;
use crate::types::{Edge, EdgeRecord, GraphError, Node, NodeKey};

/// How candidates for a trigger node are found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceStrategy {
    /// Look candidates up in the attribute index.
    #[default]
    Indexed,
    /// Compare against every node of the same kind.
    #[serde(alias = "scan")]
    FullScan,
}

/// Whether an inference pass ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceStatus {
    Complete,
    Cancelled,
}

/// Edges created by an inference pass and how the pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceOutcome {
    pub status: InferenceStatus,
    pub edges: Vec<EdgeRecord>,
}

impl InferenceOutcome {
    #[must_use]
    pub fn complete(edges: Vec<EdgeRecord>) -> Self {
        Self {
            status: InferenceStatus::Complete,
            edges,
        }
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            status: InferenceStatus::Cancelled,
            edges: Vec::new(),
        }
    }
}

/// Compute the inferred edges `trigger` should gain.
///
/// Read-only. Returns an empty plan when the trigger no longer exists,
/// and `Cancelled` as soon as the token fires.
pub fn plan(
    graph: &Graph,
    trigger: &NodeKey,
    strategy: InferenceStrategy,
    cancel: &CancelToken,
) -> Result<Vec<Edge>, GraphError> {
    cancel.check()?;
    let Some(node) = graph.get(trigger) else {
        return Ok(Vec::new());
    };
    let kind = node.kind().inferred_edge();

    let candidates: Vec<NodeKey> = match strategy {
        InferenceStrategy::Indexed => graph
            .index()
            .candidates(&node.match_attributes(), trigger)
            .into_iter()
            .collect(),
        InferenceStrategy::FullScan => graph
            .nodes_of_kind(node.kind())
            .map(Node::key)
            .filter(|key| key != trigger)
            .collect(),
    };

    let mut planned = Vec::new();
    for candidate in candidates {
        cancel.check()?;
        let Some(other) = graph.get(&candidate) else {
            continue;
        };
        if !node.shares_attribute_with(other) {
            continue;
        }
        let edge = Edge::new(trigger.clone(), candidate, kind);
        if !graph.contains_edge(&edge) {
            planned.push(edge);
        }
    }
    Ok(planned)
}

/// Insert planned edges whose endpoints still exist and still share an
/// attribute. Returns the edges actually created.
pub fn apply(graph: &mut Graph, planned: Vec<Edge>) -> Vec<EdgeRecord> {
    let mut created = Vec::new();
    for edge in planned {
        let eligible = match (graph.get(&edge.source), graph.get(&edge.target)) {
            (Some(a), Some(b)) => a.shares_attribute_with(b),
            _ => false,
        };
        if !eligible {
            debug!(edge = %edge.id(), "Skipping inferred edge no longer eligible");
            continue;
        }
        match graph.insert_edge(edge) {
            Ok(Some(record)) => created.push(record),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Skipping inferred edge"),
        }
    }
    created
}

/// Plan and apply in one step on an exclusively held graph.
pub fn infer(
    graph: &mut Graph,
    trigger: &NodeKey,
    strategy: InferenceStrategy,
    cancel: &CancelToken,
) -> Result<Vec<EdgeRecord>, GraphError> {
    let planned = plan(graph, trigger, strategy, cancel)?;
    Ok(apply(graph, planned))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, EdgeKind, TransactionPatch, UserPatch};

    fn add_user(graph: &mut Graph, patch: UserPatch) -> NodeKey {
        graph.upsert_user(&patch).expect("upsert").record.node.key()
    }

    #[test]
    fn users_sharing_email_get_one_edge() {
        let mut graph = Graph::new();
        let never = CancelToken::never();
        let a = add_user(&mut graph, UserPatch::new("a").name("A").email("x@y.z"));
        assert!(infer(&mut graph, &a, InferenceStrategy::Indexed, &never).expect("infer").is_empty());

        let b = add_user(&mut graph, UserPatch::new("b").name("B").email("x@y.z"));
        let created = infer(&mut graph, &b, InferenceStrategy::Indexed, &never).expect("infer");
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].edge, Edge::new(b.clone(), a.clone(), EdgeKind::SharedAttribute));

        // Re-running from either side creates nothing.
        assert!(infer(&mut graph, &a, InferenceStrategy::Indexed, &never).expect("infer").is_empty());
        assert!(infer(&mut graph, &b, InferenceStrategy::FullScan, &never).expect("infer").is_empty());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn several_shared_fields_still_one_edge() {
        let mut graph = Graph::new();
        let never = CancelToken::never();
        add_user(&mut graph, UserPatch::new("a").name("A").email("e").phone("p"));
        let b = add_user(&mut graph, UserPatch::new("b").name("B").email("e").phone("p"));
        let created = infer(&mut graph, &b, InferenceStrategy::Indexed, &never).expect("infer");
        assert_eq!(created.len(), 1);
    }

    #[test]
    fn transactions_link_on_device() {
        let mut graph = Graph::new();
        let never = CancelToken::never();
        add_user(&mut graph, UserPatch::new("u1").name("A"));
        add_user(&mut graph, UserPatch::new("u2").name("B"));
        for id in ["t1", "t2"] {
            graph
                .upsert_transaction(
                    &TransactionPatch::new(id, "u1", "u2")
                        .amount(Amount::from_minor(500))
                        .device_id("d1"),
                )
                .expect("txn");
        }
        let created = infer(
            &mut graph,
            &NodeKey::transaction("t2"),
            InferenceStrategy::Indexed,
            &never,
        )
        .expect("infer");
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].edge.kind, EdgeKind::Linked);
    }

    #[test]
    fn missing_trigger_plans_nothing() {
        let graph = Graph::new();
        let plan = plan(
            &graph,
            &NodeKey::user("ghost"),
            InferenceStrategy::Indexed,
            &CancelToken::never(),
        )
        .expect("plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn cancelled_plan_returns_error() {
        let mut graph = Graph::new();
        let a = add_user(&mut graph, UserPatch::new("a").name("A").email("e"));
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            plan(&graph, &a, InferenceStrategy::Indexed, &token),
            Err(GraphError::Cancelled)
        ));
    }

    #[test]
    fn apply_skips_edges_no_longer_eligible() {
        let mut graph = Graph::new();
        add_user(&mut graph, UserPatch::new("a").name("A").email("e"));
        let b = add_user(&mut graph, UserPatch::new("b").name("B").email("e"));
        let planned = plan(&graph, &b, InferenceStrategy::Indexed, &CancelToken::never())
            .expect("plan");
        assert_eq!(planned.len(), 1);

        graph
            .upsert_user(&UserPatch::new("a").email("changed"))
            .expect("update");
        assert!(apply(&mut graph, planned).is_empty());
        assert_eq!(graph.edge_count(), 0);
    }
}
