//! # Traversal Engine
//!
//! Breadth-first search over the store treated as one undirected graph:
//! every edge kind, in either direction, connects its two endpoints.
//!
//! Neighbors are expanded in adjacency insertion order, so among equally
//! short paths the one through the earliest-created edges wins.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::cancel::CancelToken;
use crate::graph::Graph;
use crate::primitives::{CANCEL_CHECK_INTERVAL, MAX_TRAVERSAL_DEPTH};
use crate::types::{Edge, GraphError, NodeKey};

/// A node reached by [`reachable`] and its hop distance from the start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub key: NodeKey,
    pub depth: usize,
}

/// Result of a bounded reachability query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traversal {
    /// Nodes in BFS visit order, starting with the start node.
    pub steps: Vec<Step>,
    /// Edges crossed or seen between visited nodes, in discovery order.
    pub edges: Vec<Edge>,
}

/// Polls the cancel token once per `CANCEL_CHECK_INTERVAL` dequeues.
struct Pacer<'a> {
    cancel: &'a CancelToken,
    dequeued: usize,
}

impl<'a> Pacer<'a> {
    fn new(cancel: &'a CancelToken) -> Self {
        Self {
            cancel,
            dequeued: 0,
        }
    }

    fn tick(&mut self) -> Result<(), GraphError> {
        let due = self.dequeued % CANCEL_CHECK_INTERVAL == 0;
        self.dequeued += 1;
        if due { self.cancel.check() } else { Ok(()) }
    }
}

/// Shortest undirected path from `from` to `to`, both ends included.
///
/// `from == to` yields `[from]`. A missing endpoint or no connection
/// yields `NoPathFound`. Path length is not bounded.
pub fn shortest_path(
    graph: &Graph,
    from: &NodeKey,
    to: &NodeKey,
    cancel: &CancelToken,
) -> Result<Vec<NodeKey>, GraphError> {
    let no_path = || GraphError::NoPathFound {
        from: from.id().to_string(),
        to: to.id().to_string(),
    };
    if !graph.contains_node(from) || !graph.contains_node(to) {
        return Err(no_path());
    }
    if from == to {
        return Ok(vec![from.clone()]);
    }

    let mut parents: BTreeMap<NodeKey, NodeKey> = BTreeMap::new();
    let mut visited: BTreeSet<NodeKey> = BTreeSet::from([from.clone()]);
    let mut queue: VecDeque<NodeKey> = VecDeque::from([from.clone()]);
    let mut pacer = Pacer::new(cancel);

    while let Some(current) = queue.pop_front() {
        pacer.tick()?;
        for incident in graph.incident(&current) {
            let next = &incident.neighbor;
            if !visited.insert(next.clone()) {
                continue;
            }
            parents.insert(next.clone(), current.clone());
            if next == to {
                return Ok(unwind(&parents, from, to));
            }
            queue.push_back(next.clone());
        }
    }

    Err(no_path())
}

fn unwind(parents: &BTreeMap<NodeKey, NodeKey>, from: &NodeKey, to: &NodeKey) -> Vec<NodeKey> {
    let mut path = vec![to.clone()];
    let mut current = to;
    while current != from {
        match parents.get(current) {
            Some(parent) => {
                path.push(parent.clone());
                current = parent;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Nodes within `max_depth` hops of `start` in BFS order.
///
/// Depth is clamped to `MAX_TRAVERSAL_DEPTH`. A missing start node
/// yields `NotFound`.
pub fn reachable(
    graph: &Graph,
    start: &NodeKey,
    max_depth: usize,
    cancel: &CancelToken,
) -> Result<Traversal, GraphError> {
    if !graph.contains_node(start) {
        return Err(GraphError::NotFound(start.id().to_string()));
    }
    let max_depth = max_depth.min(MAX_TRAVERSAL_DEPTH);

    let mut result = Traversal::default();
    let mut visited: BTreeSet<NodeKey> = BTreeSet::from([start.clone()]);
    let mut seen_edges: BTreeSet<u64> = BTreeSet::new();
    let mut queue: VecDeque<(NodeKey, usize)> = VecDeque::from([(start.clone(), 0)]);
    let mut pacer = Pacer::new(cancel);

    while let Some((current, depth)) = queue.pop_front() {
        pacer.tick()?;
        result.steps.push(Step {
            key: current.clone(),
            depth,
        });
        if depth >= max_depth {
            continue;
        }
        for incident in graph.incident(&current) {
            if seen_edges.insert(incident.seq) {
                result.edges.push(incident.edge.clone());
            }
            if visited.insert(incident.neighbor.clone()) {
                queue.push_back((incident.neighbor.clone(), depth + 1));
            }
        }
    }

    Ok(result)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, EdgeKind, TransactionPatch, UserPatch};

    fn user(graph: &mut Graph, id: &str) -> NodeKey {
        graph
            .upsert_user(&UserPatch::new(id).name(id))
            .expect("user")
            .record
            .node
            .key()
    }

    fn link(graph: &mut Graph, a: &NodeKey, b: &NodeKey) {
        graph
            .insert_edge(Edge::new(a.clone(), b.clone(), EdgeKind::SharedAttribute))
            .expect("edge");
    }

    #[test]
    fn path_to_self_is_single_node() {
        let mut graph = Graph::new();
        let a = user(&mut graph, "a");
        let path = shortest_path(&graph, &a, &a, &CancelToken::never()).expect("path");
        assert_eq!(path, vec![a]);
    }

    #[test]
    fn path_follows_edges_in_either_direction() {
        let mut graph = Graph::new();
        let u1 = user(&mut graph, "u1");
        let u2 = user(&mut graph, "u2");
        graph
            .upsert_transaction(
                &TransactionPatch::new("t1", "u1", "u2").amount(Amount::from_minor(100)),
            )
            .expect("txn");

        let path = shortest_path(&graph, &u2, &u1, &CancelToken::never()).expect("path");
        assert_eq!(path, vec![u2, NodeKey::transaction("t1"), u1]);
    }

    #[test]
    fn unreachable_or_missing_is_no_path() {
        let mut graph = Graph::new();
        let a = user(&mut graph, "a");
        let b = user(&mut graph, "b");
        let never = CancelToken::never();
        assert!(matches!(
            shortest_path(&graph, &a, &b, &never),
            Err(GraphError::NoPathFound { .. })
        ));
        assert!(matches!(
            shortest_path(&graph, &a, &NodeKey::user("ghost"), &never),
            Err(GraphError::NoPathFound { .. })
        ));
    }

    #[test]
    fn ties_break_by_edge_insertion_order() {
        let mut graph = Graph::new();
        let [s, x, y, t] = ["s", "x", "y", "t"].map(|id| user(&mut graph, id));
        link(&mut graph, &s, &y);
        link(&mut graph, &s, &x);
        link(&mut graph, &x, &t);
        link(&mut graph, &y, &t);

        let path = shortest_path(&graph, &s, &t, &CancelToken::never()).expect("path");
        assert_eq!(path, vec![s, y, t]);
    }

    #[test]
    fn picks_shorter_route() {
        let mut graph = Graph::new();
        let [a, b, c, d] = ["a", "b", "c", "d"].map(|id| user(&mut graph, id));
        link(&mut graph, &a, &b);
        link(&mut graph, &b, &c);
        link(&mut graph, &c, &d);
        link(&mut graph, &a, &d);

        let path = shortest_path(&graph, &a, &d, &CancelToken::never()).expect("path");
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn cancelled_token_stops_search() {
        let mut graph = Graph::new();
        let a = user(&mut graph, "a");
        let b = user(&mut graph, "b");
        link(&mut graph, &a, &b);
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            shortest_path(&graph, &a, &b, &token),
            Err(GraphError::Cancelled)
        ));
    }

    #[test]
    fn reachable_respects_depth() {
        let mut graph = Graph::new();
        let [a, b, c] = ["a", "b", "c"].map(|id| user(&mut graph, id));
        link(&mut graph, &a, &b);
        link(&mut graph, &b, &c);

        let one = reachable(&graph, &a, 1, &CancelToken::never()).expect("reach");
        let keys: Vec<_> = one.steps.iter().map(|s| s.key.clone()).collect();
        assert_eq!(keys, vec![a.clone(), b.clone()]);
        assert_eq!(one.edges.len(), 1);

        let all = reachable(&graph, &a, 10, &CancelToken::never()).expect("reach");
        assert_eq!(all.steps.len(), 3);
        assert_eq!(all.steps[2].depth, 2);
    }

    #[test]
    fn reachable_missing_start_is_not_found() {
        let graph = Graph::new();
        assert!(matches!(
            reachable(&graph, &NodeKey::user("x"), 3, &CancelToken::never()),
            Err(GraphError::NotFound(_))
        ));
    }
}
