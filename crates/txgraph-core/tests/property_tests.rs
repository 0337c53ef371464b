//! # Property-Based Tests
//!
//! Invariants of upsert, inference and traversal over generated inputs.

use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use txgraph_core::{
    CancelToken, Edge, EdgeKind, Engine, EngineConfig, Graph, InferenceStrategy, NodeKey,
    UserPatch,
};

/// Email and phone drawn from small pools so that collisions are common.
#[derive(Debug, Clone)]
struct Profile {
    email: Option<u8>,
    phone: Option<u8>,
}

fn profile() -> impl Strategy<Value = Profile> {
    (prop::option::of(0u8..3), prop::option::of(0u8..3))
        .prop_map(|(email, phone)| Profile { email, phone })
}

fn patch(index: usize, profile: &Profile) -> UserPatch {
    let mut patch = UserPatch::new(format!("u{}", index)).name(format!("User {}", index));
    if let Some(email) = profile.email {
        patch = patch.email(format!("e{}@x.io", email));
    }
    if let Some(phone) = profile.phone {
        patch = patch.phone(format!("555-{}", phone));
    }
    patch
}

fn profiles_with_order() -> impl Strategy<Value = (Vec<Profile>, Vec<usize>)> {
    vec(profile(), 2..10).prop_flat_map(|profiles| {
        let order: Vec<usize> = (0..profiles.len()).collect();
        (Just(profiles), Just(order).prop_shuffle())
    })
}

/// Unordered id pairs joined by a `SHARED_ATTRIBUTE` edge.
fn shared_pairs(engine: &Engine) -> BTreeSet<(String, String)> {
    engine
        .snapshot()
        .edges
        .into_iter()
        .filter(|e| e.kind == EdgeKind::SharedAttribute)
        .map(|e| {
            if e.source <= e.target {
                (e.source, e.target)
            } else {
                (e.target, e.source)
            }
        })
        .collect()
}

fn expected_pairs(profiles: &[Profile]) -> BTreeSet<(String, String)> {
    let mut pairs = BTreeSet::new();
    for (i, a) in profiles.iter().enumerate() {
        for (j, b) in profiles.iter().enumerate().skip(i + 1) {
            let email = a.email.is_some() && a.email == b.email;
            let phone = a.phone.is_some() && a.phone == b.phone;
            if email || phone {
                let (x, y) = (format!("u{}", i), format!("u{}", j));
                pairs.insert(if x <= y { (x, y) } else { (y, x) });
            }
        }
    }
    pairs
}

/// Hop distances from `start` computed straight from the edge list.
fn bfs_distances(graph: &Graph, start: &NodeKey) -> BTreeMap<NodeKey, usize> {
    let mut adjacency: BTreeMap<NodeKey, Vec<NodeKey>> = BTreeMap::new();
    for edge in graph.edges() {
        adjacency
            .entry(edge.source.clone())
            .or_default()
            .push(edge.target.clone());
        adjacency
            .entry(edge.target.clone())
            .or_default()
            .push(edge.source.clone());
    }
    let mut dist = BTreeMap::from([(start.clone(), 0usize)]);
    let mut queue = VecDeque::from([start.clone()]);
    while let Some(current) = queue.pop_front() {
        let d = dist[&current];
        for next in adjacency.get(&current).into_iter().flatten() {
            if !dist.contains_key(next) {
                dist.insert(next.clone(), d + 1);
                queue.push_back(next.clone());
            }
        }
    }
    dist
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// The inferred edge set depends only on the data, never on write order.
    #[test]
    fn inference_is_order_independent((profiles, order) in profiles_with_order()) {
        let engine = Engine::new();
        for &i in &order {
            engine.upsert_user(patch(i, &profiles[i])).expect("upsert");
        }
        prop_assert_eq!(shared_pairs(&engine), expected_pairs(&profiles));
    }

    /// Replaying every upsert changes nothing.
    #[test]
    fn replayed_upserts_are_idempotent(profiles in vec(profile(), 1..8)) {
        let engine = Engine::new();
        for (i, p) in profiles.iter().enumerate() {
            engine.upsert_user(patch(i, p)).expect("upsert");
        }
        let before = engine.snapshot();
        for (i, p) in profiles.iter().enumerate() {
            let outcome = engine.upsert_user(patch(i, p)).expect("replay");
            prop_assert!(!outcome.created);
            prop_assert!(outcome.inference.edges.is_empty());
        }
        prop_assert_eq!(engine.snapshot(), before);
    }

    /// No edge ever joins a node to itself.
    #[test]
    fn no_self_loops((profiles, order) in profiles_with_order()) {
        let engine = Engine::new();
        for &i in order.iter().chain(order.iter()) {
            engine.upsert_user(patch(i, &profiles[i])).expect("upsert");
        }
        for edge in engine.snapshot().edges {
            prop_assert_ne!(edge.source, edge.target);
        }
    }

    /// Indexed and full-scan inference produce the same edges.
    #[test]
    fn strategies_agree((profiles, order) in profiles_with_order()) {
        let run = |strategy| {
            let engine = Engine::with_config(EngineConfig {
                inference: strategy,
                ..EngineConfig::default()
            });
            for &i in &order {
                engine.upsert_user(patch(i, &profiles[i])).expect("upsert");
            }
            shared_pairs(&engine)
        };
        prop_assert_eq!(run(InferenceStrategy::Indexed), run(InferenceStrategy::FullScan));
    }

    /// BFS paths are as short as an independent BFS says and walk real edges.
    #[test]
    fn shortest_path_is_minimal(
        size in 2usize..12,
        links in vec((0usize..12, 0usize..12), 0..30),
    ) {
        let mut graph = Graph::new();
        let keys: Vec<NodeKey> = (0..size)
            .map(|i| {
                graph
                    .upsert_user(&UserPatch::new(format!("n{}", i)).name("n"))
                    .expect("user")
                    .record
                    .node
                    .key()
            })
            .collect();
        for (a, b) in links {
            let (a, b) = (a % size, b % size);
            if a != b {
                graph
                    .insert_edge(Edge::new(keys[a].clone(), keys[b].clone(), EdgeKind::SharedAttribute))
                    .expect("edge");
            }
        }

        let start = &keys[0];
        let dist = bfs_distances(&graph, start);
        for target in &keys {
            let found = txgraph_core::traversal::shortest_path(&graph, start, target, &CancelToken::never());
            match dist.get(target) {
                Some(&d) => {
                    let path = found.expect("reachable target has a path");
                    prop_assert_eq!(path.len(), d + 1);
                    prop_assert_eq!(path.first(), Some(start));
                    prop_assert_eq!(path.last(), Some(target));
                    for pair in path.windows(2) {
                        let joined = graph
                            .incident(&pair[0])
                            .iter()
                            .any(|incident| incident.neighbor == pair[1]);
                        prop_assert!(joined);
                    }
                }
                None => prop_assert!(found.is_err()),
            }
        }
    }
}
