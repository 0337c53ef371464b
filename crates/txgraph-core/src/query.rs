//! # Query Module
//!
//! Structured read queries with an optional timeout.
//!
//! - Every query names nodes by bare id
//! - `timeout_ms` becomes a deadline on the query's `CancelToken`
//! - Executed by `Engine::execute`

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::traversal::Traversal;
use crate::types::NodeKey;
use crate::views::{Neighborhood, NodeView};

/// Query operation types supported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryType {
    /// Fetch a node by id.
    Lookup(String),

    /// Shortest undirected path between two ids.
    ShortestPath { from: String, to: String },

    /// Nodes within `depth` hops of `start`.
    Reachable { start: String, depth: usize },

    /// A node and all of its incident edges.
    Neighborhood(String),
}

/// A structured query with optional timeout.
#[derive(Debug, Clone)]
pub struct Query {
    /// The type of query operation.
    pub query_type: QueryType,
    /// Optional timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Query {
    /// Create a new query with no timeout.
    #[must_use]
    pub fn new(query_type: QueryType) -> Self {
        Self {
            query_type,
            timeout_ms: None,
        }
    }

    /// Create a new query with a timeout.
    #[must_use]
    pub fn with_timeout(query_type: QueryType, timeout_ms: u64) -> Self {
        Self {
            query_type,
            timeout_ms: Some(timeout_ms),
        }
    }

    /// Lookup helper.
    #[must_use]
    pub fn lookup(id: impl Into<String>) -> Self {
        Self::new(QueryType::Lookup(id.into()))
    }

    /// Shortest path helper.
    #[must_use]
    pub fn shortest_path(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(QueryType::ShortestPath {
            from: from.into(),
            to: to.into(),
        })
    }

    /// Reachability helper.
    #[must_use]
    pub fn reachable(start: impl Into<String>, depth: usize) -> Self {
        Self::new(QueryType::Reachable {
            start: start.into(),
            depth,
        })
    }

    /// Neighborhood helper.
    #[must_use]
    pub fn neighborhood(id: impl Into<String>) -> Self {
        Self::new(QueryType::Neighborhood(id.into()))
    }

    /// Child of `parent` carrying this query's deadline.
    #[must_use]
    pub fn cancel_token(&self, parent: &CancelToken) -> CancelToken {
        parent.child(self.timeout_ms.map(Duration::from_millis))
    }
}

/// Result of an executed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Node(NodeView),
    Path(Vec<NodeKey>),
    Reachable(Traversal),
    Neighborhood(Neighborhood),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_creation() {
        let q = Query::lookup("u1");
        assert_eq!(q.query_type, QueryType::Lookup("u1".to_string()));
        assert_eq!(q.timeout_ms, None);
    }

    #[test]
    fn query_with_timeout() {
        let q = Query::with_timeout(
            QueryType::Reachable {
                start: "u1".to_string(),
                depth: 5,
            },
            1000,
        );
        assert_eq!(q.timeout_ms, Some(1000));
    }

    #[test]
    fn zero_timeout_yields_expired_token() {
        let q = Query::with_timeout(QueryType::Lookup("u1".to_string()), 0);
        assert!(q.cancel_token(&CancelToken::new()).is_cancelled());
        assert!(!Query::lookup("u1").cancel_token(&CancelToken::new()).is_cancelled());
    }

    #[test]
    fn query_helpers() {
        assert!(matches!(
            Query::shortest_path("a", "b").query_type,
            QueryType::ShortestPath { .. }
        ));
        assert!(matches!(
            Query::neighborhood("a").query_type,
            QueryType::Neighborhood(_)
        ));
    }
}
