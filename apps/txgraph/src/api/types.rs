//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use txgraph_core::{
    Amount, Edge, EdgeView, GraphError, GraphStats, InferenceStatus, Neighborhood, NodeKey, NodeKind,
    NodeView, Query, QueryType, Relation, Step, TransactionPatch, UpsertOutcome, UserPatch,
};

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Store counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub persistent: bool,
    #[serde(flatten)]
    pub stats: GraphStats,
}

// =============================================================================
// UPSERT REQUESTS
// =============================================================================

/// `POST /users` body. Omitted fields keep their stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRequest {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl From<UserRequest> for UserPatch {
    fn from(request: UserRequest) -> Self {
        Self {
            user_id: request.user_id,
            name: request.name,
            email: request.email,
            phone: request.phone,
            address: request.address,
            payment_method: request.payment_method,
        }
    }
}

/// A JSON number kept as the exact text it was sent as.
///
/// Only number literals are accepted; strings, booleans and containers
/// fail deserialization.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct AmountLiteral(Box<RawValue>);

impl AmountLiteral {
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl<'de> Deserialize<'de> for AmountLiteral {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        if raw.get().starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
            Ok(Self(raw))
        } else {
            Err(de::Error::custom(format!(
                "amount must be a JSON number, got {}",
                raw.get()
            )))
        }
    }
}

/// `POST /transactions` body.
///
/// `amount` is parsed as a decimal from its literal text, never through a
/// float.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub txn_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub amount: Option<AmountLiteral>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

impl TransactionRequest {
    pub fn to_patch(&self) -> Result<TransactionPatch, GraphError> {
        let amount = self
            .amount
            .as_ref()
            .map(|literal| Amount::parse(literal.as_str()))
            .transpose()?;
        Ok(TransactionPatch {
            txn_id: self.txn_id.clone(),
            sender_id: self.sender_id.clone(),
            receiver_id: self.receiver_id.clone(),
            amount,
            device_id: self.device_id.clone(),
            ip_address: self.ip_address.clone(),
        })
    }
}

/// Result of a user or transaction upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertResponse {
    pub success: bool,
    pub message: String,
    pub created: bool,
    pub node: NodeView,
    /// Edges inferred by this write.
    pub inferred: Vec<EdgeView>,
    pub inference: InferenceStatus,
}

impl UpsertResponse {
    #[must_use]
    pub fn from_outcome(outcome: &UpsertOutcome) -> Self {
        let noun = match outcome.node.kind() {
            NodeKind::User => "User",
            NodeKind::Transaction => "Transaction",
        };
        Self {
            success: true,
            message: format!("{} {} added or updated.", noun, outcome.node.id()),
            created: outcome.created,
            node: NodeView::from(&outcome.node),
            inferred: outcome
                .inference
                .edges
                .iter()
                .map(|record| EdgeView::from(&record.edge))
                .collect(),
            inference: outcome.inference.status,
        }
    }
}

// =============================================================================
// READS
// =============================================================================

/// `?limit=` on listing routes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    pub nodes: Vec<NodeView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResponse {
    pub success: bool,
    pub node: NodeView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborhoodResponse {
    pub success: bool,
    pub node: NodeView,
    pub relations: Vec<Relation>,
}

impl From<Neighborhood> for NeighborhoodResponse {
    fn from(around: Neighborhood) -> Self {
        Self {
            success: true,
            node: around.node,
            relations: around.relations,
        }
    }
}

/// `?u1=&u2=` on `/analytics/shortest_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathParams {
    pub u1: String,
    pub u2: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResponse {
    pub success: bool,
    pub path: Vec<String>,
    /// Number of edges on the path.
    pub hops: usize,
}

impl PathResponse {
    #[must_use]
    pub fn new(path: &[NodeKey]) -> Self {
        Self {
            success: true,
            path: ids(path),
            hops: path.len().saturating_sub(1),
        }
    }
}

fn ids(keys: &[NodeKey]) -> Vec<String> {
    keys.iter().map(|key| key.id().to_string()).collect()
}

// =============================================================================
// QUERY REQUEST/RESPONSE
// =============================================================================

/// Query request (tagged union) with an optional timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(flatten)]
    pub query: QueryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryKind {
    Lookup { id: String },
    ShortestPath { from: String, to: String },
    Reachable { start: String, depth: usize },
    Neighborhood { id: String },
}

impl QueryRequest {
    /// Core query; `fallback_ms` applies when the request names no timeout.
    #[must_use]
    pub fn to_query(&self, fallback_ms: Option<u64>) -> Query {
        let query_type = match &self.query {
            QueryKind::Lookup { id } => QueryType::Lookup(id.clone()),
            QueryKind::ShortestPath { from, to } => QueryType::ShortestPath {
                from: from.clone(),
                to: to.clone(),
            },
            QueryKind::Reachable { start, depth } => QueryType::Reachable {
                start: start.clone(),
                depth: *depth,
            },
            QueryKind::Neighborhood { id } => QueryType::Neighborhood(id.clone()),
        };
        match self.timeout_ms.or(fallback_ms) {
            Some(ms) => Query::with_timeout(query_type, ms),
            None => Query::new(query_type),
        }
    }
}

/// A node reached by a `reachable` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepJson {
    pub id: String,
    pub depth: usize,
}

impl From<&Step> for StepJson {
    fn from(step: &Step) -> Self {
        Self {
            id: step.key.id().to_string(),
            depth: step.depth,
        }
    }
}

/// Query response. Only the fields the query kind produces are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            found: false,
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_node(node: NodeView) -> Self {
        Self {
            success: true,
            found: true,
            node: Some(node),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_path(path: &[NodeKey]) -> Self {
        Self {
            success: true,
            found: true,
            path: ids(path),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_steps(steps: &[Step], edges: &[Edge]) -> Self {
        Self {
            success: true,
            found: true,
            steps: steps.iter().map(StepJson::from).collect(),
            edges: edges.iter().map(EdgeView::from).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_neighborhood(around: Neighborhood) -> Self {
        Self {
            success: true,
            found: true,
            node: Some(around.node),
            relations: around.relations,
            ..Self::default()
        }
    }
}

// =============================================================================
// ADMIN / ERRORS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            kind: kind.into(),
        }
    }
}

impl From<&GraphError> for ErrorResponse {
    fn from(err: &GraphError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}
