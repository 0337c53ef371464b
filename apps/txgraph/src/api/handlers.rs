//! # API Endpoint Handlers
//!
//! Engine writes and path searches run on the blocking pool; they may
//! wait on redb commits or walk large parts of the graph.

use super::{
    AppState,
    types::{
        ErrorResponse, HealthResponse, ListParams, ListResponse, NeighborhoodResponse,
        NodeResponse, PathParams, PathResponse, QueryKind, QueryRequest, QueryResponse,
        ResetResponse, StatusResponse, TransactionRequest, UpsertResponse, UserRequest,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use txgraph_core::{
    Engine, GraphError, NodeKind, NodeView, QueryOutcome, UserPatch, primitives::MAX_TRAVERSAL_DEPTH,
};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// A `GraphError` rendered as `{success:false, error, kind}`.
#[derive(Debug)]
pub struct ApiError(pub GraphError);

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        Self(err)
    }
}

/// HTTP status for each error kind.
#[must_use]
pub fn status_for(err: &GraphError) -> StatusCode {
    match err {
        GraphError::Validation(_) => StatusCode::BAD_REQUEST,
        GraphError::ReferenceNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GraphError::NotFound(_) | GraphError::NoPathFound { .. } => StatusCode::NOT_FOUND,
        GraphError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        GraphError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        GraphError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::warn!(kind = self.0.kind(), "Request failed: {}", self.0);
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<T>), ApiError>;

/// Run `op` against the engine on the blocking pool.
async fn blocking<T, F>(state: &AppState, op: F) -> Result<T, GraphError>
where
    F: FnOnce(&Engine) -> Result<T, GraphError> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    tokio::task::spawn_blocking(move || op(&engine))
        .await
        .map_err(|e| GraphError::StorageUnavailable(format!("engine task failed: {}", e)))?
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Store counters.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = StatusResponse {
        success: true,
        persistent: state.engine.is_persistent(),
        stats: state.engine.stats(),
    };
    (StatusCode::OK, Json(response))
}

// =============================================================================
// UPSERTS
// =============================================================================

/// `POST /users`
pub async fn upsert_user_handler(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> ApiResult<UpsertResponse> {
    let patch = UserPatch::from(request);
    let outcome = blocking(&state, move |engine| engine.upsert_user(patch)).await?;
    Ok((StatusCode::OK, Json(UpsertResponse::from_outcome(&outcome))))
}

/// `POST /transactions`
pub async fn upsert_transaction_handler(
    State(state): State<AppState>,
    Json(request): Json<TransactionRequest>,
) -> ApiResult<UpsertResponse> {
    let patch = request.to_patch()?;
    let outcome = blocking(&state, move |engine| engine.upsert_transaction(patch)).await?;
    Ok((StatusCode::OK, Json(UpsertResponse::from_outcome(&outcome))))
}

// =============================================================================
// READS
// =============================================================================

fn list(state: &AppState, kind: NodeKind, params: ListParams) -> (StatusCode, Json<ListResponse>) {
    let nodes: Vec<NodeView> = state
        .engine
        .list_nodes(kind, params.limit)
        .iter()
        .map(NodeView::from)
        .collect();
    (
        StatusCode::OK,
        Json(ListResponse {
            success: true,
            count: nodes.len(),
            nodes,
        }),
    )
}

/// `GET /users?limit=`
pub async fn list_users_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    list(&state, NodeKind::User, params)
}

/// `GET /transactions?limit=`
pub async fn list_transactions_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    list(&state, NodeKind::Transaction, params)
}

fn node(state: &AppState, kind: NodeKind, id: &str) -> ApiResult<NodeResponse> {
    let node = state.engine.get_node(kind, id)?;
    Ok((
        StatusCode::OK,
        Json(NodeResponse {
            success: true,
            node: NodeView::from(&node),
        }),
    ))
}

/// `GET /users/{id}`
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<NodeResponse> {
    node(&state, NodeKind::User, &id)
}

/// `GET /transactions/{id}`
pub async fn get_transaction_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<NodeResponse> {
    node(&state, NodeKind::Transaction, &id)
}

fn relationships(state: &AppState, kind: NodeKind, id: &str) -> ApiResult<NeighborhoodResponse> {
    // The id must name a node of the routed kind.
    state.engine.get_node(kind, id)?;
    let around = state.engine.neighborhood(id)?;
    Ok((StatusCode::OK, Json(NeighborhoodResponse::from(around))))
}

/// `GET /relationships/user/{id}`
pub async fn user_relationships_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<NeighborhoodResponse> {
    relationships(&state, NodeKind::User, &id)
}

/// `GET /relationships/transaction/{id}`
pub async fn transaction_relationships_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<NeighborhoodResponse> {
    relationships(&state, NodeKind::Transaction, &id)
}

/// `GET /graph`
pub async fn graph_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.engine.snapshot()))
}

/// `GET /analytics/shortest_path?u1=&u2=`
pub async fn shortest_path_handler(
    State(state): State<AppState>,
    Query(params): Query<PathParams>,
) -> ApiResult<PathResponse> {
    let request = QueryRequest {
        query: QueryKind::ShortestPath {
            from: params.u1,
            to: params.u2,
        },
        timeout_ms: None,
    };
    let query = request.to_query(state.query_timeout_ms);
    match blocking(&state, move |engine| engine.execute(&query)).await? {
        QueryOutcome::Path(path) => Ok((StatusCode::OK, Json(PathResponse::new(&path)))),
        _ => Err(GraphError::Serialization("unexpected query outcome".to_string()).into()),
    }
}

// =============================================================================
// QUERY HANDLER
// =============================================================================

/// Execute a structured query. Missing nodes and paths answer
/// `found: false` instead of 404.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<QueryResponse> {
    if let QueryKind::Reachable { depth, .. } = &request.query {
        validate_depth(*depth)?;
    }
    let query = request.to_query(state.query_timeout_ms);
    match blocking(&state, move |engine| engine.execute(&query)).await {
        Ok(outcome) => Ok((StatusCode::OK, Json(response_for(outcome)))),
        Err(err @ (GraphError::NotFound(_) | GraphError::NoPathFound { .. })) => {
            Ok((StatusCode::OK, Json(QueryResponse::not_found(err.to_string()))))
        }
        Err(err) => Err(err.into()),
    }
}

/// Validate that depth is within bounds to prevent DoS.
fn validate_depth(depth: usize) -> Result<(), GraphError> {
    if depth > MAX_TRAVERSAL_DEPTH {
        return Err(GraphError::Validation(format!(
            "depth {} exceeds maximum {}",
            depth, MAX_TRAVERSAL_DEPTH
        )));
    }
    Ok(())
}

fn response_for(outcome: QueryOutcome) -> QueryResponse {
    match outcome {
        QueryOutcome::Node(node) => QueryResponse::with_node(node),
        QueryOutcome::Path(path) => QueryResponse::with_path(&path),
        QueryOutcome::Reachable(traversal) => {
            QueryResponse::with_steps(&traversal.steps, &traversal.edges)
        }
        QueryOutcome::Neighborhood(around) => QueryResponse::with_neighborhood(around),
    }
}

// =============================================================================
// ADMIN
// =============================================================================

/// `POST /admin/reset`
pub async fn reset_handler(State(state): State<AppState>) -> ApiResult<ResetResponse> {
    blocking(&state, |engine| engine.reset()).await?;
    Ok((
        StatusCode::OK,
        Json(ResetResponse {
            success: true,
            message: "Store reset.".to_string(),
        }),
    ))
}
