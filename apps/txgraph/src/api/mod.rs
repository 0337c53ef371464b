//! # txgraph HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Store counters
//! - `POST /users`, `POST /transactions` - Upsert a node
//! - `GET /users`, `GET /transactions` - List nodes (`?limit=`)
//! - `GET /users/{id}`, `GET /transactions/{id}` - Fetch a node
//! - `GET /relationships/user/{id}`, `GET /relationships/transaction/{id}` - Neighborhood
//! - `GET /graph` - Full snapshot
//! - `GET /analytics/shortest_path?u1=&u2=` - Shortest path
//! - `POST /query` - Structured query
//! - `POST /admin/reset` - Drop everything
//!
//! ## Configuration (`[http]` section)
//!
//! - `cors_origins`: comma-separated origins, or "*" for all (default: localhost only)
//! - `rate_limit`: requests per second (default: 100, 0 to disable)

mod handlers;
mod middleware;
mod types;

pub use handlers::{ApiError, status_for};
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    AmountLiteral, ErrorResponse, HealthResponse, ListParams, ListResponse, NeighborhoodResponse, NodeResponse,
    PathParams, PathResponse, QueryKind, QueryRequest, QueryResponse, ResetResponse, StatusResponse,
    StepJson, TransactionRequest, UpsertResponse, UserRequest,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use txgraph_core::{Engine, GraphError};

use crate::config::{AppConfig, HttpConfig};

/// Request bodies above this size are rejected.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub http: HttpConfig,
    /// Deadline for queries that do not name their own.
    pub query_timeout_ms: Option<u64>,
}

impl AppState {
    /// State with default HTTP settings.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self::shared(Arc::new(engine), &AppConfig::default())
    }

    #[must_use]
    pub fn shared(engine: Arc<Engine>, config: &AppConfig) -> Self {
        Self {
            engine,
            http: config.http.clone(),
            query_timeout_ms: config.engine.query_timeout_ms,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// CORS layer from `[http] cors_origins`.
///
/// - `*`: all origins
/// - unset: localhost only
/// - otherwise: the comma-separated list
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => build_localhost_cors(),
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();
    restricted_cors(origins)
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - 2 MiB
/// 4. Rate limiting - global quota (if enabled)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(state.http.cors_origins.as_deref());
    let rate_limiter = create_rate_limiter(state.http.rate_limit);
    match &rate_limiter {
        Some(_) => tracing::info!(
            "Rate limiting enabled: {} requests/second",
            state.http.rate_limit
        ),
        None => tracing::info!("Rate limiting disabled"),
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/users",
            get(handlers::list_users_handler).post(handlers::upsert_user_handler),
        )
        .route(
            "/transactions",
            get(handlers::list_transactions_handler).post(handlers::upsert_transaction_handler),
        )
        .route("/users/{id}", get(handlers::get_user_handler))
        .route("/transactions/{id}", get(handlers::get_transaction_handler))
        .route(
            "/relationships/user/{id}",
            get(handlers::user_relationships_handler),
        )
        .route(
            "/relationships/transaction/{id}",
            get(handlers::transaction_relationships_handler),
        )
        .route("/graph", get(handlers::graph_handler))
        .route(
            "/analytics/shortest_path",
            get(handlers::shortest_path_handler),
        )
        .route("/query", post(handlers::query_handler))
        .route("/admin/reset", post(handlers::reset_handler));

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve until `shutdown` resolves, then stop the engine.
pub async fn run_server<F>(addr: &str, state: AppState, shutdown: F) -> Result<(), GraphError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GraphError::StorageUnavailable(format!("bind {} failed: {}", addr, e)))?;

    tracing::info!("txgraph HTTP server listening on {}", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GraphError::StorageUnavailable(format!("server error: {}", e)));
    engine.shutdown();
    served
}
