//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use txgraph::api::{
    ErrorResponse, HealthResponse, QueryKind, QueryRequest, QueryResponse, StatusResponse,
    TransactionRequest, UserRequest, status_for,
};
use txgraph_core::{GraphError, GraphStats, NodeKey, QueryType, UserPatch};

use axum::http::StatusCode;

// =============================================================================
// HEALTH / STATUS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_status_response_flattens_stats() {
    let status = StatusResponse {
        success: true,
        persistent: false,
        stats: GraphStats {
            users: 3,
            transactions: 2,
            edges: 5,
            sent: 2,
            received_by: 2,
            shared_attribute: 1,
            linked: 0,
            epoch: 0,
        },
    };

    let json = serde_json::to_string(&status).unwrap();
    assert!(json.contains("\"users\":3"));
    assert!(json.contains("\"shared_attribute\":1"));
    assert!(!json.contains("\"stats\""));
}

// =============================================================================
// USER REQUEST
// =============================================================================

#[test]
fn test_user_request_minimal() {
    let request: UserRequest = serde_json::from_str(r#"{"user_id":"u1"}"#).unwrap();
    let patch = UserPatch::from(request);
    assert_eq!(patch, UserPatch::new("u1"));
}

#[test]
fn test_user_request_full() {
    let request: UserRequest = serde_json::from_str(
        r#"{"user_id":"u1","name":"Alice","email":"a@x.io","phone":"1",
            "address":"123 Main St","payment_method":"visa"}"#,
    )
    .unwrap();
    let patch = UserPatch::from(request);
    assert_eq!(patch.name.as_deref(), Some("Alice"));
    assert_eq!(patch.address.as_deref(), Some("123 Main St"));
    assert_eq!(patch.payment_method.as_deref(), Some("visa"));
}

#[test]
fn test_user_request_requires_id() {
    assert!(serde_json::from_str::<UserRequest>(r#"{"name":"Alice"}"#).is_err());
}

// =============================================================================
// TRANSACTION REQUEST
// =============================================================================

fn txn_json(amount: &str) -> TransactionRequest {
    serde_json::from_str(&format!(
        r#"{{"txn_id":"t1","sender_id":"u1","receiver_id":"u2","amount":{}}}"#,
        amount
    ))
    .unwrap()
}

#[test]
fn test_transaction_amount_is_exact() {
    let cases = [("12.5", 1250), ("4999.99", 499_999), ("100", 10_000), ("0", 0)];
    for (literal, cents) in cases {
        let patch = txn_json(literal).to_patch().unwrap();
        assert_eq!(patch.amount.unwrap().minor_units(), cents, "amount {}", literal);
    }
}

#[test]
fn test_transaction_amount_keeps_literal_precision() {
    let patch = txn_json("90071992547409.93").to_patch().unwrap();
    assert_eq!(patch.amount.unwrap().minor_units(), 9_007_199_254_740_993);

    let patch = txn_json("12.50").to_patch().unwrap();
    assert_eq!(patch.amount.unwrap().minor_units(), 1250);
}

#[test]
fn test_transaction_amount_rejects_bad_values() {
    for literal in ["-1", "0.001", "12.345", "1e2", "1E+2", "0.1000000000000000055"] {
        assert!(
            matches!(txn_json(literal).to_patch(), Err(GraphError::Validation(_))),
            "amount {} should be rejected",
            literal
        );
    }
}

#[test]
fn test_transaction_amount_optional() {
    let request: TransactionRequest =
        serde_json::from_str(r#"{"txn_id":"t1","sender_id":"u1","receiver_id":"u2","device_id":"d1"}"#)
            .unwrap();
    let patch = request.to_patch().unwrap();
    assert!(patch.amount.is_none());
    assert_eq!(patch.device_id.as_deref(), Some("d1"));
}

#[test]
fn test_transaction_amount_as_string_is_rejected() {
    let parsed = serde_json::from_str::<TransactionRequest>(
        r#"{"txn_id":"t1","sender_id":"u1","receiver_id":"u2","amount":"12.50"}"#,
    );
    assert!(parsed.is_err());

    for literal in ["true", "[1]", r#"{"v":1}"#] {
        let body = format!(
            r#"{{"txn_id":"t1","sender_id":"u1","receiver_id":"u2","amount":{}}}"#,
            literal
        );
        assert!(serde_json::from_str::<TransactionRequest>(&body).is_err(), "{}", literal);
    }
}

// =============================================================================
// QUERY REQUEST/RESPONSE
// =============================================================================

#[test]
fn test_query_request_variants() {
    let lookup: QueryRequest = serde_json::from_str(r#"{"type":"lookup","id":"u1"}"#).unwrap();
    assert!(matches!(lookup.query, QueryKind::Lookup { ref id } if id == "u1"));
    assert!(lookup.timeout_ms.is_none());

    let path: QueryRequest =
        serde_json::from_str(r#"{"type":"shortest_path","from":"a","to":"b","timeout_ms":50}"#)
            .unwrap();
    assert_eq!(path.timeout_ms, Some(50));
    let query = path.to_query(None);
    assert_eq!(
        query.query_type,
        QueryType::ShortestPath {
            from: "a".to_string(),
            to: "b".to_string()
        }
    );
    assert_eq!(query.timeout_ms, Some(50));

    let reach: QueryRequest =
        serde_json::from_str(r#"{"type":"reachable","start":"a","depth":3}"#).unwrap();
    assert!(matches!(reach.query, QueryKind::Reachable { depth: 3, .. }));

    let around: QueryRequest =
        serde_json::from_str(r#"{"type":"neighborhood","id":"t1"}"#).unwrap();
    assert!(matches!(around.query, QueryKind::Neighborhood { .. }));
}

#[test]
fn test_query_fallback_timeout() {
    let request: QueryRequest = serde_json::from_str(r#"{"type":"lookup","id":"u1"}"#).unwrap();
    assert_eq!(request.to_query(Some(250)).timeout_ms, Some(250));
    assert_eq!(request.to_query(None).timeout_ms, None);
}

#[test]
fn test_query_request_unknown_type() {
    assert!(serde_json::from_str::<QueryRequest>(r#"{"type":"intersect","nodes":[]}"#).is_err());
}

#[test]
fn test_query_response_omits_empty_fields() {
    let json = serde_json::to_string(&QueryResponse::with_path(&[
        NodeKey::user("a"),
        NodeKey::transaction("t"),
    ]))
    .unwrap();
    assert!(json.contains("\"path\":[\"a\",\"t\"]"));
    assert!(!json.contains("\"steps\""));
    assert!(!json.contains("\"node\""));

    let missing = QueryResponse::not_found("no such node");
    assert!(missing.success);
    assert!(!missing.found);
}

// =============================================================================
// ERRORS
// =============================================================================

#[test]
fn test_error_status_mapping() {
    let cases = [
        (GraphError::Validation("x".into()), StatusCode::BAD_REQUEST),
        (
            GraphError::ReferenceNotFound(NodeKey::user("u")),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (GraphError::NotFound("u".into()), StatusCode::NOT_FOUND),
        (
            GraphError::NoPathFound {
                from: "a".into(),
                to: "b".into(),
            },
            StatusCode::NOT_FOUND,
        ),
        (GraphError::Cancelled, StatusCode::GATEWAY_TIMEOUT),
        (
            GraphError::StorageUnavailable("down".into()),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            GraphError::Serialization("bad".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];
    for (err, status) in cases {
        assert_eq!(status_for(&err), status, "{}", err.kind());
    }
}

#[test]
fn test_error_response_body() {
    let body = ErrorResponse::from(&GraphError::NotFound("u9".into()));
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["kind"], "not_found");
    assert!(json["error"].as_str().unwrap().contains("u9"));
}
