//! End-to-end tests for the control endpoint: JSON-RPC dispatch through the
//! full audit / auth / rate-limit pipeline.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use vector_migrate::server::tools::register_builtin_tools;
use vector_migrate::server::{AuditSink, ControlServer, MemorySink};
use vector_migrate::{ServerConfig, SqliteTracker, StateTracker, ToolRegistry};

const API_KEY: &str = "secret-key-1234";

struct TestServer {
    router: Router,
    audit: Arc<MemorySink>,
    tracker: Arc<dyn StateTracker>,
}

async fn test_server(requests_per_minute: u32, burst: u32) -> TestServer {
    let tracker: Arc<dyn StateTracker> =
        Arc::new(SqliteTracker::connect(":memory:").await.unwrap());

    let registry = Arc::new(ToolRegistry::new());
    register_builtin_tools(&registry, Arc::clone(&tracker)).unwrap();

    let audit = Arc::new(MemorySink::new());
    let server = ControlServer::new(
        ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            api_key: API_KEY.to_string(),
            requests_per_minute,
            burst,
            db_path: ":memory:".to_string(),
        },
        registry,
    )
    .with_audit_sink(Arc::clone(&audit) as Arc<dyn AuditSink>);

    TestServer {
        router: server.router(),
        audit,
        tracker,
    }
}

async fn post_rpc(router: &Router, auth: Option<&str>, body: &str) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        request = request.header(header::AUTHORIZATION, auth);
    }

    let response = router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn post_rpc_json(router: &Router, auth: Option<&str>, body: &str) -> (StatusCode, Value) {
    let (status, bytes) = post_rpc(router, auth, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn bearer() -> String {
    format!("Bearer {}", API_KEY)
}

fn call(method: &str, params: Value) -> String {
    json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}).to_string()
}

#[tokio::test]
async fn test_healthz_bypasses_authentication() {
    let server = test_server(100, 20).await;

    let response = server
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_healthz_emits_no_quota_charge() {
    // Burst of 2, but health checks never consume tokens.
    let server = test_server(60, 2).await;

    for _ in 0..10 {
        let response = server
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The authenticated budget is untouched.
    let (status, _) = post_rpc_json(
        &server.router,
        Some(&bearer()),
        &call("migration_status", json!({"migration_id": "m"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_authorization() {
    let server = test_server(100, 20).await;

    let (status, body) = post_rpc_json(
        &server.router,
        None,
        &call("migration_status", json!({"migration_id": "m"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(body["error"]["message"], "missing authorization");
}

#[tokio::test]
async fn test_invalid_api_key_body_is_byte_stable() {
    let server = test_server(100, 20).await;

    let (status, bytes) = post_rpc(
        &server.router,
        Some("Bearer wrong-key"),
        r#"{"jsonrpc":"2.0","id":1,"method":"migration_status","params":{}}"#,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32001,"message":"invalid api key"}}"#
    );
}

#[tokio::test]
async fn test_raw_key_format_accepted() {
    let server = test_server(100, 20).await;

    let (status, body) = post_rpc_json(
        &server.router,
        Some(API_KEY),
        &call("migration_status", json!({"migration_id": "m"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["migration_id"], "m");
}

#[tokio::test]
async fn test_status_of_unknown_migration() {
    let server = test_server(100, 20).await;

    let (status, body) = post_rpc_json(
        &server.router,
        Some(&bearer()),
        &call("migration_status", json!({"migration_id": "mig-123"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let result = &body["result"];
    assert_eq!(result["migration_id"], "mig-123");
    assert_eq!(result["status"], "not_started");
    assert_eq!(result["progress"]["total_records"], 0);
    assert_eq!(result["progress"]["percentage"], 0.0);
}

#[tokio::test]
async fn test_list_migrations_empty_store_pagination() {
    let server = test_server(100, 20).await;

    let (status, body) = post_rpc_json(
        &server.router,
        Some(&bearer()),
        &call("list_migrations", json!({"limit": 5, "offset": 10})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let result = &body["result"];
    assert_eq!(result["total"], 0);
    assert_eq!(result["limit"], 5);
    assert_eq!(result["offset"], 10);
    assert_eq!(result["migrations"], json!([]));
}

#[tokio::test]
async fn test_list_migrations_reflects_store_contents() {
    let server = test_server(100, 20).await;
    server
        .tracker
        .set_state("mig-x", vector_migrate::MigrationStatus::Completed)
        .await
        .unwrap();

    let (status, body) = post_rpc_json(
        &server.router,
        Some(&bearer()),
        &call("list_migrations", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["total"], 1);
    assert_eq!(body["result"]["migrations"][0]["migration_id"], "mig-x");
    assert_eq!(body["result"]["migrations"][0]["status"], "completed");
}

#[tokio::test]
async fn test_schema_recommendation_requires_distinct_stores() {
    let server = test_server(100, 20).await;

    let (status, body) = post_rpc_json(
        &server.router,
        Some(&bearer()),
        &call(
            "schema_recommendation",
            json!({"source_type": "pinecone", "target_type": "pinecone"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32603);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("must be different"));
}

#[tokio::test]
async fn test_schema_recommendation_between_declared_stores() {
    let server = test_server(100, 20).await;

    let (status, body) = post_rpc_json(
        &server.router,
        Some(&bearer()),
        &call(
            "schema_recommendation",
            json!({"source_type": "pinecone", "target_type": "qdrant"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let result = &body["result"];
    assert_eq!(result["source_type"], "pinecone");
    assert_eq!(result["target_type"], "qdrant");
    assert!(!result["field_mappings"].as_array().unwrap().is_empty());
    let confidence = result["overall_confidence"].as_f64().unwrap();
    assert!(confidence > 0.0 && confidence <= 1.0);
    assert!(!result["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_method() {
    let server = test_server(100, 20).await;

    let (status, body) = post_rpc_json(
        &server.router,
        Some(&bearer()),
        &call("no_such_tool", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(body["error"]["message"], "method not found");
    assert_eq!(body["id"], 1);
}

#[tokio::test]
async fn test_parse_error() {
    let server = test_server(100, 20).await;

    let (status, body) =
        post_rpc_json(&server.router, Some(&bearer()), "{not valid json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_wrong_jsonrpc_version() {
    let server = test_server(100, 20).await;

    let (status, body) = post_rpc_json(
        &server.router,
        Some(&bearer()),
        r#"{"jsonrpc":"1.0","id":3,"method":"migration_status"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 3);
}

#[tokio::test]
async fn test_wrong_http_verb() {
    let server = test_server(100, 20).await;

    let response = server
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .header(header::AUTHORIZATION, bearer())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], -32600);
}

#[tokio::test]
async fn test_rate_limit_exceeded_after_burst() {
    let server = test_server(60, 2).await;
    let body = call("migration_status", json!({"migration_id": "m"}));

    for _ in 0..2 {
        let (status, _) = post_rpc_json(&server.router, Some(&bearer()), &body).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, reply) = post_rpc_json(&server.router, Some(&bearer()), &body).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(reply["error"]["code"], -32002);
    assert_eq!(reply["error"]["message"], "rate limit exceeded");
}

#[tokio::test]
async fn test_audit_masks_credential() {
    let server = test_server(100, 20).await;

    let (status, _) = post_rpc_json(
        &server.router,
        Some(&bearer()),
        &call("migration_status", json!({"migration_id": "m"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let entries = server.audit.entries();
    assert!(entries.len() >= 2);
    assert_eq!(entries[0].event_type, "request");
    assert_eq!(entries[1].event_type, "response");
    assert_eq!(entries[1].status_code, Some(200));
    assert_eq!(entries[1].tool_name.as_deref(), Some("migration_status"));

    for entry in &entries {
        let line = serde_json::to_string(entry).unwrap();
        assert!(!line.contains(API_KEY), "audit leaked the credential");
        assert!(line.contains("****1234"), "audit lost the masked form");
    }
}

#[tokio::test]
async fn test_audit_records_rejections() {
    let server = test_server(100, 20).await;

    post_rpc(
        &server.router,
        Some("Bearer wrong-key"),
        &call("migration_status", json!({})),
    )
    .await;

    let entries = server.audit.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].status_code, Some(403));
}

#[tokio::test]
async fn test_tool_validation_error_is_internal_error() {
    let server = test_server(100, 20).await;

    // migration_id missing entirely.
    let (status, body) = post_rpc_json(
        &server.router,
        Some(&bearer()),
        &call("migration_status", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32603);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("migration_id is required"));
}
