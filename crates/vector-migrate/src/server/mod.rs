//! JSON-RPC control endpoint.
//!
//! A single POST path accepts JSON-RPC 2.0 requests and dispatches them to
//! registered tools. Every call flows through the request pipeline, layered
//! outermost-first: audit, then authentication, then rate limiting, then
//! dispatch. Audit being outermost means auth and quota rejections are still
//! logged with their status code. Authentication runs before rate limiting
//! so buckets key on the real principal; `GET /healthz` bypasses both.

pub mod audit;
pub mod auth;
pub mod ratelimit;
pub mod registry;
pub mod tools;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::Result;

pub use audit::{mask_secret, AuditEntry, AuditSink, MemorySink, TracingSink};
pub use auth::Principal;
pub use ratelimit::KeyedRateLimiter;
pub use registry::{Tool, ToolContext, ToolHandler, ToolInfo, ToolRegistry};

use audit::ToolName;
use types::{
    RpcFailure, RpcRequest, RpcSuccess, INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR,
};

/// Health-check path. Served without authentication or quota charge.
pub const HEALTH_PATH: &str = "/healthz";

/// Request body cap for the control endpoint.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// How often idle rate-limit buckets are swept.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Buckets idle longer than this are evicted.
const LIMITER_IDLE_EVICTION: Duration = Duration::from_secs(300);

/// Shared state behind the router.
pub struct ServerState {
    pub registry: Arc<ToolRegistry>,
    pub api_key: String,
    pub limiter: KeyedRateLimiter,
    pub audit: Arc<dyn AuditSink>,
}

/// The control endpoint server.
pub struct ControlServer {
    config: ServerConfig,
    state: Arc<ServerState>,
}

impl ControlServer {
    /// Create a server over a tool registry. Audit entries go to the
    /// `tracing` sink unless overridden with [`with_audit_sink`].
    ///
    /// [`with_audit_sink`]: ControlServer::with_audit_sink
    pub fn new(config: ServerConfig, registry: Arc<ToolRegistry>) -> Self {
        let state = Arc::new(ServerState {
            registry,
            api_key: config.api_key.clone(),
            limiter: KeyedRateLimiter::new(config.requests_per_minute, config.burst),
            audit: Arc::new(TracingSink),
        });
        Self { config, state }
    }

    /// Replace the audit sink.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        let state = Arc::new(ServerState {
            registry: Arc::clone(&self.state.registry),
            api_key: self.state.api_key.clone(),
            limiter: KeyedRateLimiter::new(
                self.config.requests_per_minute,
                self.config.burst,
            ),
            audit: sink,
        });
        self.state = state;
        self
    }

    /// Build the router with the full middleware pipeline.
    pub fn router(&self) -> Router {
        let state = Arc::clone(&self.state);

        // Layers run top-down per added order reversed: the last layer added
        // is outermost. Execution order: audit -> auth -> rate limit.
        Router::new()
            .route("/", any(handle_rpc))
            .route(HEALTH_PATH, get(healthz))
            .layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                ratelimit::ratelimit_layer,
            ))
            .layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                auth::auth_layer,
            ))
            .layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                audit::audit_layer,
            ))
            .with_state(state)
    }

    /// Serve until the cancellation token fires.
    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.config.addr).await?;
        info!("control endpoint listening on {}", self.config.addr);
        info!("  authentication enabled");
        info!(
            "  rate limiting: {} req/min, burst {}",
            self.config.requests_per_minute, self.config.burst
        );
        info!("  audit logging enabled");

        // Periodic eviction of idle rate-limit buckets.
        let cleanup_state = Arc::clone(&self.state);
        let cleanup_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
            loop {
                tokio::select! {
                    _ = cleanup_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = cleanup_state.limiter.cleanup(LIMITER_IDLE_EVICTION);
                        if evicted > 0 {
                            info!("evicted {} idle rate-limit buckets", evicted);
                        }
                    }
                }
            }
        });

        let router = self.router();
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

        info!("control endpoint stopped");
        Ok(())
    }
}

/// Build a pipeline rejection response (auth, quota). Bodies are stable
/// JSON-RPC error envelopes with a null id.
pub(crate) fn pipeline_rejection(status: StatusCode, code: i32, message: &str) -> Response {
    (status, Json(RpcFailure::new(Value::Null, code, message))).into_response()
}

/// Health-check handler: static success, no pipeline involvement.
async fn healthz() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

/// Dispatch one JSON-RPC request to the tool registry.
async fn handle_rpc(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    if request.method() != Method::POST {
        return rpc_error(Value::Null, INVALID_REQUEST, "invalid request");
    }

    let principal = request
        .extensions()
        .get::<Principal>()
        .map(|p| p.0.clone());

    let body = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to read request body: {}", e);
            return rpc_error(Value::Null, PARSE_ERROR, "parse error");
        }
    };

    let rpc: RpcRequest = match serde_json::from_slice(&body) {
        Ok(rpc) => rpc,
        Err(_) => return rpc_error(Value::Null, PARSE_ERROR, "parse error"),
    };

    if rpc.jsonrpc != "2.0" {
        return rpc_error(rpc.id, INVALID_REQUEST, "invalid request");
    }

    let tool = match state.registry.get(&rpc.method) {
        Some(tool) => tool,
        None => return rpc_error(rpc.id, METHOD_NOT_FOUND, "method not found"),
    };

    let params: Map<String, Value> = match rpc.params {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let ctx = ToolContext { principal };
    let mut response = match (tool.handler)(ctx, params).await {
        Ok(result) => Json(RpcSuccess::new(rpc.id, result)).into_response(),
        Err(e) => rpc_error(rpc.id, INTERNAL_ERROR, e.to_string()),
    };
    response
        .extensions_mut()
        .insert(ToolName(rpc.method.clone()));
    response
}

/// Protocol-level error response. HTTP 400 with the JSON-RPC error body.
fn rpc_error(id: Value, code: i32, message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(RpcFailure::new(id, code, message)),
    )
        .into_response()
}
