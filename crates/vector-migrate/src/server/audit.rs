//! Audit logging middleware with secret redaction.
//!
//! Every request produces two structured entries: one on arrival, one on
//! completion with the final status code and duration. Credentials are
//! masked before they reach any sink; the raw secret never appears in audit
//! output.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::auth::extract_api_key;
use super::ServerState;

/// Characters kept visible at the end of a masked secret.
const MASK_KEEP_LAST: usize = 4;

/// Mask a secret for logging: strings of length <= 4 become `****`, longer
/// strings keep only their last four characters.
pub fn mask_secret(s: &str) -> String {
    if s.chars().count() <= MASK_KEEP_LAST {
        return "****".to_string();
    }
    let tail: String = s
        .chars()
        .rev()
        .take(MASK_KEEP_LAST)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}

/// One structured audit entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// "request" on arrival, "response" on completion.
    pub event_type: String,
    pub api_key_masked: String,
    pub method: String,
    pub path: String,
    pub client_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Destination for audit entries. Configurable per deployment; the default
/// emits structured `tracing` events.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Default sink: one JSON line per entry under the `audit` tracing target.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        match serde_json::to_string(entry) {
            Ok(line) => tracing::info!(target: "audit", "{}", line),
            Err(e) => tracing::warn!(target: "audit", "failed to serialize audit entry: {}", e),
        }
    }
}

/// In-memory sink for tests and embedders that inspect audit output.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl AuditSink for MemorySink {
    fn record(&self, entry: &AuditEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
    }
}

/// Tool name attached to the response by the dispatch handler so the
/// completion entry can name what ran.
#[derive(Debug, Clone)]
pub struct ToolName(pub String);

/// Audit middleware. Outermost in the pipeline: rejections from
/// authentication and rate limiting still produce a completion entry with
/// their status code.
pub async fn audit_layer(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let api_key_masked = mask_secret(&extract_api_key(request.headers()).unwrap_or_default());

    state.audit.record(&AuditEntry {
        timestamp: Utc::now(),
        event_type: "request".to_string(),
        api_key_masked: api_key_masked.clone(),
        method: method.clone(),
        path: path.clone(),
        client_ip: client_ip.clone(),
        status_code: None,
        duration_ms: None,
        tool_name: None,
        error: None,
    });

    let response = next.run(request).await;

    state.audit.record(&AuditEntry {
        timestamp: Utc::now(),
        event_type: "response".to_string(),
        api_key_masked,
        method,
        path,
        client_ip,
        status_code: Some(response.status().as_u16()),
        duration_ms: Some(start.elapsed().as_millis() as i64),
        tool_name: response
            .extensions()
            .get::<ToolName>()
            .map(|t| t.0.clone()),
        error: None,
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_short_strings() {
        assert_eq!(mask_secret(""), "****");
        assert_eq!(mask_secret("ab"), "****");
        assert_eq!(mask_secret("abcd"), "****");
    }

    #[test]
    fn test_mask_keeps_last_four() {
        assert_eq!(mask_secret("abcde"), "****bcde");
        assert_eq!(mask_secret("secret-key-1234"), "****1234");
    }

    #[test]
    fn test_masked_form_never_contains_long_secret() {
        let secret = "super-secret-credential";
        let masked = mask_secret(secret);
        assert!(!masked.contains(&secret[..secret.len() - MASK_KEEP_LAST]));
        assert!(masked.starts_with("****"));
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        for event_type in ["request", "response"] {
            sink.record(&AuditEntry {
                timestamp: Utc::now(),
                event_type: event_type.to_string(),
                api_key_masked: "****1234".to_string(),
                method: "POST".to_string(),
                path: "/".to_string(),
                client_ip: "unknown".to_string(),
                status_code: None,
                duration_ms: None,
                tool_name: None,
                error: None,
            });
        }

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, "request");
        assert_eq!(entries[1].event_type, "response");
    }

    #[test]
    fn test_entry_serialization_skips_absent_fields() {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event_type: "request".to_string(),
            api_key_masked: "****".to_string(),
            method: "GET".to_string(),
            path: "/healthz".to_string(),
            client_ip: "unknown".to_string(),
            status_code: None,
            duration_ms: None,
            tool_name: None,
            error: None,
        };

        let line = serde_json::to_string(&entry).unwrap();
        assert!(!line.contains("status_code"));
        assert!(!line.contains("tool_name"));
    }
}
