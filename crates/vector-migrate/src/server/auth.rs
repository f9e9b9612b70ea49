//! API key authentication middleware.
//!
//! Accepts `Authorization: Bearer <token>` or a raw token, compares against
//! the configured credential in constant time, and attaches the principal to
//! the request for downstream accounting. The health-check path bypasses
//! authentication entirely.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use super::types::{INVALID_API_KEY, MISSING_AUTHORIZATION};
use super::{pipeline_rejection, ServerState, HEALTH_PATH};

/// Authenticated principal attached to the request extensions.
///
/// Today this is the credential itself; replaceable by a claim.
#[derive(Debug, Clone)]
pub struct Principal(pub String);

/// Extract the API key from the `Authorization` header.
///
/// Supports the `Bearer <key>` format and a raw key for backwards
/// compatibility.
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let key = auth.strip_prefix("Bearer ").unwrap_or(auth);
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Constant-time byte comparison (no early exit on content).
///
/// The length check short-circuits; only the content comparison needs to be
/// timing-safe.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Authentication middleware.
pub async fn auth_layer(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Response {
    // Health checks stay credential-free.
    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let api_key = match extract_api_key(request.headers()) {
        Some(key) => key,
        None => {
            return pipeline_rejection(
                StatusCode::UNAUTHORIZED,
                MISSING_AUTHORIZATION,
                "missing authorization",
            );
        }
    };

    if !constant_time_eq(api_key.as_bytes(), state.api_key.as_bytes()) {
        return pipeline_rejection(StatusCode::FORBIDDEN, INVALID_API_KEY, "invalid api key");
    }

    request.extensions_mut().insert(Principal(api_key));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn test_extract_bearer_format() {
        let headers = headers_with("Bearer my-secret-key");
        assert_eq!(extract_api_key(&headers).unwrap(), "my-secret-key");
    }

    #[test]
    fn test_extract_raw_format() {
        let headers = headers_with("my-secret-key");
        assert_eq!(extract_api_key(&headers).unwrap(), "my-secret-key");
    }

    #[test]
    fn test_extract_missing_header() {
        assert!(extract_api_key(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_extract_empty_bearer() {
        let headers = headers_with("Bearer ");
        assert!(extract_api_key(&headers).is_none());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secrex"));
        assert!(!constant_time_eq(b"secret", b"Xecret"));
        assert!(!constant_time_eq(b"secret", b"seXret"));
        assert!(!constant_time_eq(b"secret", b"longer-secret"));
        assert!(constant_time_eq(b"", b""));
    }
}
