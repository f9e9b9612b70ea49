//! Per-principal token bucket rate limiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

use super::auth::Principal;
use super::types::RATE_LIMIT_EXCEEDED;
use super::{pipeline_rejection, ServerState, HEALTH_PATH};

/// Bucket key for requests that carry no principal.
const ANONYMOUS: &str = "anonymous";

/// Token-bucket table keyed by principal.
///
/// Buckets refill at `requests_per_minute / 60` tokens per second and
/// saturate at the burst capacity. `allow` atomically removes one token when
/// available.
pub struct KeyedRateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    rate_per_sec: f64,
    burst: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl KeyedRateLimiter {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rate_per_sec: f64::from(requests_per_minute) / 60.0,
            burst: f64::from(burst.max(1)),
        }
    }

    /// Consume one token for the key if available.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.lock();

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.burst);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Evict buckets idle for longer than `idle`. Returns the eviction count.
    pub fn cleanup(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) < idle);
        before - buckets.len()
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Rate limiting middleware. Runs after authentication so buckets key on
/// the real principal; requests without one share the anonymous bucket.
/// Health checks emit no quota charge.
pub async fn ratelimit_layer(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let key = request
        .extensions()
        .get::<Principal>()
        .map(|p| p.0.clone())
        .unwrap_or_else(|| ANONYMOUS.to_string());

    if !state.limiter.allow(&key) {
        return pipeline_rejection(
            StatusCode::TOO_MANY_REQUESTS,
            RATE_LIMIT_EXCEEDED,
            "rate limit exceeded",
        );
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_denied() {
        let limiter = KeyedRateLimiter::new(60, 5);

        for _ in 0..5 {
            assert!(limiter.allow("key-a"));
        }
        assert!(!limiter.allow("key-a"));
    }

    #[test]
    fn test_buckets_are_per_key() {
        let limiter = KeyedRateLimiter::new(60, 2);

        assert!(limiter.allow("key-a"));
        assert!(limiter.allow("key-a"));
        assert!(!limiter.allow("key-a"));

        // A different principal has its own budget.
        assert!(limiter.allow("key-b"));
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[test]
    fn test_refill_over_time() {
        // 600 rpm = 10 tokens/sec, so ~150ms refills at least one token.
        let limiter = KeyedRateLimiter::new(600, 2);

        assert!(limiter.allow("key"));
        assert!(limiter.allow("key"));
        assert!(!limiter.allow("key"));

        std::thread::sleep(Duration::from_millis(150));
        assert!(limiter.allow("key"));
    }

    #[test]
    fn test_tokens_saturate_at_burst() {
        let limiter = KeyedRateLimiter::new(6000, 3);

        assert!(limiter.allow("key"));
        std::thread::sleep(Duration::from_millis(100));

        // Long idle must not accumulate beyond the burst capacity.
        for _ in 0..3 {
            assert!(limiter.allow("key"));
        }
        assert!(!limiter.allow("key"));
    }

    #[test]
    fn test_cleanup_evicts_idle_buckets() {
        let limiter = KeyedRateLimiter::new(60, 5);
        limiter.allow("old");
        std::thread::sleep(Duration::from_millis(50));
        limiter.allow("fresh");

        let evicted = limiter.cleanup(Duration::from_millis(30));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.bucket_count(), 1);
    }
}
