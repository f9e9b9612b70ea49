//! Bounded retry for transient adapter errors.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// Run `op`, retrying up to `max_retries` times with linear backoff when the
/// error is transient. Permanent errors fail immediately.
pub async fn with_retry<T, F, Fut>(
    label: &str,
    max_retries: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let delay = base_delay * attempt;
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    label, attempt, max_retries, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
