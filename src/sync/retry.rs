//! Bounded retry with fixed inter-attempt backoff.
//!
//! Wraps one chunk's submit+poll pair: chunk-level failures (transport
//! errors, submission rejections, poll timeouts) are retried up to the
//! configured budget; per-record rejections never reach this layer.
//! Cancellation is never retried.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AppError;

/// Runs `action` up to `1 + max_retries` times, sleeping `backoff` between
/// attempts.
///
/// `action` receives the attempt number (0-based). `on_retry` fires before
/// each re-attempt with the retry number (1-based) and the error that caused
/// it, so callers can surface retries on their event stream.
///
/// Returns the first success, or the last error once the budget is
/// exhausted. A non-retryable error (cancellation) is returned immediately.
pub async fn with_retry<T, F, Fut, R>(
    label: &str,
    max_retries: u32,
    backoff: Duration,
    mut on_retry: R,
    mut action: F,
) -> Result<T, AppError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
    R: FnMut(u32, &AppError),
{
    let mut attempt: u32 = 0;
    loop {
        match action(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    info!("[RETRY] {} succeeded on attempt {}", label, attempt + 1);
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= max_retries => {
                warn!("[RETRY] {} failed after {} attempts: {}", label, attempt + 1, e);
                return Err(e);
            }
            Err(e) => {
                attempt += 1;
                warn!(
                    "[RETRY] {} failed, retrying (attempt {}/{}): {}",
                    label,
                    attempt + 1,
                    max_retries + 1,
                    e
                );
                on_retry(attempt, &e);
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
