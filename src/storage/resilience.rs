//! Retry of transient storage failures.
//!
//! ```text
//! attempt 0 ──fail (transient)──> invalidate handle, sleep 1 × backoff ──> attempt 1
//! attempt 1 ──fail (transient)──> invalidate handle, sleep 2 × backoff ──> attempt 2
//! attempt 2 ──fail──────────────> error returned to caller
//! ```
//!
//! Non-transient errors (including corruption) are returned immediately; the
//! caller decides whether to recover.

use super::sqlite::{ConnectionManager, Database, record_retry};
use crate::Result;
use crate::config::RetryConfig;
use std::future::Future;
use std::sync::Arc;

/// Runs `attempt` against a fresh handle until it succeeds, fails with a
/// non-transient error, or the retry budget is spent.
///
/// Before each retry the handle used by the failed attempt is discarded so
/// the next attempt reconnects.
///
/// # Errors
///
/// Returns the last error from `attempt`, or from the connection manager.
pub async fn with_retry<T, F, Fut>(
    manager: &ConnectionManager,
    policy: RetryConfig,
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(Arc<Database>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        let (result, used) = match manager.get_connection().await {
            Ok(db) => (attempt(Arc::clone(&db)).await, Some(db)),
            Err(e) => (Err(e), None),
        };

        match result {
            Err(e) if e.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                tracing::warn!(
                    operation,
                    attempt = retries,
                    max_retries = policy.max_retries,
                    error = %e,
                    "Transient storage failure, retrying"
                );
                record_retry(operation, retries);
                if let Some(db) = used {
                    manager.invalidate(&db).await;
                }
                tokio::time::sleep(policy.backoff_for(retries)).await;
            },
            other => return other,
        }
    }
}
