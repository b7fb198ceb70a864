//! Metrics recording for journal storage operations.

use crate::Result;
use std::time::Instant;

/// Outcome label for an operation result.
#[must_use]
pub fn status_of<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) if e.is_corruption() => "corruption",
        Err(e) if e.is_retryable() => "transient",
        Err(_) => "error",
    }
}

/// Records count and latency for one repository operation.
///
/// Emits `storage_operations_total` and `storage_operation_duration_ms`,
/// labelled by operation and status.
pub fn record_operation_metrics(operation: &'static str, start: Instant, status: &'static str) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Records a retry of `operation` after a transient failure.
pub fn record_retry(operation: &'static str, attempt: u32) {
    metrics::counter!(
        "storage_retries_total",
        "operation" => operation,
        "attempt" => attempt.to_string()
    )
    .increment(1);
}
