//! Metrics recording.
//!
//! # Metrics
//! - `console_store_operations_total` (counter): store operations by op, outcome
//! - `console_remote_duration_seconds` (histogram): remote call latency by op
//! - `console_resources` (gauge): resources per category after a load
//!
//! Recording is a no-op until the embedding process installs a recorder.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

use crate::document::Category;

pub fn record_store_operation(op: &'static str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!("console_store_operations_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_remote_duration(op: &'static str, elapsed: Duration) {
    histogram!("console_remote_duration_seconds", "op" => op).record(elapsed.as_secs_f64());
}

pub fn record_resource_count(category: Category, count: usize) {
    gauge!("console_resources", "category" => category.as_str()).set(count as f64);
}

pub fn record_validation_failure(field: &str) {
    counter!("console_validation_failures_total", "field" => field.to_string()).increment(1);
}
