// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for topic-cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `topic_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `outcome`: confirmed, failed, cancelled
//! - `status`: backend status code for fetch failures

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record the outcome of a batch merge
pub fn record_merge(applied: usize, skipped: usize) {
    counter!("topic_cache_records_merged_total").increment(applied as u64);
    if skipped > 0 {
        counter!("topic_cache_records_skipped_total").increment(skipped as u64);
    }
}

/// Set current node count of the tree
pub fn set_node_count(count: usize) {
    gauge!("topic_cache_nodes").set(count as f64);
}

/// Record a fetch that produced no mergeable payload
pub fn record_fetch_failure(status: Option<u16>) {
    let status = status.map_or_else(|| "transport".to_string(), |s| s.to_string());
    counter!("topic_cache_fetch_failures_total", "status" => status).increment(1);
}

/// Record one confirmation poll
pub fn record_poll() {
    counter!("topic_cache_polls_total").increment(1);
}

/// Record a settled or cancelled confirmation
pub fn record_confirmation(outcome: &str) {
    counter!(
        "topic_cache_confirmations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record time from request to settlement
pub fn record_confirmation_latency(duration: Duration) {
    histogram!("topic_cache_confirmation_seconds").record(duration.as_secs_f64());
}

/// Set number of confirmations in flight
pub fn set_pending_confirmations(count: usize) {
    gauge!("topic_cache_pending_confirmations").set(count as f64);
}
