//! Metrics definitions for the Stream Gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gw_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `event`: the handled bus event names (8 values)
//! - `operation`: the managed operation names (5 values)
//! - `reason`: drop reasons (`buffer_full`, `closed`)
//!
//! Meeting, user, connection and subscriber ids are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Dispatch is in-memory fan-out; most events finish well under 1ms.
        .set_buckets_for_metric(
            Matcher::Prefix("gw_event_dispatch".to_string()),
            &[
                0.000_05, 0.000_1, 0.000_25, 0.000_5, 0.001, 0.002_5, 0.005, 0.010, 0.025, 0.050,
                0.100,
            ],
        )
        .map_err(|e| format!("Failed to set event dispatch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Connections (Gauges)
// ============================================================================

/// Set the number of connections in the directory.
///
/// Metric: `gw_connections_active`
/// Labels: none
pub fn set_connections_active(count: usize) {
    // usize to f64 conversion is safe for realistic connection counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("gw_connections_active").set(count as f64);
}

// ============================================================================
// Event routing
// ============================================================================

/// Record one routed bus event and how long its dispatch took.
///
/// Metrics: `gw_events_routed_total`, `gw_event_dispatch_seconds`
/// Labels: `event`
pub fn record_event_routed(event: &'static str, duration: Duration) {
    counter!("gw_events_routed_total", "event" => event).increment(1);
    histogram!("gw_event_dispatch_seconds", "event" => event).record(duration.as_secs_f64());
}

/// Record a known event that was skipped because its body did not decode.
///
/// Metric: `gw_events_malformed_total`
/// Labels: `event`
///
/// Records with an unparseable envelope are counted as `event="unknown"`.
pub fn record_event_malformed(event: &'static str) {
    counter!("gw_events_malformed_total", "event" => event).increment(1);
}

// ============================================================================
// Delivery
// ============================================================================

/// Record frames accepted into outbound queues for one operation.
///
/// Metric: `gw_messages_delivered_total`
/// Labels: `operation`
pub fn record_messages_delivered(operation: &'static str, count: usize) {
    if count > 0 {
        counter!("gw_messages_delivered_total", "operation" => operation)
            .increment(u64::try_from(count).unwrap_or(u64::MAX));
    }
}

/// Record one frame dropped by a non-blocking send.
///
/// Metric: `gw_messages_dropped_total`
/// Labels: `reason` (`buffer_full`, `closed`)
pub fn record_message_dropped(reason: &'static str) {
    counter!("gw_messages_dropped_total", "reason" => reason).increment(1);
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Record a `subscribe` rejected because the operation's slot is taken.
///
/// Metric: `gw_subscriptions_rejected_total`
/// Labels: `operation`
pub fn record_subscription_rejected(operation: &'static str) {
    counter!("gw_subscriptions_rejected_total", "operation" => operation).increment(1);
}

/// Record a cached-state snapshot sent to a new subscriber.
///
/// Metric: `gw_snapshots_sent_total`
/// Labels: `operation`
pub fn record_snapshot_sent(operation: &'static str) {
    counter!("gw_snapshots_sent_total", "operation" => operation).increment(1);
}
