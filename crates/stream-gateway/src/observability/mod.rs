//! Observability for the Stream Gateway.
//!
//! # Privacy by Default
//!
//! Log fields carry meeting, connection and subscriber ids but never message
//! bodies (chat text, notification values). Metric labels are bounded and
//! never carry ids.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `gw_connections_active` | Gauge | none | Connections in the directory |
//! | `gw_events_routed_total` | Counter | `event` | Bus events dispatched |
//! | `gw_event_dispatch_seconds` | Histogram | `event` | Time to fan one event out |
//! | `gw_events_malformed_total` | Counter | `event` | Events skipped as undecodable |
//! | `gw_messages_delivered_total` | Counter | `operation` | Frames queued to clients |
//! | `gw_messages_dropped_total` | Counter | `reason` | Frames lost to backpressure |
//! | `gw_subscriptions_rejected_total` | Counter | `operation` | Duplicate `subscribe` rejections |
//! | `gw_snapshots_sent_total` | Counter | `operation` | Cached-state catch-ups sent |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
