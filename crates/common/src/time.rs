//! Timestamp formatting for streamed items.
//!
//! Clients sort and de-duplicate streamed rows by their timestamp fields
//! (`createdAt`, `voiceActivityAt`), so every item uses one fixed textual
//! form: UTC with millisecond precision, `YYYY-MM-DDTHH:MM:SS.sssZ`.

use chrono::{DateTime, Utc};

/// `strftime` pattern for [`format_stream_timestamp`].
pub const STREAM_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format an instant in the stream timestamp format.
#[must_use]
pub fn format_stream_timestamp(at: DateTime<Utc>) -> String {
    at.format(STREAM_TIMESTAMP_FORMAT).to_string()
}

/// The current instant in the stream timestamp format.
#[must_use]
pub fn stream_timestamp_now() -> String {
    format_stream_timestamp(Utc::now())
}
