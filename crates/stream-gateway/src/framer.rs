//! Protocol framing for outbound client messages.
//!
//! Fan-out messages are serialized once with [`SUBSCRIBER_ID_PLACEHOLDER`]
//! in the `id` slot ([`frame`]), then each recipient gets its own copy by a
//! single string substitution ([`CanonicalPayload::personalize`]). Fanning
//! one event out to N subscribers costs one JSON serialization plus N
//! substitutions instead of N serializations.
//!
//! `id` is the first field of every envelope, so the first occurrence of the
//! quoted placeholder is always the id slot. The rest of the payload is never
//! touched, even if a chat message happens to contain the placeholder text.
//!
//! Control messages (`error`, `complete`) and snapshots go to exactly one
//! subscriber and are serialized directly with the real id.

use crate::errors::GatewayError;
use bytes::Bytes;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Sentinel written into the `id` slot of canonical payloads.
pub const SUBSCRIBER_ID_PLACEHOLDER: &str = "__SUBSCRIBER_ID_PLACEHOLDER__";

const PLACEHOLDER_QUOTED: &str = "\"__SUBSCRIBER_ID_PLACEHOLDER__\"";

#[derive(Serialize)]
struct Envelope<'a, P: Serialize> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<P>,
}

#[derive(Serialize)]
struct NextPayload<'a, T: Serialize> {
    data: StreamData<'a, T>,
}

/// `{<stream_field>: [items...]}`
struct StreamData<'a, T> {
    field: &'a str,
    items: &'a [T],
}

impl<T: Serialize> Serialize for StreamData<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.field, self.items)?;
        map.end()
    }
}

#[derive(Serialize)]
struct ErrorEntry<'a> {
    message: &'a str,
}

/// A serialized `next` message awaiting its subscriber id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPayload {
    json: String,
}

impl CanonicalPayload {
    /// Copy of the payload with the placeholder replaced by `subscriber_id`.
    #[must_use]
    pub fn personalize(&self, subscriber_id: &str) -> Bytes {
        let quoted = serde_json::Value::String(subscriber_id.to_string()).to_string();
        Bytes::from(self.json.replacen(PLACEHOLDER_QUOTED, &quoted, 1))
    }

    /// The canonical JSON, placeholder included.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.json
    }
}

/// Serialize a `next` message for fan-out.
///
/// # Errors
///
/// Returns `GatewayError::Serialization` if an item fails to serialize.
pub fn frame<T: Serialize>(
    stream_field: &str,
    items: &[T],
) -> Result<CanonicalPayload, GatewayError> {
    let json = serde_json::to_string(&next_envelope(
        SUBSCRIBER_ID_PLACEHOLDER,
        stream_field,
        items,
    ))?;
    Ok(CanonicalPayload { json })
}

/// Serialize a `next` message addressed to one subscriber.
///
/// # Errors
///
/// Returns `GatewayError::Serialization` if an item fails to serialize.
pub fn next_message<T: Serialize>(
    subscriber_id: &str,
    stream_field: &str,
    items: &[T],
) -> Result<Bytes, GatewayError> {
    let json = serde_json::to_vec(&next_envelope(subscriber_id, stream_field, items))?;
    Ok(Bytes::from(json))
}

/// `{"id", "type":"error", "payload":[{"message"}]}`
///
/// # Errors
///
/// Returns `GatewayError::Serialization` if encoding fails.
pub fn error_message(subscriber_id: &str, message: &str) -> Result<Bytes, GatewayError> {
    let envelope = Envelope {
        id: subscriber_id,
        kind: "error",
        payload: Some([ErrorEntry { message }]),
    };
    Ok(Bytes::from(serde_json::to_vec(&envelope)?))
}

/// `{"id", "type":"complete"}`
///
/// # Errors
///
/// Returns `GatewayError::Serialization` if encoding fails.
pub fn complete_message(subscriber_id: &str) -> Result<Bytes, GatewayError> {
    let envelope: Envelope<'_, ()> = Envelope {
        id: subscriber_id,
        kind: "complete",
        payload: None,
    };
    Ok(Bytes::from(serde_json::to_vec(&envelope)?))
}

fn next_envelope<'a, T: Serialize>(
    id: &'a str,
    stream_field: &'a str,
    items: &'a [T],
) -> Envelope<'a, NextPayload<'a, T>> {
    Envelope {
        id,
        kind: "next",
        payload: Some(NextPayload {
            data: StreamData {
                field: stream_field,
                items,
            },
        }),
    }
}
