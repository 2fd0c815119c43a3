//! Client-to-gateway path for managed subscriptions.
//!
//! Every frame a client sends passes through
//! [`StreamingSubscriptions::handle_client_message`] before it goes
//! upstream. Frames for managed operations are consumed here; everything
//! else (including frames that do not parse) is handed back to the caller
//! to forward untouched.

use crate::cache::{StateCache, VoiceStateCaches};
use crate::connection::Connection;
use crate::errors::GatewayError;
use crate::framer;
use crate::observability::metrics;
use crate::operations::ManagedOperation;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the caller should do with a client frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Consumed by the gateway; do not forward.
    Handled,
    /// Not ours; forward to the upstream engine as-is.
    Forward,
}

#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    payload: Option<SubscribePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribePayload {
    #[serde(default)]
    operation_name: Option<String>,
}

/// Registers managed subscriptions and sends late subscribers the cached
/// voice state of their meeting.
#[derive(Debug, Clone)]
pub struct StreamingSubscriptions {
    caches: Arc<VoiceStateCaches>,
}

impl StreamingSubscriptions {
    #[must_use]
    pub fn new(caches: Arc<VoiceStateCaches>) -> Self {
        Self { caches }
    }

    /// Inspect one raw client frame.
    pub async fn handle_client_message(&self, connection: &Connection, raw: &[u8]) -> Outcome {
        let Ok(message) = serde_json::from_slice::<ClientMessage>(raw) else {
            return Outcome::Forward;
        };
        let Some(subscriber_id) = message.id.as_deref() else {
            return Outcome::Forward;
        };

        match message.kind.as_str() {
            "subscribe" => {
                let operation = message
                    .payload
                    .as_ref()
                    .and_then(|payload| payload.operation_name.as_deref())
                    .and_then(ManagedOperation::from_operation_name);
                match operation {
                    Some(operation) => {
                        self.subscribe(connection, operation, subscriber_id).await;
                        Outcome::Handled
                    }
                    None => Outcome::Forward,
                }
            }
            "complete" => match connection.subscriptions().remove_subscriber(subscriber_id) {
                Some(operation) => {
                    debug!(
                        target: "gw.subscriptions",
                        connection_id = %connection.id(),
                        subscriber_id = %subscriber_id,
                        operation = operation.operation_name(),
                        "Managed subscription completed by client"
                    );
                    Outcome::Handled
                }
                None => Outcome::Forward,
            },
            _ => Outcome::Forward,
        }
    }

    /// Register `subscriber_id` for `operation` on `connection`.
    ///
    /// A rejected registration is answered with `error` then `complete` for
    /// the rejected id. A successful one on a voice stream is followed by a
    /// snapshot of the meeting's cached state.
    pub async fn subscribe(
        &self,
        connection: &Connection,
        operation: ManagedOperation,
        subscriber_id: &str,
    ) {
        if let Err(e) = connection
            .subscriptions()
            .try_register(operation, subscriber_id)
        {
            metrics::record_subscription_rejected(operation.operation_name());
            warn!(
                target: "gw.subscriptions",
                connection_id = %connection.id(),
                subscriber_id = %subscriber_id,
                operation = operation.operation_name(),
                error = %e,
                "Rejected managed subscription"
            );
            reply(connection, framer::error_message(subscriber_id, &e.client_message())).await;
            reply(connection, framer::complete_message(subscriber_id)).await;
            return;
        }

        info!(
            target: "gw.subscriptions",
            connection_id = %connection.id(),
            meeting_id = %connection.meeting_id(),
            subscriber_id = %subscriber_id,
            operation = operation.operation_name(),
            "Managed subscription registered"
        );

        match operation {
            ManagedOperation::UserMutedStateStream => {
                Self::send_snapshot(&self.caches.mute, connection, operation, subscriber_id)
                    .await;
            }
            ManagedOperation::UserTalkingStateStream => {
                Self::send_snapshot(&self.caches.talk, connection, operation, subscriber_id)
                    .await;
            }
            ManagedOperation::UserVoiceStateStream => {
                Self::send_snapshot(&self.caches.voice, connection, operation, subscriber_id)
                    .await;
            }
            ManagedOperation::ChatMessageStream | ManagedOperation::NotificationStream => {}
        }
    }

    /// Send the cached rows of the connection's meeting as one `next`.
    ///
    /// Nothing is sent if the meeting was never cached. A meeting whose
    /// rows were all evicted yields an empty list.
    async fn send_snapshot<T: Clone + Serialize>(
        cache: &StateCache<T>,
        connection: &Connection,
        operation: ManagedOperation,
        subscriber_id: &str,
    ) {
        let Some(rows) = cache.get(connection.meeting_id()) else {
            return;
        };
        let items: Vec<T> = rows.into_values().collect();
        let frame = framer::next_message(subscriber_id, operation.stream_field(), &items);
        if reply(connection, frame).await {
            metrics::record_snapshot_sent(operation.operation_name());
            debug!(
                target: "gw.subscriptions",
                connection_id = %connection.id(),
                subscriber_id = %subscriber_id,
                cache = cache.name(),
                rows = items.len(),
                "Sent cached state snapshot"
            );
        }
    }
}

/// Deliver a direct reply with `send_or_cancel`. Returns whether it was
/// queued; a connection that went away meanwhile is not an error.
async fn reply(connection: &Connection, frame: Result<bytes::Bytes, GatewayError>) -> bool {
    let result = match frame {
        Ok(frame) => connection.outbound().send_or_cancel(frame).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => true,
        Err(GatewayError::ConnectionClosed(_)) => {
            debug!(
                target: "gw.subscriptions",
                connection_id = %connection.id(),
                "Connection closed before reply was queued"
            );
            false
        }
        Err(e) => {
            warn!(
                target: "gw.subscriptions",
                connection_id = %connection.id(),
                error = %e,
                "Failed to build reply"
            );
            false
        }
    }
}
