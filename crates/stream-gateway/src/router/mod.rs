//! Event router: one handler per bus event type.
//!
//! Every handler follows the same steps:
//!
//! 1. build the client-facing item from the typed event body;
//! 2. frame it once ([`framer::frame`]);
//! 3. pick eligible connections from the directory (lock released on return);
//! 4. for each eligible connection, look up the operation's subscriber ids,
//!    personalize the frame per id and `try_send` it;
//! 5. update the event's state cache, if it has one.
//!
//! Handlers never call each other and never block: a recipient whose queue
//! is full loses that one frame.

mod chat;
mod notification;
mod voice;

use crate::cache::VoiceStateCaches;
use crate::connection::Connection;
use crate::directory::ConnectionDirectory;
use crate::errors::GatewayError;
use crate::events::{self, EventKind, GatewayEvent, InboundEvent};
use crate::framer::{self, CanonicalPayload};
use crate::observability::metrics;
use crate::operations::ManagedOperation;

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace, warn};

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Connections that passed the event's filter.
    pub eligible: usize,
    /// Frames accepted into outbound queues.
    pub delivered: usize,
    /// Frames dropped because a queue was full or closed.
    pub dropped: usize,
}

/// Routes decoded bus events to connections and keeps the voice caches.
#[derive(Debug, Clone)]
pub struct EventRouter {
    directory: Arc<ConnectionDirectory>,
    caches: Arc<VoiceStateCaches>,
}

impl EventRouter {
    #[must_use]
    pub fn new(directory: Arc<ConnectionDirectory>, caches: Arc<VoiceStateCaches>) -> Self {
        Self { directory, caches }
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<ConnectionDirectory> {
        &self.directory
    }

    #[must_use]
    pub fn caches(&self) -> &Arc<VoiceStateCaches> {
        &self.caches
    }

    /// Decode and dispatch one raw bus record.
    ///
    /// Returns `None` if the record was skipped (unhandled name, or
    /// malformed). Malformed records are logged and counted; they never
    /// stop the caller's loop.
    pub fn route_raw(&self, raw: &[u8]) -> Option<DispatchReport> {
        match events::decode(raw) {
            Ok(Some(event)) => Some(self.dispatch(&event)),
            Ok(None) => {
                trace!(target: "gw.router", "Ignoring unhandled bus event");
                None
            }
            Err(e) => {
                let label = match &e {
                    GatewayError::MalformedEvent { event, .. } => {
                        EventKind::from_name(event).map_or("unknown", |kind| kind.name())
                    }
                    _ => "unknown",
                };
                metrics::record_event_malformed(label);
                warn!(
                    target: "gw.router",
                    event = label,
                    error = %e,
                    "Skipping malformed bus event"
                );
                None
            }
        }
    }

    /// Dispatch one decoded event to its handler.
    pub fn dispatch(&self, event: &InboundEvent) -> DispatchReport {
        let start = Instant::now();
        let kind = event.event.kind();
        let header = &event.header;

        let report = match &event.event {
            GatewayEvent::ChatMessage(body) => {
                chat::handle_chat_message(&self.directory, header, body)
            }
            GatewayEvent::NotifyAll(body) => {
                notification::handle_notify_all(&self.directory, header, body)
            }
            GatewayEvent::NotifyUser(body) => {
                notification::handle_notify_user(&self.directory, header, body)
            }
            GatewayEvent::NotifyRole(body) => {
                notification::handle_notify_role(&self.directory, header, body)
            }
            GatewayEvent::UserMuted(body) => {
                voice::handle_user_muted(&self.directory, &self.caches, header, body)
            }
            GatewayEvent::UserTalking(body) => {
                voice::handle_user_talking(&self.directory, &self.caches, header, body)
            }
            GatewayEvent::UserVoiceState(body) => {
                voice::handle_user_voice_state(&self.directory, &self.caches, header, body)
            }
            GatewayEvent::MeetingDestroyed => {
                self.caches.remove_meeting(&header.meeting_id);
                DispatchReport::default()
            }
        };

        metrics::record_event_routed(kind.name(), start.elapsed());
        debug!(
            target: "gw.router",
            event = kind.name(),
            meeting_id = %header.meeting_id,
            eligible = report.eligible,
            delivered = report.delivered,
            dropped = report.dropped,
            "Event dispatched"
        );
        report
    }
}

/// Frame `items` once for `operation`, logging (rather than propagating) a
/// serialization failure.
fn frame_for<T: Serialize>(operation: ManagedOperation, items: &[T]) -> Option<CanonicalPayload> {
    match framer::frame(operation.stream_field(), items) {
        Ok(payload) => Some(payload),
        Err(e) => {
            error!(
                target: "gw.router",
                operation = operation.operation_name(),
                error = %e,
                "Failed to frame stream payload"
            );
            None
        }
    }
}

/// Deliver `payload` to every subscriber of `operation` on `connections`.
fn fan_out(
    payload: &CanonicalPayload,
    operation: ManagedOperation,
    connections: &[Arc<Connection>],
) -> DispatchReport {
    let mut report = DispatchReport {
        eligible: connections.len(),
        ..DispatchReport::default()
    };

    for connection in connections {
        let Some(subscriber_ids) = connection.subscriptions().lookup(operation) else {
            continue;
        };
        for subscriber_id in &subscriber_ids {
            if connection
                .outbound()
                .try_send(payload.personalize(subscriber_id))
            {
                report.delivered += 1;
            } else {
                report.dropped += 1;
            }
        }
    }

    metrics::record_messages_delivered(operation.operation_name(), report.delivered);
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
pub(crate) mod test_support {
    use crate::connection::{Authorizations, Connection};
    use crate::delivery::DeliveryChannel;
    use crate::directory::ConnectionDirectory;
    use crate::operations::ManagedOperation;

    use bytes::Bytes;
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    pub(crate) fn attach(
        directory: &ConnectionDirectory,
        id: &str,
        meeting: &str,
        user: &str,
        authorizations: Authorizations,
        subscriptions: &[(ManagedOperation, &str)],
    ) -> mpsc::Receiver<Bytes> {
        let (outbound, rx) = DeliveryChannel::new(id, 16, CancellationToken::new());
        let connection = Arc::new(Connection::new(id, meeting, user, authorizations, outbound));
        for (operation, subscriber_id) in subscriptions {
            connection
                .subscriptions()
                .try_register(*operation, subscriber_id)
                .unwrap();
        }
        directory.register(connection);
        rx
    }

    pub(crate) fn drain(rx: &mut mpsc::Receiver<Bytes>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_slice(&frame).unwrap());
        }
        frames
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::test_support::{attach, drain};
    use super::*;
    use crate::connection::Authorizations;
    use serde_json::json;

    fn router() -> EventRouter {
        EventRouter::new(
            Arc::new(ConnectionDirectory::new()),
            Arc::new(VoiceStateCaches::new()),
        )
    }

    fn record(name: &str, meeting_id: &str, body: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "core": {"header": {"name": name, "meetingId": meeting_id}, "body": body}
        }))
        .unwrap()
    }

    #[test]
    fn test_route_raw_skips_malformed_and_unknown() {
        let router = router();
        assert!(router.route_raw(b"{").is_none());
        assert!(router
            .route_raw(&record("UserLeftMeetingEvtMsg", "m1", json!({})))
            .is_none());
        assert!(router
            .route_raw(&record("UserMutedVoiceEvtMsg", "m1", json!({"muted": true})))
            .is_none());
    }

    #[test]
    fn test_one_subscriber_per_id_receives_personalized_frame() {
        let router = router();
        let mut rx = attach(
            router.directory(),
            "c1",
            "m1",
            "u1",
            Authorizations::new(),
            &[
                (ManagedOperation::NotificationStream, "n1"),
                (ManagedOperation::NotificationStream, "n2"),
            ],
        );

        let report = router
            .route_raw(&record(
                "NotifyAllInMeetingEvtMsg",
                "m1",
                json!({
                    "notificationType": "info",
                    "icon": "user",
                    "messageId": "x",
                    "messageValues": []
                }),
            ))
            .unwrap();

        assert_eq!(
            report,
            DispatchReport {
                eligible: 1,
                delivered: 2,
                dropped: 0
            }
        );
        let frames = drain(&mut rx);
        let ids: Vec<_> = frames.iter().map(|f| f["id"].clone()).collect();
        assert_eq!(ids, vec![json!("n1"), json!("n2")]);
        assert_eq!(frames[0]["payload"], frames[1]["payload"]);
    }

    #[test]
    fn test_eligible_connection_without_subscription_gets_nothing() {
        let router = router();
        let mut rx = attach(router.directory(), "c1", "m1", "u1", Authorizations::new(), &[]);

        let report = router
            .route_raw(&record(
                "UserTalkingVoiceEvtMsg",
                "m1",
                json!({"intId": "u1", "talking": true}),
            ))
            .unwrap();

        assert_eq!(report.eligible, 1);
        assert_eq!(report.delivered, 0);
        assert!(drain(&mut rx).is_empty());
        // The cache still records the state for later subscribers.
        assert!(router.caches().talk.get("m1").unwrap().contains_key("u1"));
    }

    #[test]
    fn test_full_queue_drops_only_for_that_recipient() {
        let router = router();
        let mut slow = attach(
            router.directory(),
            "slow",
            "m1",
            "u1",
            Authorizations::new(),
            &[(ManagedOperation::UserMutedStateStream, "s")],
        );
        let mut fast = attach(
            router.directory(),
            "fast",
            "m1",
            "u2",
            Authorizations::new(),
            &[(ManagedOperation::UserMutedStateStream, "f")],
        );

        // The test channels hold 16 frames; the 17th to `slow` must drop.
        let mut dropped = 0;
        for i in 0..17 {
            let report = router
                .route_raw(&record(
                    "UserMutedVoiceEvtMsg",
                    "m1",
                    json!({"intId": format!("u{i}"), "muted": false}),
                ))
                .unwrap();
            dropped += report.dropped;
            // Keep the fast client drained.
            let _ = drain(&mut fast);
        }

        assert_eq!(dropped, 1);
        assert_eq!(drain(&mut slow).len(), 16);
    }

    #[test]
    fn test_meeting_destroyed_clears_caches() {
        let router = router();
        router.route_raw(&record(
            "UserTalkingVoiceEvtMsg",
            "m1",
            json!({"intId": "u1", "talking": true}),
        ));
        assert!(router.caches().talk.get("m1").is_some());

        let report = router
            .route_raw(&record("MeetingDestroyedEvtMsg", "m1", json!({"meetingId": "m1"})))
            .unwrap();

        assert_eq!(report, DispatchReport::default());
        assert!(router.caches().talk.get("m1").is_none());
    }
}
