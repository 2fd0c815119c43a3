//! Event bus ingestion.
//!
//! A single task subscribes to the backend's Redis pub/sub channel and hands
//! every payload to [`EventRouter::route_raw`] inline, so events for a
//! meeting are routed in publish order. Losing the subscription clears
//! readiness and triggers a reconnect with capped exponential backoff.

use crate::errors::GatewayError;
use crate::observability::HealthState;
use crate::router::EventRouter;

use std::sync::Arc;
use std::time::Duration;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Delay before the first reconnect attempt.
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Maximum reconnect delay.
pub const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Next reconnect delay after `current`.
#[must_use]
pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(BACKOFF_MAX)
}

/// A bus message carrying one serialized record.
pub trait BusPayload {
    fn payload(&self) -> &[u8];
}

impl BusPayload for redis::Msg {
    fn payload(&self) -> &[u8] {
        self.get_payload_bytes()
    }
}

impl BusPayload for bytes::Bytes {
    fn payload(&self) -> &[u8] {
        self
    }
}

impl BusPayload for Vec<u8> {
    fn payload(&self) -> &[u8] {
        self
    }
}

/// Why [`pump`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The shutdown token fired.
    Cancelled,
    /// The message stream ended (subscription lost).
    Closed,
}

/// Route every message from `messages` until it ends or `cancel_token` fires.
///
/// Returns the exit reason and the number of messages consumed.
pub async fn pump<S, M>(
    router: &EventRouter,
    messages: S,
    cancel_token: &CancellationToken,
) -> (PumpExit, u64)
where
    S: Stream<Item = M>,
    M: BusPayload,
{
    let mut messages = std::pin::pin!(messages);
    let mut consumed = 0u64;

    loop {
        tokio::select! {
            biased;

            () = cancel_token.cancelled() => return (PumpExit::Cancelled, consumed),

            next = messages.next() => {
                let Some(message) = next else {
                    return (PumpExit::Closed, consumed);
                };
                consumed += 1;
                router.route_raw(message.payload());
            }
        }
    }
}

/// Redis pub/sub subscriber feeding the router.
pub struct BusSubscriber {
    client: redis::Client,
    channel: String,
    router: EventRouter,
    health_state: Arc<HealthState>,
}

impl BusSubscriber {
    /// Create a subscriber. No connection is made until [`BusSubscriber::run`].
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Redis` if `redis_url` is not a valid Redis URL.
    pub fn new(
        redis_url: &str,
        channel: impl Into<String>,
        router: EventRouter,
        health_state: Arc<HealthState>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            channel: channel.into(),
            router,
            health_state,
        })
    }

    /// Consume the bus until `cancel_token` is cancelled.
    ///
    /// Connection failures are retried forever; the gateway keeps serving
    /// already-connected clients while the bus is away.
    #[instrument(skip_all, name = "gw.bus.subscriber", fields(channel = %self.channel))]
    pub async fn run(self, cancel_token: CancellationToken) {
        let mut delay = BACKOFF_BASE;

        loop {
            // Connecting can hang on an unreachable host; shutdown must not.
            let result = tokio::select! {
                () = cancel_token.cancelled() => break,
                result = self.consume(&cancel_token) => result,
            };
            match result {
                Ok(PumpExit::Cancelled) => break,
                Ok(PumpExit::Closed) => {
                    warn!(target: "gw.bus", "Bus subscription closed, reconnecting");
                    delay = BACKOFF_BASE;
                }
                Err(e) => {
                    error!(
                        target: "gw.bus",
                        error = %e,
                        delay_ms = delay.as_millis(),
                        "Bus subscription failed, retrying"
                    );
                }
            }
            self.health_state.set_not_ready();

            tokio::select! {
                () = cancel_token.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
            delay = next_backoff(delay);
        }

        self.health_state.set_not_ready();
        info!(target: "gw.bus", "Bus subscriber stopped");
    }

    async fn consume(&self, cancel_token: &CancellationToken) -> Result<PumpExit, GatewayError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        info!(target: "gw.bus", channel = %self.channel, "Subscribed to event bus");
        self.health_state.set_ready();

        let (exit, consumed) = pump(&self.router, pubsub.on_message(), cancel_token).await;
        debug!(target: "gw.bus", consumed, ?exit, "Bus message stream ended");
        Ok(exit)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cache::VoiceStateCaches;
    use crate::connection::Authorizations;
    use crate::directory::ConnectionDirectory;
    use crate::operations::ManagedOperation;
    use crate::router::test_support::{attach, drain};
    use serde_json::json;

    fn router() -> EventRouter {
        EventRouter::new(
            Arc::new(ConnectionDirectory::new()),
            Arc::new(VoiceStateCaches::new()),
        )
    }

    fn talking(user: &str, talking: bool) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "core": {
                "header": {"name": "UserTalkingVoiceEvtMsg", "meetingId": "m1", "userId": user},
                "body": {"intId": user, "talking": talking}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(next_backoff(BACKOFF_BASE), Duration::from_secs(2));
        assert_eq!(next_backoff(Duration::from_secs(16)), BACKOFF_MAX);
        assert_eq!(next_backoff(BACKOFF_MAX), BACKOFF_MAX);
    }

    #[tokio::test]
    async fn test_pump_routes_in_order_and_skips_garbage() {
        let router = router();
        let mut rx = attach(
            router.directory(),
            "c1",
            "m1",
            "u9",
            Authorizations::new(),
            &[(ManagedOperation::UserTalkingStateStream, "t")],
        );
        let messages = vec![
            talking("u1", true),
            b"not json".to_vec(),
            talking("u2", true),
            talking("u1", false),
        ];

        let (exit, consumed) = pump(
            &router,
            tokio_stream::iter(messages),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(exit, PumpExit::Closed);
        assert_eq!(consumed, 4);

        let users: Vec<_> = drain(&mut rx)
            .iter()
            .map(|f| f["payload"]["data"]["user_voice_activity_stream"][0]["userId"].clone())
            .collect();
        assert_eq!(users, vec![json!("u1"), json!("u2"), json!("u1")]);

        let cached = router.caches().talk.get("m1").unwrap();
        assert_eq!(cached.len(), 1);
        assert!(cached.contains_key("u2"));
    }

    #[tokio::test]
    async fn test_pump_stops_on_cancel() {
        let router = router();
        let token = CancellationToken::new();
        token.cancel();

        let (exit, consumed) =
            pump(&router, tokio_stream::pending::<Vec<u8>>(), &token).await;

        assert_eq!(exit, PumpExit::Cancelled);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = BusSubscriber::new(
            "not-a-redis-url",
            "chan",
            router(),
            Arc::new(HealthState::new()),
        );
        assert!(matches!(result, Err(GatewayError::Redis(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_until_cancelled() {
        // Port 1 refuses connections; the subscriber must keep retrying
        // without ever becoming ready.
        let health = Arc::new(HealthState::new());
        let subscriber =
            BusSubscriber::new("redis://127.0.0.1:1/", "chan", router(), Arc::clone(&health))
                .unwrap();
        let token = CancellationToken::new();
        let task = tokio::spawn(subscriber.run(token.clone()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!health.is_ready());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(60), task)
            .await
            .unwrap()
            .unwrap();
    }
}
