//! Per-connection outbound delivery.
//!
//! Every connection owns one bounded queue of serialized frames. Two send
//! variants exist, and callers pick one explicitly:
//!
//! - [`DeliveryChannel::try_send`]: fan-out path. Never waits; if the queue
//!   is full the frame is dropped for that one recipient. Live streams are
//!   superseded by the next event, so a stalled client loses updates rather
//!   than stalling everyone else.
//! - [`DeliveryChannel::send_or_cancel`]: direct protocol replies (error,
//!   complete, snapshots). Waits for queue space, but gives up as soon as
//!   the connection's cancellation token fires.
//!
//! [`OutboundWriter`] is the per-connection task draining the queue into
//! the client transport.

use crate::config::Config;
use crate::errors::GatewayError;
use crate::observability::metrics;

use bytes::Bytes;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default outbound queue size per connection.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Sending half of a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct DeliveryChannel {
    connection_id: Arc<str>,
    sender: mpsc::Sender<Bytes>,
    cancel_token: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl DeliveryChannel {
    /// Create a channel and the receiver the writer task drains.
    #[must_use]
    pub fn new(
        connection_id: &str,
        buffer: usize,
        cancel_token: CancellationToken,
    ) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let channel = Self {
            connection_id: Arc::from(connection_id),
            sender,
            cancel_token,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (channel, receiver)
    }

    /// Create a channel sized by `GW_OUTBOUND_BUFFER`. Transport code
    /// accepting a client calls this once per connection.
    #[must_use]
    pub fn from_config(
        connection_id: &str,
        config: &Config,
        cancel_token: CancellationToken,
    ) -> (Self, mpsc::Receiver<Bytes>) {
        Self::new(connection_id, config.outbound_buffer, cancel_token)
    }

    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Best-effort, non-blocking send. Returns `false` if the frame was
    /// dropped (queue full, or connection gone).
    pub fn try_send(&self, payload: Bytes) -> bool {
        match self.sender.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.record_drop("buffer_full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.record_drop("closed");
                false
            }
        }
    }

    /// Guaranteed send, bounded by the connection's lifetime.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConnectionClosed` if the connection is
    /// cancelled before (or while) waiting for queue space, or if the
    /// receiving side is gone.
    pub async fn send_or_cancel(&self, payload: Bytes) -> Result<(), GatewayError> {
        tokio::select! {
            biased;
            () = self.cancel_token.cancelled() => {
                Err(GatewayError::ConnectionClosed(self.connection_id.to_string()))
            }
            result = self.sender.send(payload) => {
                result.map_err(|_| GatewayError::ConnectionClosed(self.connection_id.to_string()))
            }
        }
    }

    /// Cancel the connection (disconnect).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Token tied to the connection's lifetime.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Frames dropped by `try_send` so far.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn record_drop(&self, reason: &'static str) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_message_dropped(reason);
        debug!(
            target: "gw.delivery",
            connection_id = %self.connection_id,
            reason,
            dropped,
            "Dropped outbound message"
        );
    }
}

/// Client-side transport the writer task forwards frames to.
///
/// Implemented by whatever owns the socket (WebSocket write half, a relay
/// channel, a test recorder).
pub trait OutboundSink: Send + 'static {
    /// Write one frame to the client.
    fn write(&mut self, payload: Bytes) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

impl OutboundSink for mpsc::UnboundedSender<Bytes> {
    fn write(&mut self, payload: Bytes) -> impl Future<Output = Result<(), GatewayError>> + Send {
        let result = self
            .send(payload)
            .map_err(|_| GatewayError::ConnectionClosed("outbound sink closed".to_string()));
        std::future::ready(result)
    }
}

/// The per-connection outbound task.
pub struct OutboundWriter<S> {
    connection_id: String,
    receiver: mpsc::Receiver<Bytes>,
    sink: S,
    cancel_token: CancellationToken,
    frames_written: u64,
}

impl<S: OutboundSink> OutboundWriter<S> {
    /// Spawn the writer. It runs until the connection is cancelled, the
    /// queue closes, or the sink fails (which also cancels the connection).
    pub fn spawn(
        connection_id: String,
        receiver: mpsc::Receiver<Bytes>,
        sink: S,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let writer = Self {
            connection_id,
            receiver,
            sink,
            cancel_token,
            frames_written: 0,
        };
        tokio::spawn(writer.run())
    }

    #[instrument(
        skip_all,
        name = "gw.delivery.writer",
        fields(connection_id = %self.connection_id)
    )]
    async fn run(mut self) {
        debug!(
            target: "gw.delivery",
            connection_id = %self.connection_id,
            "OutboundWriter started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "gw.delivery",
                        connection_id = %self.connection_id,
                        "OutboundWriter received cancellation signal"
                    );
                    break;
                }

                frame = self.receiver.recv() => {
                    let Some(frame) = frame else {
                        debug!(
                            target: "gw.delivery",
                            connection_id = %self.connection_id,
                            "Outbound queue closed, exiting"
                        );
                        break;
                    };

                    if let Err(e) = self.sink.write(frame).await {
                        warn!(
                            target: "gw.delivery",
                            connection_id = %self.connection_id,
                            error = %e,
                            "Outbound write failed, closing connection"
                        );
                        self.cancel_token.cancel();
                        break;
                    }
                    self.frames_written += 1;
                }
            }
        }

        info!(
            target: "gw.delivery",
            connection_id = %self.connection_id,
            frames_written = self.frames_written,
            "OutboundWriter stopped"
        );
    }
}
