//! Pre-configured test data fixtures for Stream Gateway testing.
//!
//! Provides builders for:
//! - Connections with authorizations and pre-registered subscriptions
//! - Bus records in the backend's envelope format
//! - Client subscribe / complete frames

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{json, Value};
use stream_gateway::connection::{Authorizations, Connection};
use stream_gateway::delivery::DeliveryChannel;
use stream_gateway::directory::ConnectionDirectory;
use stream_gateway::operations::ManagedOperation;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Outbound queue capacity used by [`TestConnection`] unless overridden.
pub const TEST_OUTBOUND_BUFFER: usize = 16;

/// Test connection fixture.
#[derive(Debug, Clone)]
pub struct TestConnection {
    /// Connection ID.
    pub id: String,
    /// Meeting the connection's user belongs to.
    pub meeting_id: String,
    /// User ID.
    pub user_id: String,
    /// Role grants.
    pub authorizations: Authorizations,
    /// Subscriptions registered at build time.
    pub subscriptions: Vec<(ManagedOperation, String)>,
    /// Outbound queue capacity.
    pub buffer: usize,
}

impl TestConnection {
    /// Create a connection for `user_id` in `meeting_id`.
    #[must_use]
    pub fn new(meeting_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: format!("conn-{}", Uuid::new_v4()),
            meeting_id: meeting_id.into(),
            user_id: user_id.into(),
            authorizations: Authorizations::new(),
            subscriptions: Vec::new(),
            buffer: TEST_OUTBOUND_BUFFER,
        }
    }

    /// Set an explicit connection ID (for reproducible tests).
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Grant the moderator role in `meeting_id`.
    #[must_use]
    pub fn moderator_in(mut self, meeting_id: impl Into<String>) -> Self {
        self.authorizations = self.authorizations.with_moderator(meeting_id);
        self
    }

    /// Grant the presenter role in `meeting_id`.
    #[must_use]
    pub fn presenter_in(mut self, meeting_id: impl Into<String>) -> Self {
        self.authorizations = self.authorizations.with_presenter(meeting_id);
        self
    }

    /// Register `subscriber_id` for `operation` when built.
    #[must_use]
    pub fn subscribed(mut self, operation: ManagedOperation, subscriber_id: &str) -> Self {
        self.subscriptions
            .push((operation, subscriber_id.to_string()));
        self
    }

    /// Set the outbound queue capacity.
    #[must_use]
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Build the connection and the receiving end of its outbound queue.
    ///
    /// # Panics
    ///
    /// Panics if a pre-registered subscription is rejected.
    #[must_use]
    pub fn build(self) -> (Arc<Connection>, mpsc::Receiver<Bytes>) {
        let (outbound, rx) = DeliveryChannel::new(&self.id, self.buffer, CancellationToken::new());
        let connection = Arc::new(Connection::new(
            self.id,
            self.meeting_id,
            self.user_id,
            self.authorizations,
            outbound,
        ));
        for (operation, subscriber_id) in &self.subscriptions {
            connection
                .subscriptions()
                .try_register(*operation, subscriber_id)
                .expect("fixture subscription rejected");
        }
        (connection, rx)
    }

    /// Build and register the connection in `directory`.
    #[must_use]
    pub fn attach(self, directory: &ConnectionDirectory) -> (Arc<Connection>, mpsc::Receiver<Bytes>) {
        let (connection, rx) = self.build();
        directory.register(Arc::clone(&connection));
        (connection, rx)
    }
}

/// Builder for bus records (`{"core": {"header": ..., "body": ...}}`).
#[derive(Debug, Clone)]
pub struct BusEventBuilder {
    header: Value,
    body: Value,
}

impl BusEventBuilder {
    /// Start a record named `name` for `meeting_id` with an empty body.
    #[must_use]
    pub fn new(name: &str, meeting_id: &str) -> Self {
        Self {
            header: json!({"name": name, "meetingId": meeting_id}),
            body: json!({}),
        }
    }

    /// Set the header's `userId`.
    #[must_use]
    pub fn user(mut self, user_id: &str) -> Self {
        self.header["userId"] = json!(user_id);
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Serialize the record.
    ///
    /// # Panics
    ///
    /// Never in practice; `Value` serialization is infallible.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        serde_json::to_vec(&json!({"core": {"header": self.header, "body": self.body}}))
            .expect("serialize bus record")
    }

    /// Chat message to `participants` (empty means public).
    #[must_use]
    pub fn chat_message(meeting_id: &str, participants: &[&str], text: &str) -> Self {
        Self::new("GroupChatMessageBroadcastEvtMsg", meeting_id).body(json!({
            "chatId": if participants.is_empty() { "MAIN-PUBLIC-GROUP-CHAT" } else { "private-chat" },
            "chatParticipants": participants,
            "msg": {
                "id": format!("msg-{}", Uuid::new_v4()),
                "message": text,
                "metadata": {},
                "messageType": "default",
                "sender": {"id": "sender-1", "name": "Sender", "role": "VIEWER"}
            }
        }))
    }

    fn notification_body(message_id: &str) -> Value {
        json!({
            "notificationType": "info",
            "icon": "user",
            "messageId": message_id,
            "messageValues": []
        })
    }

    /// Notification for everyone in the meeting.
    #[must_use]
    pub fn notify_all(meeting_id: &str, message_id: &str) -> Self {
        Self::new("NotifyAllInMeetingEvtMsg", meeting_id).body(Self::notification_body(message_id))
    }

    /// Notification for one user.
    #[must_use]
    pub fn notify_user(meeting_id: &str, user_id: &str, message_id: &str) -> Self {
        let mut body = Self::notification_body(message_id);
        body["userId"] = json!(user_id);
        Self::new("NotifyUserInMeetingEvtMsg", meeting_id).body(body)
    }

    /// Notification for holders of `role` in the meeting.
    #[must_use]
    pub fn notify_role(meeting_id: &str, role: &str, message_id: &str) -> Self {
        let mut body = Self::notification_body(message_id);
        body["role"] = json!(role);
        Self::new("NotifyRoleInMeetingEvtMsg", meeting_id).body(body)
    }

    /// Mute change for `user_id`.
    #[must_use]
    pub fn user_muted(meeting_id: &str, user_id: &str, muted: bool) -> Self {
        Self::new("UserMutedVoiceEvtMsg", meeting_id)
            .user(user_id)
            .body(json!({"intId": user_id, "muted": muted}))
    }

    /// Talking change for `user_id`.
    #[must_use]
    pub fn user_talking(meeting_id: &str, user_id: &str, talking: bool) -> Self {
        Self::new("UserTalkingVoiceEvtMsg", meeting_id)
            .user(user_id)
            .body(json!({"intId": user_id, "talking": talking}))
    }

    /// Full voice state for `user_id`.
    #[must_use]
    pub fn user_voice_state(meeting_id: &str, user_id: &str, talking: bool, muted: bool) -> Self {
        Self::new("UserVoiceStateEvtMsg", meeting_id)
            .user(user_id)
            .body(json!({
                "userId": user_id,
                "voiceUserId": format!("v-{user_id}"),
                "userName": "Test User",
                "userColor": "#7b1fa2",
                "userSpeechLocale": "en-US",
                "talking": talking,
                "muted": muted
            }))
    }

    /// Meeting teardown.
    #[must_use]
    pub fn meeting_destroyed(meeting_id: &str) -> Self {
        Self::new("MeetingDestroyedEvtMsg", meeting_id).body(json!({"meetingId": meeting_id}))
    }
}

/// Client `subscribe` frame for `operation_name`.
#[must_use]
pub fn subscribe_frame(subscriber_id: &str, operation_name: &str) -> Vec<u8> {
    json!({
        "type": "subscribe",
        "id": subscriber_id,
        "payload": {"operationName": operation_name, "query": "subscription { __typename }"}
    })
    .to_string()
    .into_bytes()
}

/// Client `complete` frame.
#[must_use]
pub fn complete_frame(subscriber_id: &str) -> Vec<u8> {
    json!({"type": "complete", "id": subscriber_id})
        .to_string()
        .into_bytes()
}

/// Drain every frame currently queued on `rx`, parsed as JSON.
///
/// # Panics
///
/// Panics if a queued frame is not valid JSON.
pub fn drain_frames(rx: &mut mpsc::Receiver<Bytes>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_slice(&frame).expect("outbound frame is JSON"));
    }
    frames
}
