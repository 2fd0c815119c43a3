//! Bus record decoding.
//!
//! A bus record is `{"core": {"header": {...}, "body": {...}}}`. The header
//! is decoded for every record; the body is decoded into a typed struct only
//! for the event names this layer handles, and only once, before any
//! handler runs. Fields a handler does not read are ignored, so upstream
//! can add fields freely.

use crate::errors::GatewayError;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Bus event names handled by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GroupChatMessageBroadcast,
    NotifyAllInMeeting,
    NotifyUserInMeeting,
    NotifyRoleInMeeting,
    UserMutedVoice,
    UserTalkingVoice,
    UserVoiceState,
    MeetingDestroyed,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::GroupChatMessageBroadcast,
        EventKind::NotifyAllInMeeting,
        EventKind::NotifyUserInMeeting,
        EventKind::NotifyRoleInMeeting,
        EventKind::UserMutedVoice,
        EventKind::UserTalkingVoice,
        EventKind::UserVoiceState,
        EventKind::MeetingDestroyed,
    ];

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            EventKind::GroupChatMessageBroadcast => "GroupChatMessageBroadcastEvtMsg",
            EventKind::NotifyAllInMeeting => "NotifyAllInMeetingEvtMsg",
            EventKind::NotifyUserInMeeting => "NotifyUserInMeetingEvtMsg",
            EventKind::NotifyRoleInMeeting => "NotifyRoleInMeetingEvtMsg",
            EventKind::UserMutedVoice => "UserMutedVoiceEvtMsg",
            EventKind::UserTalkingVoice => "UserTalkingVoiceEvtMsg",
            EventKind::UserVoiceState => "UserVoiceStateEvtMsg",
            EventKind::MeetingDestroyed => "MeetingDestroyedEvtMsg",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Deserialize)]
struct BusRecord {
    core: CoreRecord,
}

#[derive(Debug, Deserialize)]
struct CoreRecord {
    header: EventHeader,
    #[serde(default)]
    body: Value,
}

/// Routing metadata common to every bus record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    pub name: String,
    #[serde(default)]
    pub meeting_id: String,
    /// Originating user, when the event has one.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl EventHeader {
    /// The header's user id if present and non-empty, otherwise `fallback`.
    #[must_use]
    pub fn user_id_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageBroadcast {
    pub chat_id: String,
    /// Users allowed to see the message; empty means the whole meeting.
    pub chat_participants: Vec<String>,
    pub msg: ChatMessageBody,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageBody {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Value,
    pub message_type: String,
    pub sender: ChatSender,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatSender {
    pub id: String,
    pub name: String,
    pub role: String,
}

/// Fields shared by the three notify events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_type: String,
    pub icon: String,
    pub message_id: String,
    /// Passed to the client verbatim.
    #[serde(default)]
    pub message_values: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotification {
    pub user_id: String,
    #[serde(flatten)]
    pub notification: Notification,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoleNotification {
    pub role: String,
    #[serde(flatten)]
    pub notification: Notification,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMutedVoice {
    pub int_id: String,
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTalkingVoice {
    pub int_id: String,
    pub talking: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVoiceState {
    pub user_id: String,
    pub voice_user_id: String,
    pub user_name: String,
    pub user_color: String,
    pub user_speech_locale: String,
    pub talking: bool,
    pub muted: bool,
}

/// A decoded, typed bus event.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    ChatMessage(ChatMessageBroadcast),
    NotifyAll(Notification),
    NotifyUser(UserNotification),
    NotifyRole(RoleNotification),
    UserMuted(UserMutedVoice),
    UserTalking(UserTalkingVoice),
    UserVoiceState(UserVoiceState),
    MeetingDestroyed,
}

impl GatewayEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            GatewayEvent::ChatMessage(_) => EventKind::GroupChatMessageBroadcast,
            GatewayEvent::NotifyAll(_) => EventKind::NotifyAllInMeeting,
            GatewayEvent::NotifyUser(_) => EventKind::NotifyUserInMeeting,
            GatewayEvent::NotifyRole(_) => EventKind::NotifyRoleInMeeting,
            GatewayEvent::UserMuted(_) => EventKind::UserMutedVoice,
            GatewayEvent::UserTalking(_) => EventKind::UserTalkingVoice,
            GatewayEvent::UserVoiceState(_) => EventKind::UserVoiceState,
            GatewayEvent::MeetingDestroyed => EventKind::MeetingDestroyed,
        }
    }
}

/// A bus record ready for routing.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub header: EventHeader,
    pub event: GatewayEvent,
}

impl InboundEvent {
    #[must_use]
    pub fn meeting_id(&self) -> &str {
        &self.header.meeting_id
    }
}

/// Decode one raw bus record.
///
/// Returns `Ok(None)` for well-formed records whose event name is not
/// handled here.
///
/// # Errors
///
/// Returns `GatewayError::MalformedEvent` if the record is not a bus
/// envelope, or if a handled event lacks its meeting id or a body field it
/// needs. The `event` of the error is `"unknown"` when the name could not
/// be read.
pub fn decode(raw: &[u8]) -> Result<Option<InboundEvent>, GatewayError> {
    let record: BusRecord =
        serde_json::from_slice(raw).map_err(|e| GatewayError::MalformedEvent {
            event: "unknown".to_string(),
            reason: e.to_string(),
        })?;

    let CoreRecord { mut header, body } = record.core;
    let Some(kind) = EventKind::from_name(&header.name) else {
        return Ok(None);
    };

    if header.meeting_id.is_empty() {
        // Meeting lifecycle events carry the id in the body.
        if let Some(meeting_id) = body.get("meetingId").and_then(Value::as_str) {
            header.meeting_id = meeting_id.to_string();
        }
    }
    if header.meeting_id.is_empty() {
        return Err(GatewayError::MalformedEvent {
            event: header.name,
            reason: "missing meetingId".to_string(),
        });
    }

    let event = match kind {
        EventKind::GroupChatMessageBroadcast => {
            GatewayEvent::ChatMessage(body_as(kind, body)?)
        }
        EventKind::NotifyAllInMeeting => GatewayEvent::NotifyAll(body_as(kind, body)?),
        EventKind::NotifyUserInMeeting => GatewayEvent::NotifyUser(body_as(kind, body)?),
        EventKind::NotifyRoleInMeeting => GatewayEvent::NotifyRole(body_as(kind, body)?),
        EventKind::UserMutedVoice => GatewayEvent::UserMuted(body_as(kind, body)?),
        EventKind::UserTalkingVoice => GatewayEvent::UserTalking(body_as(kind, body)?),
        EventKind::UserVoiceState => GatewayEvent::UserVoiceState(body_as(kind, body)?),
        EventKind::MeetingDestroyed => GatewayEvent::MeetingDestroyed,
    };

    Ok(Some(InboundEvent { header, event }))
}

fn body_as<T: DeserializeOwned>(kind: EventKind, body: Value) -> Result<T, GatewayError> {
    serde_json::from_value(body).map_err(|e| GatewayError::MalformedEvent {
        event: kind.name().to_string(),
        reason: e.to_string(),
    })
}
