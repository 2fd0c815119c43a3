//! Row types streamed to clients inside `next` messages.
//!
//! Field names and `__typename` values match what the client's GraphQL
//! documents select, so the client cache treats these rows exactly like
//! rows produced by the upstream engine.

use serde::Serialize;
use serde_json::Value;

pub const CHAT_MESSAGE_TYPENAME: &str = "chat_message_stream";
pub const NOTIFICATION_TYPENAME: &str = "notification";
pub const VOICE_ACTIVITY_TYPENAME: &str = "user_voice_activity_stream";
pub const USER_REF_TYPENAME: &str = "user_ref";

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageItem {
    pub chat_id: String,
    pub message: String,
    pub message_id: String,
    pub message_metadata: Value,
    pub message_type: String,
    pub sender_name: String,
    pub sender_role: String,
    pub sender_id: String,
    pub created_at: String,
    #[serde(rename = "__typename")]
    pub typename: &'static str,
}

/// One notification toast.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    pub notification_type: String,
    pub icon: String,
    pub message_id: String,
    pub message_values: Value,
    pub is_single_user_notification: bool,
    pub created_at: String,
    #[serde(rename = "__typename")]
    pub typename: &'static str,
}

/// Mute state of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteStateItem {
    pub user_id: String,
    pub muted: bool,
    pub voice_activity_at: String,
    #[serde(rename = "__typename")]
    pub typename: &'static str,
}

/// Talking state of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TalkStateItem {
    pub user_id: String,
    pub talking: bool,
    pub voice_activity_at: String,
    #[serde(rename = "__typename")]
    pub typename: &'static str,
}

/// Display fields of the user a voice row belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub color: String,
    pub name: String,
    pub speech_locale: String,
    #[serde(rename = "__typename")]
    pub typename: &'static str,
}

/// Combined voice activity of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStateItem {
    pub user_id: String,
    pub voice_user_id: String,
    pub muted: bool,
    pub talking: bool,
    pub user: UserRef,
    pub voice_activity_at: String,
    #[serde(rename = "__typename")]
    pub typename: &'static str,
}

impl VoiceStateItem {
    /// The default state (muted and silent) is not worth replaying to late
    /// joiners; anything else is.
    #[must_use]
    pub const fn is_noteworthy(&self) -> bool {
        self.talking || !self.muted
    }
}
