//! The fixed set of subscription operations handled by this layer.
//!
//! Any `subscribe` whose `operationName` is not listed here belongs to the
//! upstream GraphQL engine and is forwarded untouched.

use std::fmt;

/// How many live subscriber ids one connection may hold for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one; a second `subscribe` is rejected.
    Single,
    /// Any number; every registered id receives every matching event.
    Multiple,
}

/// A managed streaming operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedOperation {
    ChatMessageStream,
    NotificationStream,
    UserMutedStateStream,
    UserTalkingStateStream,
    UserVoiceStateStream,
}

impl ManagedOperation {
    pub const ALL: [ManagedOperation; 5] = [
        ManagedOperation::ChatMessageStream,
        ManagedOperation::NotificationStream,
        ManagedOperation::UserMutedStateStream,
        ManagedOperation::UserTalkingStateStream,
        ManagedOperation::UserVoiceStateStream,
    ];

    /// The `operationName` clients send in `subscribe`.
    #[must_use]
    pub const fn operation_name(&self) -> &'static str {
        match self {
            ManagedOperation::ChatMessageStream => "getChatMessageStream",
            ManagedOperation::NotificationStream => "getNotificationStream",
            ManagedOperation::UserMutedStateStream => "getUserMutedStateStream",
            ManagedOperation::UserTalkingStateStream => "getUserTalkingStateStream",
            ManagedOperation::UserVoiceStateStream => "getUserVoiceStateStream",
        }
    }

    /// Parse an `operationName`; `None` means "not managed here".
    #[must_use]
    pub fn from_operation_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|operation| operation.operation_name() == name)
    }

    /// The field under `payload.data` that carries this stream's items.
    #[must_use]
    pub const fn stream_field(&self) -> &'static str {
        match self {
            ManagedOperation::ChatMessageStream => "chat_message_stream",
            ManagedOperation::NotificationStream => "notification_stream",
            ManagedOperation::UserMutedStateStream
            | ManagedOperation::UserTalkingStateStream
            | ManagedOperation::UserVoiceStateStream => "user_voice_activity_stream",
        }
    }

    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        match self {
            ManagedOperation::ChatMessageStream => Cardinality::Single,
            ManagedOperation::NotificationStream
            | ManagedOperation::UserMutedStateStream
            | ManagedOperation::UserTalkingStateStream
            | ManagedOperation::UserVoiceStateStream => Cardinality::Multiple,
        }
    }

    /// Whether a new subscriber is first sent the cached state of its meeting.
    #[must_use]
    pub const fn sends_snapshot(&self) -> bool {
        matches!(
            self,
            ManagedOperation::UserMutedStateStream
                | ManagedOperation::UserTalkingStateStream
                | ManagedOperation::UserVoiceStateStream
        )
    }
}

impl fmt::Display for ManagedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names_round_trip() {
        for operation in ManagedOperation::ALL {
            assert_eq!(
                ManagedOperation::from_operation_name(operation.operation_name()),
                Some(operation)
            );
        }
    }

    #[test]
    fn test_unmanaged_operation_is_none() {
        assert_eq!(ManagedOperation::from_operation_name("getMeetingInfo"), None);
        // Names are matched exactly.
        assert_eq!(
            ManagedOperation::from_operation_name("getchatmessagestream"),
            None
        );
        assert_eq!(
            ManagedOperation::from_operation_name("getCursorCoordinatesStream"),
            None
        );
    }

    #[test]
    fn test_only_chat_is_single_cardinality() {
        let single: Vec<_> = ManagedOperation::ALL
            .into_iter()
            .filter(|op| op.cardinality() == Cardinality::Single)
            .collect();
        assert_eq!(single, vec![ManagedOperation::ChatMessageStream]);
    }

    #[test]
    fn test_snapshot_operations_are_voice_streams() {
        assert!(!ManagedOperation::ChatMessageStream.sends_snapshot());
        assert!(!ManagedOperation::NotificationStream.sends_snapshot());
        assert!(ManagedOperation::UserMutedStateStream.sends_snapshot());
        assert!(ManagedOperation::UserTalkingStateStream.sends_snapshot());
        assert!(ManagedOperation::UserVoiceStateStream.sends_snapshot());
    }

    #[test]
    fn test_voice_streams_share_stream_field() {
        assert_eq!(
            ManagedOperation::UserMutedStateStream.stream_field(),
            ManagedOperation::UserVoiceStateStream.stream_field()
        );
        assert_eq!(
            ManagedOperation::ChatMessageStream.stream_field(),
            "chat_message_stream"
        );
    }
}
