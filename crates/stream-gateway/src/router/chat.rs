//! `GroupChatMessageBroadcastEvtMsg` -> `getChatMessageStream`.

use super::{fan_out, frame_for, DispatchReport};
use crate::directory::ConnectionDirectory;
use crate::events::{ChatMessageBroadcast, EventHeader};
use crate::items::{ChatMessageItem, CHAT_MESSAGE_TYPENAME};
use crate::operations::ManagedOperation;

use common::time::stream_timestamp_now;

/// Public chats carry an empty participant list and reach the whole
/// meeting; private chats reach only their participants.
pub(super) fn handle_chat_message(
    directory: &ConnectionDirectory,
    header: &EventHeader,
    body: &ChatMessageBroadcast,
) -> DispatchReport {
    let item = ChatMessageItem {
        chat_id: body.chat_id.clone(),
        message: body.msg.message.clone(),
        message_id: body.msg.id.clone(),
        message_metadata: body.msg.metadata.clone(),
        message_type: body.msg.message_type.clone(),
        sender_name: body.msg.sender.name.clone(),
        sender_role: body.msg.sender.role.clone(),
        sender_id: body.msg.sender.id.clone(),
        created_at: stream_timestamp_now(),
        typename: CHAT_MESSAGE_TYPENAME,
    };

    let operation = ManagedOperation::ChatMessageStream;
    let Some(payload) = frame_for(operation, &[item]) else {
        return DispatchReport::default();
    };

    let participants = &body.chat_participants;
    let recipients = directory.snapshot_matching(|connection| {
        connection.in_meeting(&header.meeting_id)
            && (participants.is_empty()
                || participants.iter().any(|user| user == connection.user_id()))
    });

    fan_out(&payload, operation, &recipients)
}
