//! The three notify events -> `getNotificationStream`.
//!
//! They share one item shape and differ only in who receives them: the
//! whole meeting, one user, or the holders of one role.

use super::{fan_out, frame_for, DispatchReport};
use crate::connection::{Connection, Role};
use crate::directory::ConnectionDirectory;
use crate::events::{EventHeader, Notification, RoleNotification, UserNotification};
use crate::items::{NotificationItem, NOTIFICATION_TYPENAME};
use crate::operations::ManagedOperation;

use common::time::stream_timestamp_now;
use tracing::debug;

pub(super) fn handle_notify_all(
    directory: &ConnectionDirectory,
    header: &EventHeader,
    body: &Notification,
) -> DispatchReport {
    notify(directory, header, body, false, |_| true)
}

pub(super) fn handle_notify_user(
    directory: &ConnectionDirectory,
    header: &EventHeader,
    body: &UserNotification,
) -> DispatchReport {
    notify(directory, header, &body.notification, true, |connection| {
        connection.user_id() == body.user_id
    })
}

pub(super) fn handle_notify_role(
    directory: &ConnectionDirectory,
    header: &EventHeader,
    body: &RoleNotification,
) -> DispatchReport {
    let Some(role) = Role::parse(&body.role) else {
        debug!(
            target: "gw.router",
            role = %body.role,
            meeting_id = %header.meeting_id,
            "Role notification for a role no connection can hold"
        );
        return DispatchReport::default();
    };

    notify(directory, header, &body.notification, false, |connection| {
        connection.authorizations().holds(role, &header.meeting_id)
    })
}

fn notify<F>(
    directory: &ConnectionDirectory,
    header: &EventHeader,
    notification: &Notification,
    is_single_user_notification: bool,
    also: F,
) -> DispatchReport
where
    F: Fn(&Connection) -> bool,
{
    let item = NotificationItem {
        notification_type: notification.notification_type.clone(),
        icon: notification.icon.clone(),
        message_id: notification.message_id.clone(),
        message_values: notification.message_values.clone(),
        is_single_user_notification,
        created_at: stream_timestamp_now(),
        typename: NOTIFICATION_TYPENAME,
    };

    let operation = ManagedOperation::NotificationStream;
    let Some(payload) = frame_for(operation, &[item]) else {
        return DispatchReport::default();
    };

    let recipients = directory.snapshot_matching(|connection| {
        connection.in_meeting(&header.meeting_id) && also(connection)
    });

    fan_out(&payload, operation, &recipients)
}
