//! Voice events -> the three voice activity streams and their caches.
//!
//! Each cache keeps only the users worth replaying to a late subscriber:
//! unmuted users (mute), talking users (talk), and users who are talking or
//! unmuted (voice). Rows are keyed by the header's user id, falling back to
//! the body's user id when the header has none.

use super::{fan_out, frame_for, DispatchReport};
use crate::cache::VoiceStateCaches;
use crate::directory::ConnectionDirectory;
use crate::events::{EventHeader, UserMutedVoice, UserTalkingVoice, UserVoiceState};
use crate::items::{
    MuteStateItem, TalkStateItem, UserRef, VoiceStateItem, USER_REF_TYPENAME,
    VOICE_ACTIVITY_TYPENAME,
};
use crate::operations::ManagedOperation;

use common::time::stream_timestamp_now;
use serde::Serialize;

fn broadcast_to_meeting<T: Serialize>(
    directory: &ConnectionDirectory,
    header: &EventHeader,
    operation: ManagedOperation,
    item: &T,
) -> DispatchReport {
    let Some(payload) = frame_for(operation, std::slice::from_ref(item)) else {
        return DispatchReport::default();
    };
    let recipients =
        directory.snapshot_matching(|connection| connection.in_meeting(&header.meeting_id));
    fan_out(&payload, operation, &recipients)
}

pub(super) fn handle_user_muted(
    directory: &ConnectionDirectory,
    caches: &VoiceStateCaches,
    header: &EventHeader,
    body: &UserMutedVoice,
) -> DispatchReport {
    let item = MuteStateItem {
        user_id: body.int_id.clone(),
        muted: body.muted,
        voice_activity_at: stream_timestamp_now(),
        typename: VOICE_ACTIVITY_TYPENAME,
    };

    let report = broadcast_to_meeting(
        directory,
        header,
        ManagedOperation::UserMutedStateStream,
        &item,
    );

    let user_id = header.user_id_or(&body.int_id);
    if body.muted {
        caches.mute.remove_user(&header.meeting_id, user_id);
    } else {
        caches.mute.store(&header.meeting_id, user_id, item);
    }
    report
}

pub(super) fn handle_user_talking(
    directory: &ConnectionDirectory,
    caches: &VoiceStateCaches,
    header: &EventHeader,
    body: &UserTalkingVoice,
) -> DispatchReport {
    let item = TalkStateItem {
        user_id: body.int_id.clone(),
        talking: body.talking,
        voice_activity_at: stream_timestamp_now(),
        typename: VOICE_ACTIVITY_TYPENAME,
    };

    let report = broadcast_to_meeting(
        directory,
        header,
        ManagedOperation::UserTalkingStateStream,
        &item,
    );

    let user_id = header.user_id_or(&body.int_id);
    if body.talking {
        caches.talk.store(&header.meeting_id, user_id, item);
    } else {
        caches.talk.remove_user(&header.meeting_id, user_id);
    }
    report
}

pub(super) fn handle_user_voice_state(
    directory: &ConnectionDirectory,
    caches: &VoiceStateCaches,
    header: &EventHeader,
    body: &UserVoiceState,
) -> DispatchReport {
    let item = VoiceStateItem {
        user_id: body.user_id.clone(),
        voice_user_id: body.voice_user_id.clone(),
        muted: body.muted,
        talking: body.talking,
        user: UserRef {
            color: body.user_color.clone(),
            name: body.user_name.clone(),
            speech_locale: body.user_speech_locale.clone(),
            typename: USER_REF_TYPENAME,
        },
        voice_activity_at: stream_timestamp_now(),
        typename: VOICE_ACTIVITY_TYPENAME,
    };

    let report = broadcast_to_meeting(
        directory,
        header,
        ManagedOperation::UserVoiceStateStream,
        &item,
    );

    let user_id = header.user_id_or(&body.user_id);
    if item.is_noteworthy() {
        caches.voice.store(&header.meeting_id, user_id, item);
    } else {
        caches.voice.remove_user(&header.meeting_id, user_id);
    }
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::connection::Authorizations;
    use crate::router::test_support::{attach, drain};

    fn header(meeting: &str, user: Option<&str>) -> EventHeader {
        EventHeader {
            name: "UserVoiceStateEvtMsg".to_string(),
            meeting_id: meeting.to_string(),
            user_id: user.map(str::to_string),
        }
    }

    fn voice_state(talking: bool, muted: bool) -> UserVoiceState {
        UserVoiceState {
            user_id: "u1".to_string(),
            voice_user_id: "v1".to_string(),
            user_name: "Ana".to_string(),
            user_color: "#112233".to_string(),
            user_speech_locale: "pt-BR".to_string(),
            talking,
            muted,
        }
    }

    #[test]
    fn test_mute_cache_keeps_only_unmuted_users() {
        let directory = ConnectionDirectory::new();
        let caches = VoiceStateCaches::new();
        let unmute = UserMutedVoice {
            int_id: "u1".to_string(),
            muted: false,
        };
        let mute = UserMutedVoice {
            int_id: "u1".to_string(),
            muted: true,
        };

        handle_user_muted(&directory, &caches, &header("m1", Some("u1")), &unmute);
        let rows = caches.mute.get("m1").unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows["u1"].muted);

        handle_user_muted(&directory, &caches, &header("m1", Some("u1")), &mute);
        assert!(caches.mute.get("m1").unwrap().is_empty());
    }

    #[test]
    fn test_talk_cache_keeps_only_talking_users() {
        let directory = ConnectionDirectory::new();
        let caches = VoiceStateCaches::new();

        let talking = UserTalkingVoice {
            int_id: "u1".to_string(),
            talking: true,
        };
        handle_user_talking(&directory, &caches, &header("m1", None), &talking);
        assert!(caches.talk.get("m1").unwrap().contains_key("u1"));

        let silent = UserTalkingVoice {
            int_id: "u1".to_string(),
            talking: false,
        };
        handle_user_talking(&directory, &caches, &header("m1", None), &silent);
        assert!(!caches.talk.get("m1").unwrap().contains_key("u1"));
    }

    #[test]
    fn test_voice_cache_policy() {
        let directory = ConnectionDirectory::new();
        let caches = VoiceStateCaches::new();
        let h = header("m1", Some("u1"));

        handle_user_voice_state(&directory, &caches, &h, &voice_state(false, false));
        assert!(caches.voice.get("m1").unwrap().contains_key("u1"));

        handle_user_voice_state(&directory, &caches, &h, &voice_state(true, true));
        assert!(caches.voice.get("m1").unwrap()["u1"].talking);

        handle_user_voice_state(&directory, &caches, &h, &voice_state(false, true));
        assert!(caches.voice.get("m1").unwrap().is_empty());
    }

    #[test]
    fn test_voice_state_fans_out_to_meeting_subscribers() {
        let directory = ConnectionDirectory::new();
        let caches = VoiceStateCaches::new();
        let mut subscribed = attach(
            &directory,
            "c1",
            "m1",
            "u9",
            Authorizations::new(),
            &[(ManagedOperation::UserVoiceStateStream, "v")],
        );
        let mut muted_only = attach(
            &directory,
            "c2",
            "m1",
            "u8",
            Authorizations::new(),
            &[(ManagedOperation::UserMutedStateStream, "m")],
        );

        let report = handle_user_voice_state(
            &directory,
            &caches,
            &header("m1", Some("u1")),
            &voice_state(true, false),
        );

        assert_eq!(report.eligible, 2);
        assert_eq!(report.delivered, 1);
        let frames = drain(&mut subscribed);
        let item = &frames[0]["payload"]["data"]["user_voice_activity_stream"][0];
        assert_eq!(frames[0]["id"], "v");
        assert_eq!(item["voiceUserId"], "v1");
        assert_eq!(item["user"]["name"], "Ana");
        assert_eq!(item["user"]["speechLocale"], "pt-BR");
        assert!(drain(&mut muted_only).is_empty());
    }
}
