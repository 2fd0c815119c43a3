//! Last-value state caches used to catch up late subscribers.
//!
//! Each cache keeps, per meeting, only the most recent item per user. A new
//! item for the same user replaces the old one wholesale; there is no
//! history and no TTL. Rows are evicted semantically, when the state they
//! describe goes back to the uninteresting default (muted, silent).
//!
//! `get` hands out an owned copy of the meeting's rows, so a consumer
//! iterating a snapshot is never affected by concurrent `store`/`remove`
//! calls and cannot reach back into the cache.

use crate::items::{MuteStateItem, TalkStateItem, VoiceStateItem};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// A last-value store keyed by (meeting id, user id).
#[derive(Debug)]
pub struct StateCache<T> {
    /// Cache name for logging.
    name: &'static str,
    /// meeting_id -> user_id -> item
    meetings: RwLock<HashMap<String, HashMap<String, T>>>,
}

impl<T: Clone> StateCache<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            meetings: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Independent copy of every row cached for `meeting_id`.
    ///
    /// Returns `None` if nothing was ever stored for the meeting (or it was
    /// removed). A meeting whose users were all evicted returns an empty map.
    #[must_use]
    pub fn get(&self, meeting_id: &str) -> Option<HashMap<String, T>> {
        self.meetings.read().get(meeting_id).cloned()
    }

    /// Insert or overwrite the row for (`meeting_id`, `user_id`).
    pub fn store(&self, meeting_id: &str, user_id: &str, item: T) {
        self.meetings
            .write()
            .entry(meeting_id.to_string())
            .or_default()
            .insert(user_id.to_string(), item);
    }

    /// Drop the row for (`meeting_id`, `user_id`), if any.
    pub fn remove_user(&self, meeting_id: &str, user_id: &str) {
        if let Some(rows) = self.meetings.write().get_mut(meeting_id) {
            rows.remove(user_id);
        }
    }

    /// Drop every row for `meeting_id`.
    pub fn remove_meeting(&self, meeting_id: &str) {
        if self.meetings.write().remove(meeting_id).is_some() {
            debug!(
                target: "gw.cache",
                cache = self.name,
                meeting_id = %meeting_id,
                "Removed meeting from cache"
            );
        }
    }

    /// Number of meetings currently tracked.
    #[must_use]
    pub fn meeting_count(&self) -> usize {
        self.meetings.read().len()
    }
}

/// The three voice caches, each behind its own lock.
#[derive(Debug)]
pub struct VoiceStateCaches {
    /// Users who are unmuted.
    pub mute: StateCache<MuteStateItem>,
    /// Users who are talking.
    pub talk: StateCache<TalkStateItem>,
    /// Users who are talking or unmuted.
    pub voice: StateCache<VoiceStateItem>,
}

impl Default for VoiceStateCaches {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceStateCaches {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mute: StateCache::new("mute"),
            talk: StateCache::new("talk"),
            voice: StateCache::new("voice"),
        }
    }

    /// Forget a meeting in all three caches (meeting ended).
    pub fn remove_meeting(&self, meeting_id: &str) {
        self.mute.remove_meeting(meeting_id);
        self.talk.remove_meeting(meeting_id);
        self.voice.remove_meeting(meeting_id);
    }
}
