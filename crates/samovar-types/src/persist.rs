//! Snapshot types for the persistence boundary.
//!
//! [`PersistedState`] is the structured-record serialization of the whole
//! process state: the state manager produces it with `snapshot()` and
//! consumes it with `restore()`, the store adapter writes and reads it.
//! The on-disk layout (one knowledge file plus one file per user) is an
//! adapter concern; these types only fix what must round-trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::HashMap;

use crate::config::Settings;
use crate::conversation::{ConversationKey, GroupId, UserId};
use crate::history::HistoryEntry;
use crate::profile::UserProfile;

/// One per-(group, user) style override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleOverride {
    pub group: GroupId,
    pub user: UserId,
    pub style: String,
}

/// One per-(group, user) proactive-participation mute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuteEntry {
    pub group: GroupId,
    pub user: UserId,
}

/// The full process state as persisted between restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub settings: Settings,
    pub profiles: Vec<UserProfile>,
    pub histories: HashMap<ConversationKey, Vec<HistoryEntry>>,
    pub last_activity: HashMap<ConversationKey, DateTime<Utc>>,
    pub style_overrides: Vec<StyleOverride>,
    /// Opportunistic input → reply cache. Advisory only; nothing reads it
    /// back to short-circuit generation yet.
    pub learned_responses: HashMap<String, String>,
    pub proactive_probabilities: HashMap<ConversationKey, f64>,
    pub mutes: Vec<MuteEntry>,
}
