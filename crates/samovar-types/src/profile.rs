//! User profile record.
//!
//! A fixed record type replacing the ad hoc attribute dictionaries of the
//! original design: optional fields are `Option`, not missing map keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::UserId;
use crate::relationship::RelationshipState;

/// Everything the bot knows about one user.
///
/// Created on first interaction, updated on every interaction, persisted
/// as one record per user, never hard-deleted. The relationship may be
/// reset independently of the rest of the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    /// Platform display name, refreshed on every message.
    pub display_name: String,
    /// Name the user asked to be called, if any. Takes precedence over
    /// `display_name` when addressing the user.
    pub preferred_name: Option<String>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub relationship: RelationshipState,
}

impl UserProfile {
    /// Create a fresh profile for a user seen for the first time.
    pub fn new(user_id: UserId, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            preferred_name: None,
            last_seen: now,
            relationship: RelationshipState::default(),
        }
    }

    /// The name to address this user by: preferred name if set, otherwise
    /// the platform display name.
    pub fn address_name(&self) -> &str {
        self.preferred_name.as_deref().unwrap_or(&self.display_name)
    }
}
