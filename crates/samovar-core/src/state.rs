//! Single owner of all mutable bot state.
//!
//! Every map the pipeline touches (profiles, history, overrides, learned
//! responses, mutes, probabilities, runtime settings) lives behind this
//! one component; nothing outside it mutates state directly. Per-key
//! guards let the engine hold a conversation exclusively across the LLM
//! suspension points, so two messages for the same conversation can never
//! interleave a read-suspend-write span.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};

use samovar_types::config::Settings;
use samovar_types::conversation::{ConversationKey, GroupId, UserId};
use samovar_types::persist::{MuteEntry, PersistedState, StyleOverride};
use samovar_types::profile::UserProfile;
use samovar_types::relationship::RelationshipState;

use crate::history::HistoryStore;

/// Process-wide shared state with per-conversation serialization.
#[derive(Debug, Default)]
pub struct StateManager {
    settings: RwLock<Settings>,
    history: HistoryStore,
    profiles: DashMap<UserId, UserProfile>,
    style_overrides: DashMap<(GroupId, UserId), String>,
    learned_responses: DashMap<String, String>,
    proactive_probabilities: DashMap<ConversationKey, f64>,
    mutes: DashSet<(GroupId, UserId)>,
    /// Last time a correction phrase was seen per group. Not persisted;
    /// the cooldown is short enough that restart losing it is fine.
    corrections: DashMap<GroupId, DateTime<Utc>>,
    key_guards: DashMap<ConversationKey, Arc<tokio::sync::Mutex<()>>>,
}

impl StateManager {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
            ..Self::default()
        }
    }

    // -- settings

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_settings(&self, apply: impl FnOnce(&mut Settings)) {
        let mut settings = self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        apply(&mut settings);
    }

    pub fn set_default_style(&self, style: impl Into<String>) {
        self.update_settings(|s| s.default_style = style.into());
    }

    // -- history

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    // -- profiles and relationships

    /// Create or refresh the profile for a user: display name and
    /// last-seen are updated on every message.
    pub fn upsert_profile(&self, user_id: UserId, display_name: &str, now: DateTime<Utc>) {
        self.profiles
            .entry(user_id)
            .and_modify(|profile| {
                profile.display_name = display_name.to_string();
                profile.last_seen = now;
            })
            .or_insert_with(|| UserProfile::new(user_id, display_name, now));
    }

    pub fn profile(&self, user_id: UserId) -> Option<UserProfile> {
        self.profiles.get(&user_id).map(|p| p.clone())
    }

    /// The name to address a user by; the raw display name when the user
    /// has never been seen.
    pub fn address_name(&self, user_id: UserId, fallback: &str) -> String {
        self.profiles
            .get(&user_id)
            .map(|p| p.address_name().to_string())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn set_preferred_name(&self, user_id: UserId, name: Option<String>) -> bool {
        match self.profiles.get_mut(&user_id) {
            Some(mut profile) => {
                profile.preferred_name = name;
                true
            }
            None => false,
        }
    }

    /// Mutate a user's relationship state in place. No-op for unknown
    /// users; the engine upserts the profile before updating affect.
    pub fn with_relationship(&self, user_id: UserId, apply: impl FnOnce(&mut RelationshipState)) {
        if let Some(mut profile) = self.profiles.get_mut(&user_id) {
            apply(&mut profile.relationship);
        }
    }

    pub fn relationship(&self, user_id: UserId) -> Option<RelationshipState> {
        self.profiles.get(&user_id).map(|p| p.relationship.clone())
    }

    /// Reset (not delete) a user's relationship to the default state.
    /// Returns false when the user is unknown.
    pub fn reset_relationship(&self, user_id: UserId) -> bool {
        match self.profiles.get_mut(&user_id) {
            Some(mut profile) => {
                profile.relationship.reset();
                true
            }
            None => false,
        }
    }

    // -- style overrides

    pub fn style_override(&self, group: GroupId, user: UserId) -> Option<String> {
        self.style_overrides.get(&(group, user)).map(|s| s.clone())
    }

    pub fn set_style_override(&self, group: GroupId, user: UserId, style: impl Into<String>) {
        self.style_overrides.insert((group, user), style.into());
    }

    pub fn remove_style_override(&self, group: GroupId, user: UserId) -> bool {
        self.style_overrides.remove(&(group, user)).is_some()
    }

    // -- learned responses (write-only advisory cache)

    pub fn learn_response(&self, input: impl Into<String>, reply: impl Into<String>) {
        self.learned_responses.insert(input.into(), reply.into());
    }

    #[cfg(test)]
    pub(crate) fn learned_response(&self, input: &str) -> Option<String> {
        self.learned_responses.get(input).map(|r| r.clone())
    }

    // -- proactive probability

    /// Per-conversation probability, falling back to the global default.
    pub fn proactive_probability(&self, key: &ConversationKey) -> f64 {
        self.proactive_probabilities
            .get(key)
            .map(|p| *p)
            .unwrap_or_else(|| self.settings().proactive_probability)
    }

    pub fn set_proactive_probability(&self, key: ConversationKey, probability: f64) {
        self.proactive_probabilities
            .insert(key, probability.clamp(0.0, 1.0));
    }

    // -- mutes

    pub fn is_muted(&self, group: GroupId, user: UserId) -> bool {
        self.mutes.contains(&(group, user))
    }

    /// Returns true when the mute state actually changed.
    pub fn set_muted(&self, group: GroupId, user: UserId, muted: bool) -> bool {
        if muted {
            self.mutes.insert((group, user))
        } else {
            self.mutes.remove(&(group, user)).is_some()
        }
    }

    // -- correction cooldown

    pub fn note_correction(&self, group: GroupId, now: DateTime<Utc>) {
        self.corrections.insert(group, now);
    }

    /// Whether proactive participation is still suppressed for a group.
    /// Expired entries are dropped as a side effect.
    pub fn correction_active(&self, group: GroupId, now: DateTime<Utc>) -> bool {
        let cooldown = Duration::seconds(self.settings().correction_cooldown_secs as i64);
        match self.corrections.get(&group).map(|ts| *ts) {
            Some(ts) if now - ts <= cooldown => true,
            Some(_) => {
                self.corrections.remove(&group);
                false
            }
            None => false,
        }
    }

    // -- per-key serialization

    /// The exclusive guard for a conversation. The engine locks it before
    /// reading state and holds it until the reply is appended, so a
    /// read-suspend-write span cannot interleave with another message for
    /// the same key.
    pub fn key_guard(&self, key: ConversationKey) -> Arc<tokio::sync::Mutex<()>> {
        self.key_guards
            .entry(key)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    // -- maintenance

    /// TTL-evict idle conversations; relationships of evicted one-to-one
    /// peers are reset to default, never deleted. Returns the number of
    /// conversations evicted.
    pub fn evict_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let evicted = self.history.evict_expired(now, ttl);
        for key in &evicted {
            self.proactive_probabilities.remove(key);
            // Key guards are retained: a handler may still hold a clone of
            // the mutex, and handing the next message a fresh one would let
            // the two interleave.
            match key {
                ConversationKey::Direct(user) => {
                    self.reset_relationship(*user);
                }
                ConversationKey::Group(group) => {
                    self.corrections.remove(group);
                }
            }
        }
        evicted.len()
    }

    // -- persistence boundary

    /// Snapshot everything that must survive a restart.
    pub fn snapshot(&self) -> PersistedState {
        let (histories, last_activity) = self.history.export();
        PersistedState {
            settings: self.settings(),
            profiles: self.profiles.iter().map(|p| p.clone()).collect(),
            histories,
            last_activity,
            style_overrides: self
                .style_overrides
                .iter()
                .map(|entry| StyleOverride {
                    group: entry.key().0,
                    user: entry.key().1,
                    style: entry.value().clone(),
                })
                .collect(),
            learned_responses: self
                .learned_responses
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            proactive_probabilities: self
                .proactive_probabilities
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
            mutes: self
                .mutes
                .iter()
                .map(|pair| MuteEntry {
                    group: pair.0,
                    user: pair.1,
                })
                .collect(),
        }
    }

    /// Replace all state with a persisted snapshot.
    pub fn restore(&self, state: PersistedState) {
        self.update_settings(|s| *s = state.settings);
        self.history.import(state.histories, state.last_activity);

        self.profiles.clear();
        for profile in state.profiles {
            self.profiles.insert(profile.user_id, profile);
        }

        self.style_overrides.clear();
        for entry in state.style_overrides {
            self.style_overrides
                .insert((entry.group, entry.user), entry.style);
        }

        self.learned_responses.clear();
        for (input, reply) in state.learned_responses {
            self.learned_responses.insert(input, reply);
        }

        self.proactive_probabilities.clear();
        for (key, probability) in state.proactive_probabilities {
            self.proactive_probabilities.insert(key, probability);
        }

        self.mutes.clear();
        for entry in state.mutes {
            self.mutes.insert((entry.group, entry.user));
        }
    }
}
