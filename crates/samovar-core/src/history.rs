//! Bounded per-conversation message log with TTL-based eviction.
//!
//! Each conversation holds at most `max_history` entries; the oldest is
//! dropped first on overflow (ring-buffer semantics). A parallel
//! last-activity map drives TTL eviction, which removes whole
//! conversations after a period of inactivity so the number of tracked
//! conversations stays bounded too, not just their size.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use samovar_types::conversation::ConversationKey;
use samovar_types::history::{HistoryEntry, Role};

#[derive(Debug, Default)]
struct ConversationLog {
    entries: std::collections::VecDeque<HistoryEntry>,
    next_seq: u64,
}

/// Bounded ordered history per conversation plus last-activity tracking.
///
/// Invariants:
/// - `len(history(key)) <= max_history` after every append.
/// - Eviction never reorders the remaining entries.
/// - A key present in the activity map is (or was) present in the history map.
#[derive(Debug, Default)]
pub struct HistoryStore {
    logs: DashMap<ConversationKey, ConversationLog>,
    last_activity: DashMap<ConversationKey, DateTime<Utc>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, evicting the oldest first if the conversation is
    /// at capacity, and bump the conversation's last-activity timestamp.
    ///
    /// Always succeeds; there are no error conditions.
    pub fn append(
        &self,
        key: ConversationKey,
        role: Role,
        text: impl Into<String>,
        speaker: Option<String>,
        max_history: usize,
        now: DateTime<Utc>,
    ) {
        let mut log = self.logs.entry(key).or_default();
        while log.entries.len() >= max_history.max(1) {
            log.entries.pop_front();
        }
        let seq = log.next_seq;
        log.next_seq += 1;
        log.entries.push_back(HistoryEntry {
            role,
            speaker,
            text: text.into(),
            seq,
        });
        drop(log);
        self.last_activity.insert(key, now);
    }

    /// Current entries in insertion order, oldest first. Empty for
    /// unknown keys.
    pub fn get(&self, key: &ConversationKey) -> Vec<HistoryEntry> {
        self.logs
            .get(key)
            .map(|log| log.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, key: &ConversationKey) -> usize {
        self.logs.get(key).map(|log| log.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, key: &ConversationKey) -> bool {
        self.len(key) == 0
    }

    /// Text of the newest Assistant entry, if any. Input for the
    /// contextual-continuation gate.
    pub fn last_assistant_text(&self, key: &ConversationKey) -> Option<String> {
        self.logs.get(key).and_then(|log| {
            log.entries
                .iter()
                .rev()
                .find(|entry| entry.role == Role::Assistant)
                .map(|entry| entry.text.clone())
        })
    }

    /// Drop a conversation's entries but keep it tracked (its activity
    /// timestamp survives, so it ages out normally).
    pub fn clear(&self, key: &ConversationKey) {
        if let Some(mut log) = self.logs.get_mut(key) {
            log.entries.clear();
        }
    }

    /// Remove a conversation entirely: entries and activity timestamp.
    pub fn remove(&self, key: &ConversationKey) {
        self.logs.remove(key);
        self.last_activity.remove(key);
    }

    pub fn last_activity(&self, key: &ConversationKey) -> Option<DateTime<Utc>> {
        self.last_activity.get(key).map(|ts| *ts)
    }

    /// Number of tracked conversations.
    pub fn conversation_count(&self) -> usize {
        self.logs.len()
    }

    /// Remove every conversation idle for longer than `ttl` and return
    /// the evicted keys (the caller resets relationship state for direct
    /// conversations).
    pub fn evict_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<ConversationKey> {
        let expired: Vec<ConversationKey> = self
            .last_activity
            .iter()
            .filter(|entry| now - *entry.value() > ttl)
            .map(|entry| *entry.key())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired
    }

    /// Snapshot all histories for persistence.
    pub fn export(
        &self,
    ) -> (
        std::collections::HashMap<ConversationKey, Vec<HistoryEntry>>,
        std::collections::HashMap<ConversationKey, DateTime<Utc>>,
    ) {
        let histories = self
            .logs
            .iter()
            .map(|entry| (*entry.key(), entry.value().entries.iter().cloned().collect()))
            .collect();
        let activity = self
            .last_activity
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        (histories, activity)
    }

    /// Restore histories from a persisted snapshot, replacing any current
    /// content. Sequence counters resume after the highest restored seq.
    pub fn import(
        &self,
        histories: std::collections::HashMap<ConversationKey, Vec<HistoryEntry>>,
        activity: std::collections::HashMap<ConversationKey, DateTime<Utc>>,
    ) {
        self.logs.clear();
        self.last_activity.clear();
        for (key, entries) in histories {
            let next_seq = entries.iter().map(|e| e.seq + 1).max().unwrap_or(0);
            self.logs.insert(
                key,
                ConversationLog {
                    entries: entries.into(),
                    next_seq,
                },
            );
        }
        for (key, ts) in activity {
            self.last_activity.insert(key, ts);
        }
    }
}
