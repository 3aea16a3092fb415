//! JSON file persistence for the bot state.
//!
//! Layout under the data directory: `knowledge.json` holds everything
//! conversation-scoped (settings, histories, overrides, learned
//! responses, probabilities, mutes); each user profile lives in its own
//! `user_<id>.json`. Writes go through a temp file followed by a rename,
//! so a crash mid-save leaves the previous file intact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::HashMap;

use samovar_core::store::StateStore;
use samovar_types::config::Settings;
use samovar_types::conversation::ConversationKey;
use samovar_types::error::PersistenceError;
use samovar_types::history::HistoryEntry;
use samovar_types::persist::{MuteEntry, PersistedState, StyleOverride};
use samovar_types::profile::UserProfile;

const KNOWLEDGE_FILE: &str = "knowledge.json";
const USER_FILE_PREFIX: &str = "user_";

/// Everything persisted outside the per-user profile files.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct KnowledgeFile {
    settings: Settings,
    histories: HashMap<ConversationKey, Vec<HistoryEntry>>,
    last_activity: HashMap<ConversationKey, DateTime<Utc>>,
    style_overrides: Vec<StyleOverride>,
    learned_responses: HashMap<String, String>,
    proactive_probabilities: HashMap<ConversationKey, f64>,
    mutes: Vec<MuteEntry>,
}

/// [`StateStore`] over a directory of JSON files.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    data_dir: PathBuf,
}

impl JsonStateStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn knowledge_path(&self) -> PathBuf {
        self.data_dir.join(KNOWLEDGE_FILE)
    }

    fn user_path(&self, profile: &UserProfile) -> PathBuf {
        self.data_dir
            .join(format!("{USER_FILE_PREFIX}{}.json", profile.user_id))
    }

    async fn load_knowledge(&self) -> Result<Option<KnowledgeFile>, PersistenceError> {
        let path = self.knowledge_path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PersistenceError::Io(err.to_string())),
        };
        let knowledge = serde_json::from_str(&content).map_err(|err| {
            PersistenceError::Corrupt(format!("{}: {err}", path.display()))
        })?;
        Ok(Some(knowledge))
    }

    /// Collect all parseable `user_<id>.json` profiles. Unreadable or
    /// corrupt individual files are logged and skipped; one bad profile
    /// must not lose the rest.
    async fn load_profiles(&self) -> Result<Vec<UserProfile>, PersistenceError> {
        let mut dir = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(PersistenceError::Io(err.to_string())),
        };

        let mut profiles = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|err| PersistenceError::Io(err.to_string()))?
        {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(USER_FILE_PREFIX) || !name.ends_with(".json") {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<UserProfile>(&content) {
                    Ok(profile) => profiles.push(profile),
                    Err(err) => {
                        tracing::warn!("skipping corrupt profile {}: {err}", path.display());
                    }
                },
                Err(err) => {
                    tracing::warn!("skipping unreadable profile {}: {err}", path.display());
                }
            }
        }
        Ok(profiles)
    }
}

impl StateStore for JsonStateStore {
    /// `Ok(None)` on a clean first run (no knowledge file and no profile
    /// files); the caller initializes empty state instead of treating a
    /// missing store as an error.
    async fn try_load(&self) -> Result<Option<PersistedState>, PersistenceError> {
        let knowledge = self.load_knowledge().await?;
        let profiles = self.load_profiles().await?;

        if knowledge.is_none() && profiles.is_empty() {
            return Ok(None);
        }

        let knowledge = knowledge.unwrap_or_default();
        Ok(Some(PersistedState {
            settings: knowledge.settings,
            profiles,
            histories: knowledge.histories,
            last_activity: knowledge.last_activity,
            style_overrides: knowledge.style_overrides,
            learned_responses: knowledge.learned_responses,
            proactive_probabilities: knowledge.proactive_probabilities,
            mutes: knowledge.mutes,
        }))
    }

    async fn save(&self, state: &PersistedState) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|err| PersistenceError::Io(err.to_string()))?;

        let knowledge = KnowledgeFile {
            settings: state.settings.clone(),
            histories: state.histories.clone(),
            last_activity: state.last_activity.clone(),
            style_overrides: state.style_overrides.clone(),
            learned_responses: state.learned_responses.clone(),
            proactive_probabilities: state.proactive_probabilities.clone(),
            mutes: state.mutes.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&knowledge)
            .map_err(|err| PersistenceError::Corrupt(err.to_string()))?;
        write_atomic(&self.knowledge_path(), &bytes).await?;

        for profile in &state.profiles {
            let bytes = serde_json::to_vec_pretty(profile)
                .map_err(|err| PersistenceError::Corrupt(err.to_string()))?;
            write_atomic(&self.user_path(profile), &bytes).await?;
        }

        tracing::debug!(
            profiles = state.profiles.len(),
            conversations = state.histories.len(),
            "state saved to {}",
            self.data_dir.display()
        );
        Ok(())
    }
}

/// Write via a sibling temp file plus rename, so readers never observe a
/// half-written file.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|err| PersistenceError::Io(err.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|err| PersistenceError::Io(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    use samovar_types::conversation::{GroupId, UserId};
    use samovar_types::history::Role;

    fn sample_state() -> PersistedState {
        let mut state = PersistedState::default();
        let key = ConversationKey::Group(GroupId(-42));
        let now = Utc::now();

        let mut profile = UserProfile::new(UserId(7), "Alice", now);
        profile.preferred_name = Some("Ali".to_string());
        profile.relationship.liking = 0.5;
        state.profiles.push(profile);
        state.profiles.push(UserProfile::new(UserId(-3), "Bob", now));

        state.histories.insert(
            key,
            vec![HistoryEntry {
                role: Role::User,
                speaker: Some("Ali".to_string()),
                text: "hello".to_string(),
                seq: 3,
            }],
        );
        state.last_activity.insert(key, now);
        state.style_overrides.push(StyleOverride {
            group: GroupId(-42),
            user: UserId(7),
            style: "be terse".to_string(),
        });
        state
            .learned_responses
            .insert("hi".to_string(), "hey".to_string());
        state.proactive_probabilities.insert(key, 0.15);
        state.mutes.push(MuteEntry {
            group: GroupId(-42),
            user: UserId(7),
        });
        state
    }

    #[tokio::test]
    async fn test_first_run_loads_none() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStateStore::new(tmp.path());
        assert!(store.try_load().await.unwrap().is_none());

        // Even a missing data directory is a clean first run.
        let store = JsonStateStore::new(tmp.path().join("does-not-exist"));
        assert!(store.try_load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStateStore::new(tmp.path());

        let mut state = sample_state();
        store.save(&state).await.unwrap();

        let mut loaded = store.try_load().await.unwrap().unwrap();
        // Profile file order is directory-dependent.
        state.profiles.sort_by_key(|p| p.user_id.0);
        loaded.profiles.sort_by_key(|p| p.user_id.0);
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStateStore::new(tmp.path());
        store.save(&sample_state()).await.unwrap();

        let mut dir = tokio::fs::read_dir(tmp.path()).await.unwrap();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            assert!(!name.ends_with(".tmp"), "leftover temp file {name}");
        }
    }

    #[tokio::test]
    async fn test_corrupt_profile_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStateStore::new(tmp.path());
        store.save(&sample_state()).await.unwrap();

        tokio::fs::write(tmp.path().join("user_999.json"), "{ broken")
            .await
            .unwrap();

        let loaded = store.try_load().await.unwrap().unwrap();
        assert_eq!(loaded.profiles.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_knowledge_is_an_error() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(KNOWLEDGE_FILE), "not json")
            .await
            .unwrap();

        let store = JsonStateStore::new(tmp.path());
        assert!(matches!(
            store.try_load().await,
            Err(PersistenceError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_unrelated_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "persona_name = \"X\"")
            .await
            .unwrap();

        let store = JsonStateStore::new(tmp.path());
        assert!(store.try_load().await.unwrap().is_none());
    }
}
