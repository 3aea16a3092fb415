//! Application state wiring.
//!
//! Resolves the data directory, loads settings and persisted state, and
//! builds the chat engine from the concrete adapters. Handlers get this
//! via axum's `State` extractor.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;

use samovar_core::engine::ChatEngine;
use samovar_core::state::StateManager;
use samovar_core::store::StateStore;
use samovar_infra::config;
use samovar_infra::llm::ChatCompletionClient;
use samovar_infra::persistence::JsonStateStore;
use samovar_infra::sentiment::LexiconAnalyzer;

/// The concrete engine this binary runs.
pub type Engine = ChatEngine<ChatCompletionClient, LexiconAnalyzer>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub store: JsonStateStore,
    /// The default style from config.toml, kept so the admin "reset
    /// style" endpoint can restore it after runtime edits.
    pub initial_style: String,
}

impl AppState {
    /// Load everything and wire the engine. A missing state store is a
    /// clean first run; a corrupt one logs a warning and starts empty
    /// rather than refusing to boot.
    pub async fn init(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(config::resolve_data_dir);
        tracing::info!(data_dir = %data_dir.display(), "starting");

        let settings = config::load_settings(&data_dir).await;
        let initial_style = settings.default_style.clone();

        let manager = Arc::new(StateManager::new(settings));
        let store = JsonStateStore::new(&data_dir);
        match store.try_load().await {
            Ok(Some(persisted)) => {
                tracing::info!(
                    profiles = persisted.profiles.len(),
                    conversations = persisted.histories.len(),
                    "restored persisted state"
                );
                manager.restore(persisted);
            }
            Ok(None) => tracing::info!("no persisted state, starting fresh"),
            Err(err) => tracing::warn!(error = %err, "could not load state, starting fresh"),
        }

        let api_key = std::env::var("SAMOVAR_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .context("SAMOVAR_API_KEY or OPENAI_API_KEY must be set")?;
        let model =
            std::env::var("SAMOVAR_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let mut client = ChatCompletionClient::new(SecretString::from(api_key), model);
        if let Ok(base_url) = std::env::var("SAMOVAR_LLM_BASE_URL") {
            client = client.with_base_url(base_url);
        }

        let engine = Arc::new(ChatEngine::new(manager, client, LexiconAnalyzer::new()));
        Ok(Self {
            engine,
            store,
            initial_style,
        })
    }

    /// Snapshot current state and write it to disk.
    pub async fn save(&self) -> anyhow::Result<()> {
        let snapshot = self.engine.state().snapshot();
        self.store
            .save(&snapshot)
            .await
            .context("failed to save state")?;
        Ok(())
    }
}
