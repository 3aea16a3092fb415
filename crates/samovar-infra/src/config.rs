//! Settings loader and data-directory resolution.
//!
//! Reads `config.toml` from the data directory and falls back to defaults
//! when the file is missing or malformed. A bad config file must never
//! keep the bot from starting; persisted settings overwrite these anyway
//! once the state store is loaded.

use std::path::{Path, PathBuf};

use samovar_types::config::Settings;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SAMOVAR_DATA_DIR";

/// Directory under the home directory used when no override is set.
const DEFAULT_DIR_NAME: &str = ".samovar";

/// Resolve the data directory: `$SAMOVAR_DATA_DIR` if set, otherwise
/// `~/.samovar`, otherwise `./.samovar` when no home directory exists.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    match dirs::home_dir() {
        Some(home) => home.join(DEFAULT_DIR_NAME),
        None => PathBuf::from(DEFAULT_DIR_NAME),
    }
}

/// Load settings from `{data_dir}/config.toml`.
///
/// Missing file: defaults, silently. Unreadable or unparseable file:
/// defaults, with a warning.
pub async fn load_settings(data_dir: &Path) -> Settings {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config.toml at {}, using defaults", config_path.display());
            return Settings::default();
        }
        Err(err) => {
            tracing::warn!("failed to read {}: {err}, using defaults", config_path.display());
            return Settings::default();
        }
    };

    match toml::from_str::<Settings>(&content) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(
                "failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            Settings::default()
        }
    }
}
