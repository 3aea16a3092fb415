//! Runtime settings for the bot.
//!
//! Loaded from `config.toml` at startup (see samovar-infra), mutable at
//! runtime through admin endpoints, and persisted alongside the rest of
//! the state so administrator changes survive restarts.

use serde::{Deserialize, Serialize};

fn default_persona_name() -> String {
    "Masha".to_string()
}

fn default_bot_handle() -> String {
    "masha_bot".to_string()
}

fn default_style() -> String {
    "You are Masha, a cheerful and outgoing 25-year-old. You chat in a \
     relaxed, very human way, keep the conversation going with new topics, \
     and always answer in the first person, as yourself."
        .to_string()
}

fn default_max_history() -> usize {
    30
}

fn default_history_ttl_secs() -> u64 {
    86_400
}

fn default_proactive_probability() -> f64 {
    0.3
}

fn default_mood_check_factor() -> f64 {
    0.3
}

fn default_correction_cooldown_secs() -> u64 {
    30
}

fn default_learned_response_max_words() -> usize {
    10
}

/// Process-wide bot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The persona's name, used for mention detection and prompt cues.
    pub persona_name: String,
    /// The bot's platform username/handle, also matched for mentions.
    pub bot_handle: String,
    /// Global default persona style directive.
    pub default_style: String,
    /// Maximum entries kept per conversation (FIFO beyond this bound).
    pub max_history: usize,
    /// Inactivity duration after which a conversation's history is evicted.
    pub history_ttl_secs: u64,
    /// Global fallback probability for proactive participation in groups.
    pub proactive_probability: f64,
    /// Fraction of the proactive probability at which a mood/topic
    /// classification runs before the participation check.
    pub mood_check_factor: f64,
    /// How long proactive participation stays suppressed after the bot is
    /// corrected by a user.
    pub correction_cooldown_secs: u64,
    /// Inputs at most this many words are cached in learned responses.
    pub learned_response_max_words: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            persona_name: default_persona_name(),
            bot_handle: default_bot_handle(),
            default_style: default_style(),
            max_history: default_max_history(),
            history_ttl_secs: default_history_ttl_secs(),
            proactive_probability: default_proactive_probability(),
            mood_check_factor: default_mood_check_factor(),
            correction_cooldown_secs: default_correction_cooldown_secs(),
            learned_response_max_words: default_learned_response_max_words(),
        }
    }
}
