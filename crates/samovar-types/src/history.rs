//! Conversation history entry types.
//!
//! Entries are immutable once created and carry their insertion order so
//! a restored history preserves the exact sequence it was saved with.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Capitalized -- this is the role tag that appears in prompt transcripts.
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
            Role::System => write!(f, "System"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("invalid role: '{other}'")),
        }
    }
}

/// A single record in a conversation's bounded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    /// Display name of the speaker; set for user entries in group chats.
    pub speaker: Option<String>,
    pub text: String,
    /// Insertion order within the conversation, monotonically increasing.
    pub seq: u64,
}

impl HistoryEntry {
    /// Render the entry as one transcript line.
    ///
    /// User entries with a known speaker render as `User (Alice): hi`;
    /// everything else as `Role: text`.
    pub fn render_line(&self) -> String {
        match (&self.role, &self.speaker) {
            (Role::User, Some(name)) => format!("{} ({}): {}", self.role, name, self.text),
            _ => format!("{}: {}", self.role, self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::User, Role::Assistant, Role::System] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_render_line_user_with_speaker() {
        let entry = HistoryEntry {
            role: Role::User,
            speaker: Some("Alice".to_string()),
            text: "hi there".to_string(),
            seq: 0,
        };
        assert_eq!(entry.render_line(), "User (Alice): hi there");
    }

    #[test]
    fn test_render_line_assistant_ignores_speaker() {
        let entry = HistoryEntry {
            role: Role::Assistant,
            speaker: Some("should not appear".to_string()),
            text: "hello".to_string(),
            seq: 3,
        };
        assert_eq!(entry.render_line(), "Assistant: hello");
    }

    #[test]
    fn test_render_line_system() {
        let entry = HistoryEntry {
            role: Role::System,
            speaker: None,
            text: "style directive".to_string(),
            seq: 1,
        };
        assert_eq!(entry.render_line(), "System: style directive");
    }
}
