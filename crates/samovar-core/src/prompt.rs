//! Prompt rendering and post-generation text cleanup.
//!
//! The assembler turns bounded history plus the effective style into the
//! flat transcript format the completion endpoint sees. The system line
//! is rendered fresh on every turn and never stored into history, so a
//! style change takes effect immediately without rewriting old entries.

use samovar_types::conversation::ChatKind;
use samovar_types::history::{HistoryEntry, Role};

/// Everything one render needs, borrowed from the caller.
#[derive(Debug)]
pub struct PromptInputs<'a> {
    pub history: &'a [HistoryEntry],
    pub style: &'a str,
    pub topic: Option<&'a str>,
    pub user_name: &'a str,
    pub kind: ChatKind,
    pub persona_name: &'a str,
}

/// Renders history + style + metadata into the text sent for generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler;

impl PromptAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Concatenate, in order: the system line, the bounded history, a
    /// participant roster for group chats, and a trailing cue naming the
    /// persona so the model continues as the same speaker.
    pub fn render(&self, inputs: &PromptInputs<'_>) -> String {
        let mut lines = Vec::with_capacity(inputs.history.len() + 4);

        let mut system = format!(
            "System: {} You are talking with {}; address them by name. \
             Always answer in the first person, as yourself.",
            inputs.style.trim(),
            inputs.user_name,
        );
        if let Some(topic) = inputs.topic {
            let topic = topic.trim();
            if !topic.is_empty() {
                system.push_str(&format!(" Current chat topic: {topic}."));
            }
        }
        lines.push(system);

        for entry in inputs.history {
            lines.push(entry.render_line());
        }

        if inputs.kind == ChatKind::Group {
            let participants = participant_names(inputs.history);
            if !participants.is_empty() {
                lines.push(format!(
                    "System: People in this chat: {}.",
                    participants.join(", ")
                ));
            }
        }

        lines.push(format!("{}:", inputs.persona_name));
        lines.join("\n")
    }
}

/// Unique speaker names from user entries, oldest first.
fn participant_names(history: &[HistoryEntry]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for entry in history {
        if entry.role != Role::User {
            continue;
        }
        if let Some(name) = entry.speaker.as_deref() {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Clean up raw model output: unwrap JSON artifacts, drop code fences,
/// strip role-label echoes, collapse blank lines.
///
/// Applied to its own output it is a no-op; each inner pass only ever
/// shrinks the text, so iterating to a fixpoint terminates.
pub fn filter_response(text: &str, persona_name: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = filter_pass(&current, persona_name);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn filter_pass(text: &str, persona_name: &str) -> String {
    let trimmed = text.trim();

    // Models occasionally wrap the answer in JSON. Unwrap a quoted string
    // or a {"response": …} object; any other JSON object or array carries
    // no usable text.
    if trimmed.starts_with('{') || trimmed.starts_with('[') || trimmed.starts_with('"') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            match value {
                serde_json::Value::String(inner) => return inner,
                serde_json::Value::Object(map) => {
                    return match map.get("response").and_then(|v| v.as_str()) {
                        Some(inner) => inner.to_string(),
                        None => String::new(),
                    };
                }
                serde_json::Value::Array(_) => return String::new(),
                _ => {}
            }
        }
    }

    let mut out: Vec<String> = Vec::new();
    let mut in_fence = false;
    for raw_line in trimmed.lines() {
        let line = raw_line.trim();
        if line.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let mut line = line.to_string();
        // Strip stacked role-label echoes ("Assistant: Masha: hi").
        loop {
            match strip_role_label(&line, persona_name) {
                Some(rest) => line = rest.trim_start().to_string(),
                None => break,
            }
        }
        line.retain(|c| c != '`');
        let line = line.trim();
        if !line.is_empty() {
            out.push(line.to_string());
        }
    }
    out.join("\n")
}

/// If the line starts with a role label ("User:", "Assistant (x):",
/// "System:", or the persona's own name), return the remainder.
fn strip_role_label<'a>(line: &'a str, persona_name: &str) -> Option<&'a str> {
    let lower = line.to_lowercase();
    let persona = persona_name.to_lowercase();
    for label in ["system", "assistant", "user", persona.as_str()] {
        if label.is_empty() || !lower.starts_with(label) {
            continue;
        }
        // Lowercasing can shift byte offsets for exotic scripts; bail on
        // any boundary mismatch instead of slicing blindly.
        let Some(tail) = line.get(label.len()..) else {
            continue;
        };
        let mut rest = tail;
        // Optional parenthesized speaker between label and colon.
        let after_paren = rest.trim_start();
        if after_paren.starts_with('(') {
            if let Some(close) = after_paren.find(')') {
                rest = &after_paren[close + 1..];
            }
        }
        let rest = rest.trim_start();
        if let Some(stripped) = rest.strip_prefix(':') {
            return Some(stripped);
        }
    }
    None
}
