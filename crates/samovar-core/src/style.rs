//! Effective-style resolution.

use std::sync::Arc;

use samovar_types::conversation::{ChatKind, ConversationKey, UserId};

use crate::relationship;
use crate::state::StateManager;

/// Merges explicit overrides, relationship-derived directives, and the
/// global default persona style into one effective style string.
#[derive(Debug, Clone)]
pub struct StyleResolver {
    state: Arc<StateManager>,
}

impl StyleResolver {
    pub fn new(state: Arc<StateManager>) -> Self {
        Self { state }
    }

    /// First non-empty source wins: per-(group, user) override, then the
    /// relationship rule ladder, then the default style with the persona
    /// name prefixed if it is not already mentioned. Always returns a
    /// usable string.
    pub fn resolve(
        &self,
        key: &ConversationKey,
        user_id: UserId,
        user_name: &str,
        kind: ChatKind,
    ) -> String {
        if kind.is_group() {
            if let Some(group) = key.as_group() {
                if let Some(style) = self.state.style_override(group, user_id) {
                    if !style.trim().is_empty() {
                        return style;
                    }
                }
            }
        }

        let settings = self.state.settings();
        let address = self.state.address_name(user_id, user_name);

        if let Some(state) = self.state.relationship(user_id) {
            if let Some(directive) =
                relationship::style_directive(&state, &settings.persona_name, &address)
            {
                return directive;
            }
        }

        let default = settings.default_style;
        if default
            .to_lowercase()
            .contains(&settings.persona_name.to_lowercase())
        {
            default
        } else {
            format!("You are {}. {default}", settings.persona_name)
        }
    }
}
