//! Per-user affect state.
//!
//! Eight scalar scores in `[0, 1]` tracking how the persona feels about a
//! user. There is deliberately no sum-to-one constraint: `neutral` is a
//! derived leftover recomputed by the update logic in samovar-core, and
//! the vector drifts toward the clamp boundaries under sustained
//! one-directional sentiment. That looseness is observed behavior, kept
//! as-is.

use serde::{Deserialize, Serialize};

/// Affect scores the persona holds toward one user.
///
/// All fields are clamped to `[0, 1]` after every mutation. A fresh state
/// is fully neutral: `neutral = 1.0`, everything else `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipState {
    pub infatuation: f32,
    pub love: f32,
    pub liking: f32,
    pub neutral: f32,
    pub disliking: f32,
    pub hatred: f32,
    pub trolling: f32,
    pub trust: f32,
}

impl Default for RelationshipState {
    fn default() -> Self {
        Self {
            infatuation: 0.0,
            love: 0.0,
            liking: 0.0,
            neutral: 1.0,
            disliking: 0.0,
            hatred: 0.0,
            trolling: 0.0,
            trust: 0.0,
        }
    }
}

impl RelationshipState {
    /// Restore the default-constructed values in place.
    ///
    /// Used by TTL eviction and the explicit reset command; the state is
    /// reset, never removed, so the user keeps a profile.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Sum of the positive affect bucket (infatuation + love + liking).
    pub fn positive_sum(&self) -> f32 {
        self.infatuation + self.love + self.liking
    }

    /// Sum of the negative affect bucket (disliking + hatred + trolling).
    pub fn negative_sum(&self) -> f32 {
        self.disliking + self.hatred + self.trolling
    }

    /// Clamp every field to `[0, 1]`.
    pub fn clamp_all(&mut self) {
        self.infatuation = self.infatuation.clamp(0.0, 1.0);
        self.love = self.love.clamp(0.0, 1.0);
        self.liking = self.liking.clamp(0.0, 1.0);
        self.neutral = self.neutral.clamp(0.0, 1.0);
        self.disliking = self.disliking.clamp(0.0, 1.0);
        self.hatred = self.hatred.clamp(0.0, 1.0);
        self.trolling = self.trolling.clamp(0.0, 1.0);
        self.trust = self.trust.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fully_neutral() {
        let state = RelationshipState::default();
        assert_eq!(state.neutral, 1.0);
        assert_eq!(state.liking, 0.0);
        assert_eq!(state.trust, 0.0);
        assert_eq!(state.positive_sum(), 0.0);
        assert_eq!(state.negative_sum(), 0.0);
    }

    #[test]
    fn test_reset_restores_default() {
        let mut state = RelationshipState {
            liking: 0.9,
            trust: 0.4,
            neutral: 0.1,
            ..Default::default()
        };
        state.reset();
        assert_eq!(state, RelationshipState::default());
    }

    #[test]
    fn test_clamp_all() {
        let mut state = RelationshipState {
            liking: 1.7,
            disliking: -0.4,
            neutral: 0.5,
            ..Default::default()
        };
        state.clamp_all();
        assert_eq!(state.liking, 1.0);
        assert_eq!(state.disliking, 0.0);
        assert_eq!(state.neutral, 0.5);
    }

    #[test]
    fn test_serde_missing_fields_use_defaults() {
        // Older persisted records may predate a field; serde(default) keeps
        // them loadable.
        let state: RelationshipState = serde_json::from_str(r#"{"liking": 0.3}"#).unwrap();
        assert_eq!(state.liking, 0.3);
        assert_eq!(state.neutral, 1.0);
        assert_eq!(state.trust, 0.0);
    }
}
