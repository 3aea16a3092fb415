//! Affect-score updates and the style-directive rule ladder.
//!
//! The update is a simple linear shift with clamping, not a proper EMA:
//! there is no normalization against message count, so sustained
//! one-directional sentiment drifts the score to the clamp boundary.
//! That matches the observed behavior of the system this replaces and is
//! deliberately not "fixed".

use samovar_types::relationship::RelationshipState;

/// How far one maximally-charged message shifts liking/disliking:
/// roughly ten strongly negative messages move a score across its range.
pub const SENTIMENT_GAIN: f32 = 0.1;

/// Fraction of the liking/disliking level folded into trust per update.
pub const TRUST_GAIN: f32 = 0.05;

/// Fold one sentiment observation (`[-1, 1]`) into the state.
///
/// Every field ends within `[0, 1]`; `neutral` is recomputed as the
/// clamped leftover after the positive and negative buckets.
pub fn update(state: &mut RelationshipState, sentiment: f32) {
    let s = sentiment.clamp(-1.0, 1.0);
    state.liking = (state.liking + s * SENTIMENT_GAIN).clamp(0.0, 1.0);
    state.disliking = (state.disliking - s * SENTIMENT_GAIN).clamp(0.0, 1.0);
    state.trust = (state.trust + state.liking * TRUST_GAIN - state.disliking * TRUST_GAIN)
        .clamp(0.0, 1.0);
    state.neutral = (1.0 - state.positive_sum() - state.negative_sum()).clamp(0.0, 1.0);
}

/// Affect labels a content-classification pass may assign to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffectLabel {
    Infatuation,
    Love,
    Liking,
    Neutral,
    Disliking,
    Hatred,
    Trolling,
}

impl AffectLabel {
    /// Parse every label named in a free-text classifier answer.
    pub fn parse_all(text: &str) -> Vec<AffectLabel> {
        let lower = text.to_lowercase();
        let mut labels = Vec::new();
        for (needle, label) in [
            ("infatuation", AffectLabel::Infatuation),
            ("love", AffectLabel::Love),
            ("liking", AffectLabel::Liking),
            ("sympathy", AffectLabel::Liking),
            ("neutral", AffectLabel::Neutral),
            ("dislike", AffectLabel::Disliking),
            ("hatred", AffectLabel::Hatred),
            ("trolling", AffectLabel::Trolling),
        ] {
            if lower.contains(needle) && !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }
}

/// Classifier prompt for the per-message content-analysis pass. The
/// answer is matched with [`AffectLabel::parse_all`], so the listed
/// label names are contract.
pub fn affect_prompt(persona: &str, text: &str) -> String {
    format!(
        "You analyze how a message affects the emotional state of a chatbot named \
         {persona} toward the sender. {persona} can feel the following states toward \
         a user: infatuation, love, liking, neutral, dislike, hatred, trolling.\n\
         List the states that best fit this message, separated by commas. \
         If none fits, answer \"neutral\".\n\
         Message: \"{text}\"\n\
         Answer:"
    )
}

/// How much one classifier verdict bumps the named bucket.
const LABEL_GAIN: f32 = 0.2;

/// Decay applied to charged buckets on a "neutral" verdict.
const NEUTRAL_DECAY: f32 = 0.8;

/// Apply content-classification labels on top of the sentiment update.
///
/// Named buckets are bumped, a neutral verdict resets `neutral` and
/// decays the charged buckets, everything is clamped, and when the total
/// emotion mass exceeds 1.0 all emotion fields (not trust) are rescaled
/// back onto the simplex.
pub fn apply_affect_labels(state: &mut RelationshipState, labels: &[AffectLabel]) {
    for label in labels {
        match label {
            AffectLabel::Infatuation => state.infatuation += LABEL_GAIN,
            AffectLabel::Love => state.love += LABEL_GAIN,
            AffectLabel::Liking => state.liking += LABEL_GAIN,
            AffectLabel::Neutral => {
                state.neutral = 1.0;
                state.liking *= NEUTRAL_DECAY;
                state.disliking *= NEUTRAL_DECAY;
                state.hatred *= NEUTRAL_DECAY;
                state.trolling *= NEUTRAL_DECAY;
            }
            AffectLabel::Disliking => state.disliking += LABEL_GAIN,
            AffectLabel::Hatred => state.hatred += LABEL_GAIN,
            AffectLabel::Trolling => state.trolling += LABEL_GAIN,
        }
    }

    state.clamp_all();

    let sum = state.positive_sum() + state.negative_sum() + state.neutral;
    if sum > 1.0 {
        let factor = 1.0 / sum;
        state.infatuation *= factor;
        state.love *= factor;
        state.liking *= factor;
        state.neutral *= factor;
        state.disliking *= factor;
        state.hatred *= factor;
        state.trolling *= factor;
    }
}

/// One row of the style ladder: a predicate over the affect state and a
/// template rendering the directive for a given persona and user.
struct StyleRule {
    name: &'static str,
    applies: fn(&RelationshipState) -> bool,
    render: fn(persona: &str, user: &str) -> String,
}

/// The ordered rule table. Evaluated top to bottom, first match wins;
/// the priority order and thresholds are contract, the wording is not.
static STYLE_RULES: &[StyleRule] = &[
    StyleRule {
        name: "flirtatious",
        applies: |s| s.infatuation > 0.7,
        render: |persona, user| {
            format!(
                "You are {persona}, and you have a strong crush on {user}. \
                 Flirt, pay compliments, and show how interested you are."
            )
        },
    },
    StyleRule {
        name: "affectionate",
        applies: |s| s.love > 0.8,
        render: |persona, user| {
            format!(
                "You are {persona}, and you deeply love {user}. \
                 Treat them with tenderness, care, and attention."
            )
        },
    },
    StyleRule {
        name: "friendly",
        applies: |s| s.liking > 0.6 && s.trust > 0.5,
        render: |persona, user| {
            format!(
                "You are {persona}. You really like {user}, you are friendly \
                 with them and you trust them."
            )
        },
    },
    StyleRule {
        name: "cold",
        applies: |s| s.hatred > 0.8,
        render: |persona, user| {
            format!(
                "You are {persona}, and you cannot stand {user}. \
                 Keep your answers short; you may be blunt."
            )
        },
    },
    StyleRule {
        name: "distant",
        applies: |s| s.disliking > 0.6,
        render: |persona, user| {
            format!(
                "You are {persona}. {user} rubs you the wrong way. \
                 Stay polite, but keep your distance."
            )
        },
    },
    StyleRule {
        name: "sarcastic",
        applies: |s| s.trolling > 0.7,
        render: |persona, user| {
            format!(
                "You are {persona}, and you enjoy teasing {user}; \
                 your jokes can have a bit of a bite."
            )
        },
    },
];

/// Resolve the relationship-derived style directive, if any rule fires.
///
/// Returns `None` when no threshold is crossed; the resolver then falls
/// back to the default persona style.
pub fn style_directive(
    state: &RelationshipState,
    persona: &str,
    user_name: &str,
) -> Option<String> {
    STYLE_RULES
        .iter()
        .find(|rule| (rule.applies)(state))
        .map(|rule| {
            tracing::debug!(rule = rule.name, user = user_name, "style rule matched");
            (rule.render)(persona, user_name)
        })
}
