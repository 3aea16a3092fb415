//! Lexicon-based sentiment scoring.
//!
//! The pipeline only needs a rough scalar in [-1, 1] to nudge affect
//! scores by a tenth of its value per message, so a small valence lexicon
//! with negation flipping is enough. The port boundary means a heavier
//! scorer can replace this without touching the core.

use samovar_core::llm::SentimentAnalyzer;

const POSITIVE: &[&str] = &[
    "love", "like", "great", "good", "nice", "awesome", "wonderful", "happy", "thanks",
    "thank", "cool", "fun", "best", "beautiful", "sweet", "glad", "люблю", "нравится",
    "класс", "отлично", "хорошо", "спасибо", "красиво", "супер", "рада", "рад",
];

const NEGATIVE: &[&str] = &[
    "hate", "awful", "terrible", "bad", "worst", "stupid", "boring", "annoying", "ugly",
    "angry", "sad", "horrible", "ненавижу", "плохо", "ужасно", "глупо", "скучно",
    "отстой", "бесит", "дурак", "дура",
];

/// Words flipping the valence of the token right after them.
const NEGATIONS: &[&str] = &["not", "no", "never", "dont", "don't", "не", "нет", "никогда"];

/// [`SentimentAnalyzer`] over the static lexicon.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconAnalyzer;

impl LexiconAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl SentimentAnalyzer for LexiconAnalyzer {
    /// Average valence of recognized words, negation-flipped, in [-1, 1].
    /// Text with no recognized words scores 0.
    fn score(&self, text: &str) -> f32 {
        let tokens: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();

        let mut total = 0.0f32;
        let mut matched = 0u32;
        for (i, token) in tokens.iter().enumerate() {
            let valence = if POSITIVE.contains(&token.as_str()) {
                1.0
            } else if NEGATIVE.contains(&token.as_str()) {
                -1.0
            } else {
                continue;
            };
            let negated = i > 0 && NEGATIONS.contains(&tokens[i - 1].as_str());
            total += if negated { -valence } else { valence };
            matched += 1;
        }

        if matched == 0 {
            0.0
        } else {
            (total / matched as f32).clamp(-1.0, 1.0)
        }
    }
}
