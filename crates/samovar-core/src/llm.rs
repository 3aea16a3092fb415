//! Language-model and sentiment-analysis ports.
//!
//! These are the narrow interfaces the pipeline consumes from excluded
//! collaborators. Uses native async fn in traits (RPITIT, Rust 2024
//! edition); concrete implementations live in samovar-infra.

use std::future::Future;

use samovar_types::error::LlmError;

/// Trait for the text-generation backend.
///
/// Both methods may fail or return unusable output; callers treat that as
/// "no usable text", never as a crash.
pub trait LanguageModel: Send + Sync {
    /// Generate a conversational reply for an assembled prompt.
    fn generate(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Answer a short yes/no- or label-style classification prompt.
    ///
    /// Same signature as [`generate`](Self::generate); implementations may
    /// cap the output length since classification answers are short.
    fn classify(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// Trait for the sentiment-analysis collaborator.
pub trait SentimentAnalyzer: Send + Sync {
    /// Score the overall sentiment of a message, in `[-1, 1]`.
    fn score(&self, text: &str) -> f32;
}
