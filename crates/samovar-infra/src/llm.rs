//! HTTP chat-completion client implementing the [`LanguageModel`] port.
//!
//! Talks to an OpenAI-style `/chat/completions` endpoint. The base URL is
//! overridable, so any compatible provider (or a local proxy) works.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use samovar_core::llm::LanguageModel;
use samovar_types::error::LlmError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Output cap for conversational replies.
const GENERATE_MAX_TOKENS: u32 = 512;

/// Classification answers are a word or two; keep them cheap.
const CLASSIFY_MAX_TOKENS: u32 = 16;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible completion client.
///
/// # API key security
///
/// The key is stored as a [`SecretString`] and only exposed when the
/// authorization header is built; the struct deliberately does not derive
/// `Debug` so the key can never leak through logging.
pub struct ChatCompletionClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to create reqwest client");
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    /// Override the endpoint base URL (other providers, local proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature: 0.9,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Http(err.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Http(format!("HTTP {status}: {detail}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Malformed(err.to_string()))?;
        extract_text(parsed)
    }
}

/// Pull the reply text out of a parsed response, mapping blocked and
/// empty generations to their error variants.
fn extract_text(response: ChatResponse) -> Result<String, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::Empty)?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(LlmError::Blocked);
    }

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(LlmError::Empty),
    }
}

impl LanguageModel for ChatCompletionClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.complete(prompt, GENERATE_MAX_TOKENS).await
    }

    async fn classify(&self, prompt: &str) -> Result<String, LlmError> {
        self.complete(prompt, CLASSIFY_MAX_TOKENS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ChatResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_extract_text_happy_path() {
        let response = parse(
            r#"{"choices": [{"message": {"content": "hello!"}, "finish_reason": "stop"}]}"#,
        );
        assert_eq!(extract_text(response).unwrap(), "hello!");
    }

    #[test]
    fn test_extract_text_no_choices_is_empty() {
        let response = parse(r#"{"choices": []}"#);
        assert!(matches!(extract_text(response), Err(LlmError::Empty)));
    }

    #[test]
    fn test_extract_text_whitespace_is_empty() {
        let response = parse(
            r#"{"choices": [{"message": {"content": "   "}, "finish_reason": "stop"}]}"#,
        );
        assert!(matches!(extract_text(response), Err(LlmError::Empty)));
    }

    #[test]
    fn test_extract_text_content_filter_is_blocked() {
        let response = parse(
            r#"{"choices": [{"message": {"content": "x"}, "finish_reason": "content_filter"}]}"#,
        );
        assert!(matches!(extract_text(response), Err(LlmError::Blocked)));
    }

    #[test]
    fn test_response_parses_without_finish_reason() {
        let response = parse(r#"{"choices": [{"message": {"content": "ok"}}]}"#);
        assert_eq!(extract_text(response).unwrap(), "ok");
    }
}
