//! The language model seam and its chat-completions implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use super::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }
}

/// Something that continues a conversation with generated text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Return the text of the next assistant turn.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError>;

    fn name(&self) -> &str;
}

/// Connection and generation parameters for a chat-completions endpoint.
#[derive(Clone)]
pub struct ModelSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .finish()
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// An OpenAI-compatible chat-completions model reached over HTTP.
#[derive(Debug, Clone)]
pub struct ChatCompletionsModel {
    client: reqwest::Client,
    settings: ModelSettings,
}

/// The longest we ever wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

impl ChatCompletionsModel {
    pub fn new(settings: ModelSettings) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| ModelError::Transport(err.to_string()))?;
        Ok(ChatCompletionsModel { client, settings })
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    async fn attempt(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let request = CompletionRequest {
            model: &self.settings.model,
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let response = self
            .client
            .post(&self.settings.api_url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| self.transport_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "model endpoint returned an error");
            return Err(ModelError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|err| self.transport_error(&err))?;
        tracing::debug!(raw_response = %body, "model response");

        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|err| ModelError::InvalidFormat(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content.unwrap_or_default())
            .ok_or(ModelError::InvalidStructure)
    }

    fn transport_error(&self, err: &reqwest::Error) -> ModelError {
        if err.is_timeout() {
            ModelError::Timeout(self.settings.timeout)
        } else {
            ModelError::Transport(err.to_string())
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.settings
            .retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_BACKOFF)
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let mut attempt = 0;
        loop {
            let result = self
                .attempt(messages)
                .instrument(info_span!("Call language model", attempt, model = %self.settings.model))
                .await;
            match result {
                Err(err) if err.is_transient() && attempt < self.settings.max_retries => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(error = %err, ?delay, attempt, "retrying model request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn name(&self) -> &str {
        &self.settings.model
    }
}
