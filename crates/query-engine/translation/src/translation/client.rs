//! Convert a prompt into a candidate SQL statement.

use std::sync::Arc;

use tracing::{info_span, Instrument};

use super::error::ModelError;
use super::model::{ChatMessage, LanguageModel, Role};
use super::prompt::Prompt;
use super::response::{clean_response, is_refusal, looks_like_sql};

/// Reason reported when the model refuses and then fails to say why.
pub const UNKNOWN_REFUSAL_REASON: &str = "Failed to determine error reason";

/// What the model made of a natural-language request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationResult {
    /// A candidate statement. Not yet validated.
    Success { sql_text: String },
    /// The model could not or would not translate; `reason` is its own explanation.
    Unsupported { reason: String },
    /// The model could not be reached or answered with something unusable.
    ModelError { reason: String, timed_out: bool },
}

impl From<ModelError> for TranslationResult {
    fn from(err: ModelError) -> Self {
        TranslationResult::ModelError {
            reason: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }
}

/// Drives the conversation with a language model. Never executes anything.
#[derive(Clone)]
pub struct Translator {
    model: Arc<dyn LanguageModel>,
}

impl Translator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Translator { model }
    }

    pub async fn translate(&self, prompt: &Prompt) -> TranslationResult {
        let span = info_span!("Translate", model = self.model.name());
        self.translate_inner(prompt).instrument(span).await
    }

    async fn translate_inner(&self, prompt: &Prompt) -> TranslationResult {
        let messages = prompt.messages();
        let answer = match self.model.complete(&messages).await {
            Ok(answer) => answer,
            Err(err) => {
                log_model_error(&err);
                return err.into();
            }
        };
        tracing::info!(answer = %answer, "received model answer");

        let cleaned = clean_response(&answer);
        if cleaned.is_empty() || is_refusal(&cleaned) {
            tracing::info!(query = %prompt.query, "model declined; requesting an explanation");
            return self.explain_refusal(messages, answer, prompt).await;
        }

        if looks_like_sql(&cleaned) {
            TranslationResult::Success { sql_text: cleaned }
        } else {
            TranslationResult::Unsupported { reason: cleaned }
        }
    }

    /// Ask the model why it refused and report its answer verbatim.
    async fn explain_refusal(
        &self,
        mut messages: Vec<ChatMessage>,
        answer: String,
        prompt: &Prompt,
    ) -> TranslationResult {
        messages.push(ChatMessage::new(Role::Assistant, answer));
        messages.push(ChatMessage::new(Role::User, prompt.explanation_request()));

        match self.model.complete(&messages).await {
            Ok(explanation) => {
                let reason = explanation.trim();
                TranslationResult::Unsupported {
                    reason: if reason.is_empty() {
                        tracing::warn!("explanation was empty");
                        UNKNOWN_REFUSAL_REASON.to_string()
                    } else {
                        reason.to_string()
                    },
                }
            }
            Err(ModelError::InvalidStructure | ModelError::InvalidFormat(_)) => {
                TranslationResult::Unsupported {
                    reason: UNKNOWN_REFUSAL_REASON.to_string(),
                }
            }
            Err(err) => {
                log_model_error(&err);
                err.into()
            }
        }
    }
}

fn log_model_error(err: &ModelError) {
    tracing::error!(
        meta.signal_type = "log",
        event.domain = "chatdb",
        event.name = "Model error",
        name = "Model error",
        body = %err,
        detail = ?err,
        error = true,
    );
}
