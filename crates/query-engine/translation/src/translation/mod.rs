//! Build the prompt, call the language model and interpret its answer.

pub mod client;
pub mod error;
pub mod model;
pub mod prompt;
pub mod response;

pub use client::{TranslationResult, Translator};
pub use error::ModelError;
pub use model::{ChatCompletionsModel, ChatMessage, LanguageModel, ModelSettings, Role};
pub use prompt::{build_prompt, Prompt};
