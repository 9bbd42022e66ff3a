use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use query_engine_translation::translation::{ChatMessage, LanguageModel, ModelError};

/// A model that replays canned answers and records every conversation it was sent.
#[derive(Default)]
pub struct ScriptedModel {
    answers: Mutex<VecDeque<Result<String, ModelError>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(answers: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Arc::new(ScriptedModel {
            answers: Mutex::new(answers.into()),
            calls: Mutex::default(),
        })
    }

    /// Answer every call with the same text.
    pub fn answering(answer: &str) -> Arc<Self> {
        Self::new(vec![Ok(answer.to_string())])
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let mut answers = self.answers.lock().unwrap();
        // the last answer repeats
        if answers.len() > 1 {
            answers.pop_front().unwrap()
        } else {
            answers
                .front()
                .cloned()
                .expect("the scripted model has no answers")
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
