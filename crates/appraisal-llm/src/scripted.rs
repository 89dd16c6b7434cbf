//! Deterministic generator that replays canned completions.
use crate::{CompletionRequest, Generator, GeneratorError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
    structured_output: bool,
}

impl ScriptedGenerator {
    /// Answers with `responses` in order, then fails.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
            structured_output: false,
        }
    }

    /// Answers every request with `response`.
    pub fn repeating(response: impl Into<String>) -> Self {
        Self {
            fallback: Some(response.into()),
            ..Self::default()
        }
    }

    /// Behaves like an endpoint that honours request schemas.
    pub fn with_structured_output(mut self, enabled: bool) -> Self {
        self.structured_output = enabled;
        self
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn structured_output(&self) -> bool {
        self.structured_output
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GeneratorError> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.prompt.clone());

        let next = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| GeneratorError::Unavailable("script exhausted".to_string()))
    }
}
