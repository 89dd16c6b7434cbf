//! Appraisal LLM: the text-generation collaborator
//!
//! One prompt in, one completion out. Calls are never streamed, retried or
//! cached: a failed or timed-out request fails the stage that issued it.
//!
//! # Example
//!
//! ```ignore
//! use appraisal_llm::{CompletionRequest, Generator, GeneratorConfig, OpenAiCompatibleGenerator};
//!
//! let generator = OpenAiCompatibleGenerator::new(GeneratorConfig::default())?;
//! let text = generator.complete(&CompletionRequest::text("Hey, how are you?")).await?;
//! ```

pub mod config;
pub mod openai;
pub mod response;
pub mod scripted;

pub use config::GeneratorConfig;
pub use openai::OpenAiCompatibleGenerator;
pub use response::{normalize_punctuation, parse_structured, ResponseError, ResponseFormat};
pub use scripted::ScriptedGenerator;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// JSON schema the completion should follow, when the endpoint supports it.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub schema: Option<ResponseSchema>,
}

impl CompletionRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            schema: None,
        }
    }

    pub fn structured(prompt: impl Into<String>, schema: ResponseSchema) -> Self {
        Self {
            prompt: prompt.into(),
            schema: Some(schema),
        }
    }
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no completion within {0:?}")]
    Timeout(Duration),

    #[error("endpoint answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion had no content")]
    EmptyResponse,

    #[error("generator unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Model or stub name, for logs.
    fn name(&self) -> &str;

    /// Whether request schemas are forwarded to the endpoint.
    fn structured_output(&self) -> bool {
        false
    }

    /// Shapes to accept back for `request`: a bare JSON object only when its
    /// schema actually reached the endpoint.
    fn response_format(&self, request: &CompletionRequest) -> ResponseFormat {
        if self.structured_output() && request.schema.is_some() {
            ResponseFormat::JsonOrFenced
        } else {
            ResponseFormat::Fenced
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GeneratorError>;
}

#[async_trait]
impl<G> Generator for Arc<G>
where
    G: Generator + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn structured_output(&self) -> bool {
        (**self).structured_output()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GeneratorError> {
        (**self).complete(request).await
    }
}
