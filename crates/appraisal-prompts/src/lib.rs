//! Appraisal Prompts: templates for drafting and reviewing card comments
//!
//! Both prompts ask the model to answer with a fenced `yaml` block, which the
//! stages parse strictly.
//!
//! # Example
//!
//! ```ignore
//! use appraisal_prompts::{GenerationPrompt, PromptBook};
//!
//! let book = PromptBook::bundled()?;
//! let prompt = book.generation(&GenerationPrompt {
//!     topic: "Delivery",
//!     requirement: "Ship X by Q3",
//!     previous_conversation: "[]",
//!     feed_forward: "",
//!     user_comments: "",
//! })?;
//! ```

pub mod renderer;
pub mod templates;

pub use renderer::TemplateRenderer;
pub use templates::TemplatesFile;

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

pub const COMMENT_GENERATION: &str = "comment_generation";
pub const COMMENT_REVIEW: &str = "comment_review";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template load failed: {0}")]
    Load(String),

    #[error("template '{name}' is invalid: {reason}")]
    Template { name: String, reason: String },

    #[error("template '{0}' is not defined")]
    MissingTemplate(String),

    #[error("rendering '{name}' failed: {reason}")]
    Render { name: String, reason: String },
}

/// Inputs of the drafting prompt.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationPrompt<'a> {
    pub topic: &'a str,
    pub requirement: &'a str,
    /// Earlier turns, serialised as YAML.
    pub previous_conversation: &'a str,
    /// Feed-forward record, serialised as YAML.
    pub feed_forward: &'a str,
    pub user_comments: &'a str,
}

/// Inputs of the review prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewPrompt<'a> {
    pub topic: &'a str,
    pub requirement: &'a str,
    pub previous_conversation: &'a str,
    pub comment: &'a str,
    pub associate: Option<&'a str>,
}

/// The renderer, checked to define every prompt the stages need.
pub struct PromptBook {
    renderer: TemplateRenderer,
}

impl PromptBook {
    pub fn new(templates: TemplatesFile) -> Result<Self, PromptError> {
        for required in [COMMENT_GENERATION, COMMENT_REVIEW] {
            if templates.get(required).is_none() {
                return Err(PromptError::MissingTemplate(required.to_string()));
            }
        }
        Ok(Self {
            renderer: TemplateRenderer::new(templates)?,
        })
    }

    pub fn bundled() -> Result<Self, PromptError> {
        Self::new(TemplatesFile::bundled()?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        Self::new(TemplatesFile::load(path)?)
    }

    pub fn generation(&self, prompt: &GenerationPrompt<'_>) -> Result<String, PromptError> {
        self.render(COMMENT_GENERATION, prompt)
    }

    pub fn review(&self, prompt: &ReviewPrompt<'_>) -> Result<String, PromptError> {
        self.render(COMMENT_REVIEW, prompt)
    }

    fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, PromptError> {
        let data = serde_json::to_value(data).map_err(|e| PromptError::Render {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.renderer.render(name, &data)
    }
}
