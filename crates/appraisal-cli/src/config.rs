//! Run configuration: a YAML file with every field defaulted, then
//! environment overrides.
//!
//! ```yaml
//! store:
//!   root: ContinousFeedback/details
//! generator:
//!   base_url: http://localhost:11434/v1
//!   model: qwen3:4b-instruct-2507-q4_K_M
//! review:
//!   enabled: true
//!   associate_name: Jane Doe
//! ```

use appraisal_llm::GeneratorConfig;
use appraisal_store::fs::DEFAULT_ROOT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV: &str = "APPRAISAL_CONFIG";
pub const STORE_ROOT_ENV: &str = "APPRAISAL_STORE_ROOT";
pub const BASE_URL_ENV: &str = "APPRAISAL_LLM_BASE_URL";
pub const MODEL_ENV: &str = "APPRAISAL_LLM_MODEL";
pub const API_KEY_ENV: &str = "APPRAISAL_LLM_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CONFIG/cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CONFIG/{path} is not valid: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub generator: GeneratorConfig,
    pub review: ReviewConfig,
    /// Replaces the bundled prompt templates.
    pub prompts_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Run the review stage inside `generate`.
    pub enabled: bool,
    /// Overrides the first entry of the stakeholder list.
    pub associate_name: Option<String>,
}

impl AppConfig {
    pub fn from_yaml(path: &str, text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        // An empty file is a valid, all-default configuration.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::from_yaml(&path.display().to_string(), &text)
    }

    /// `path`, else `$APPRAISAL_CONFIG`, else defaults; then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(root) = value(STORE_ROOT_ENV) {
            self.store.root = PathBuf::from(root);
        }
        if let Some(base_url) = value(BASE_URL_ENV) {
            self.generator.base_url = base_url;
        }
        if let Some(model) = value(MODEL_ENV) {
            self.generator.model = model;
        }
        if let Some(api_key) = value(API_KEY_ENV) {
            self.generator.api_key = api_key;
        }
    }
}
