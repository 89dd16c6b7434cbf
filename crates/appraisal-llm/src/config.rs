//! Connection settings for an OpenAI-compatible chat-completion endpoint.
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_MODEL: &str = "qwen3:4b-instruct-2507-q4_K_M";

/// Sampling is pinned so the same prompt yields the same draft.
pub const TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    /// Local servers accept any key; hosted ones need a real one.
    pub api_key: String,
    pub request_timeout_secs: u64,
    /// Ask the endpoint for schema-constrained JSON instead of relying on a
    /// fenced block in free text.
    pub structured_output: bool,
}

impl GeneratorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: "123".to_string(),
            request_timeout_secs: 300,
            structured_output: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_trims_slash() {
        let config = GeneratorConfig {
            base_url: "http://llm.local/v1/".to_string(),
            ..GeneratorConfig::default()
        };
        assert_eq!(config.completions_url(), "http://llm.local/v1/chat/completions");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: GeneratorConfig = serde_yaml::from_str("model: llama3\n").unwrap();
        assert_eq!(config.model, "llama3");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert!(!config.structured_output);
    }
}
