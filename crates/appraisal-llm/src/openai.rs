//! OpenAI-compatible `/chat/completions` client (Ollama, vLLM, hosted APIs).
use crate::config::{GeneratorConfig, TEMPERATURE};
use crate::{CompletionRequest, Generator, GeneratorError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

pub struct OpenAiCompatibleGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Request body: a single user turn, temperature pinned, no streaming.
    pub fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": TEMPERATURE,
            "stream": false,
        });

        if let (true, Some(schema)) = (self.config.structured_output, &request.schema) {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": true,
                },
            });
        }

        body
    }
}

#[async_trait]
impl Generator for OpenAiCompatibleGenerator {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn structured_output(&self) -> bool {
        self.config.structured_output
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GeneratorError> {
        let body = self.request_body(request);
        debug!(model = %self.config.model, prompt_chars = request.prompt.len(), "requesting completion");

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| self.classify(e))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GeneratorError::EmptyResponse)?;

        info!(model = %self.config.model, completion_chars = content.len(), "completion received");
        Ok(content)
    }
}

impl OpenAiCompatibleGenerator {
    fn classify(&self, error: reqwest::Error) -> GeneratorError {
        if error.is_timeout() {
            GeneratorError::Timeout(self.config.request_timeout())
        } else {
            GeneratorError::Http(error)
        }
    }
}
