use super::http;
use super::{LlmClient, LlmConfig};
use crate::errors::{EvalResult, ProviderError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

static REASONING_MODEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^o\d+(?:[-_]|$)").expect("reasoning model regex"));

/// Parameter differences between OpenAI model families, detected from the model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelQuirks {
    /// Reasoning models reject a temperature override.
    pub accepts_temperature: bool,
    /// Name of the output token limit parameter.
    pub token_limit_param: &'static str,
}

impl ModelQuirks {
    pub fn detect(model: &str) -> Self {
        let model = model.trim();
        let reasoning = REASONING_MODEL.is_match(model)
            || model.to_ascii_lowercase().starts_with("gpt-5");
        if reasoning {
            Self {
                accepts_temperature: false,
                token_limit_param: "max_completion_tokens",
            }
        } else {
            Self {
                accepts_temperature: true,
                token_limit_param: "max_tokens",
            }
        }
    }
}

pub struct OpenAiClient {
    config: LlmConfig,
    quirks: ModelQuirks,
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> EvalResult<Self> {
        http::require_api_key(&config)?;
        let client = http::http_client(&config)?;
        let endpoint = format!(
            "{}/chat/completions",
            http::base_url(&config, DEFAULT_BASE_URL)
        );
        Ok(Self {
            quirks: ModelQuirks::detect(&config.model),
            config,
            endpoint,
            client,
        })
    }

    pub fn quirks(&self) -> ModelQuirks {
        self.quirks
    }

    pub(crate) fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });
        body[self.quirks.token_limit_param] = json!(self.config.max_tokens());
        if self.quirks.accepts_temperature {
            body["temperature"] = json!(self.config.temperature());
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = self.request_body(prompt);
        let timeout = self.config.timeout();

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body);
        let resp = http::send(request, timeout).await?;
        let json: Value = resp
            .json()
            .await
            .map_err(|e| http::transport_error(e, timeout))?;

        // choices[0].message.content
        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Decode {
                message: "OpenAI response missing choices[0].message.content".to_string(),
            })?;

        http::non_empty(text.to_string())
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
