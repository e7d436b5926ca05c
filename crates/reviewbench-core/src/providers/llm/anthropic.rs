use super::http;
use super::{LlmClient, LlmConfig};
use crate::errors::{EvalResult, ProviderError};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    config: LlmConfig,
    endpoint: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> EvalResult<Self> {
        http::require_api_key(&config)?;
        let client = http::http_client(&config)?;
        let endpoint = format!("{}/messages", http::base_url(&config, DEFAULT_BASE_URL));
        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    pub(crate) fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens(),
            "temperature": self.config.temperature(),
            "messages": [
                { "role": "user", "content": prompt }
            ],
        })
    }
}

/// Concatenate every `text` block of a messages API response.
fn collect_text(json: &Value) -> Result<String, ProviderError> {
    let blocks = json
        .get("content")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ProviderError::Decode {
            message: "Anthropic response missing content array".to_string(),
        })?;

    Ok(blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let timeout = self.config.timeout();
        let request = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(prompt));

        let resp = http::send(request, timeout).await?;
        let json: Value = resp
            .json()
            .await
            .map_err(|e| http::transport_error(e, timeout))?;

        http::non_empty(collect_text(&json)?)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_blocks_are_joined_and_other_blocks_skipped() {
        let json = json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "{\"overallSummary\":"},
                {"type": "text", "text": " \"ok\"}"}
            ]
        });
        assert_eq!(collect_text(&json).unwrap(), "{\"overallSummary\": \"ok\"}");
    }

    #[test]
    fn missing_content_is_a_decode_error() {
        let err = collect_text(&json!({"type": "error"})).unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
    }

    #[test]
    fn max_tokens_is_always_sent() {
        let client = AnthropicClient::new(LlmConfig::new("claude", "claude-sonnet-4-5", "k")).unwrap();
        let body = client.request_body("review");
        assert_eq!(body["max_tokens"], json!(4000));
        assert_eq!(body["model"], json!("claude-sonnet-4-5"));
    }
}
