use super::http;
use super::{LlmClient, LlmConfig};
use crate::errors::{EvalResult, ProviderError};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    config: LlmConfig,
    endpoint: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: LlmConfig) -> EvalResult<Self> {
        http::require_api_key(&config)?;
        let client = http::http_client(&config)?;
        let endpoint = format!(
            "{}/models/{}:streamGenerateContent",
            http::base_url(&config, DEFAULT_BASE_URL),
            config.model
        );
        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    pub(crate) fn request_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "temperature": self.config.temperature(),
                "maxOutputTokens": self.config.max_tokens(),
                "responseMimeType": "text/plain",
            },
        })
    }
}

/// Incremental reader for a `text/event-stream` body of generateContent chunks.
///
/// Network chunks may split lines anywhere, so bytes are buffered until a full
/// line is available.
#[derive(Debug, Default)]
pub(crate) struct SseTextCollector {
    pending: Vec<u8>,
    text: String,
    events: usize,
}

impl SseTextCollector {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<(), ProviderError> {
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.handle_line(&String::from_utf8_lossy(&line))?;
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<String, ProviderError> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.handle_line(&String::from_utf8_lossy(&rest))?;
        }
        tracing::debug!(events = self.events, "gemini stream drained");
        http::non_empty(self.text)
    }

    fn handle_line(&mut self, line: &str) -> Result<(), ProviderError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(());
        }

        let chunk: Value = serde_json::from_str(data).map_err(|e| ProviderError::Decode {
            message: format!("invalid stream chunk: {e}"),
        })?;
        self.events += 1;

        if let Some(err) = chunk.get("error") {
            let status = err.get("code").and_then(|c| c.as_u64()).unwrap_or(500);
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("stream error");
            return Err(ProviderError::Http {
                status: u16::try_from(status).unwrap_or(500),
                body: message.to_string(),
            });
        }

        append_chunk_text(&chunk, &mut self.text);
        Ok(())
    }
}

/// candidates[].content.parts[].text
fn append_chunk_text(chunk: &Value, out: &mut String) {
    let candidates = chunk
        .get("candidates")
        .and_then(|c| c.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    for candidate in candidates {
        let parts = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                out.push_str(text);
            }
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let timeout = self.config.timeout();
        let request = self
            .client
            .post(&self.endpoint)
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.request_body(prompt));

        let resp = http::send(request, timeout).await?;

        let mut collector = SseTextCollector::default();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| http::transport_error(e, timeout))?;
            collector.push(&chunk)?;
        }
        collector.finish()
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
