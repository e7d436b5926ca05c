//! Shared HTTP plumbing for the provider adapters: client construction,
//! credential check and status mapping. Adapters never interpret status codes.

use super::LlmConfig;
use crate::errors::{EvalError, EvalResult, ProviderError};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

const USER_AGENT_VALUE: &str = concat!("reviewbench/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY_CHARS: usize = 500;

pub(crate) fn require_api_key(config: &LlmConfig) -> EvalResult<()> {
    if config.api_key.trim().is_empty() {
        return Err(EvalError::config(format!(
            "API key is required for provider '{}' (model '{}')",
            config.provider, config.model
        )));
    }
    Ok(())
}

pub(crate) fn http_client(config: &LlmConfig) -> EvalResult<reqwest::Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    reqwest::Client::builder()
        .timeout(config.timeout())
        .default_headers(default_headers)
        .build()
        .map_err(|e| EvalError::config(format!("failed to create HTTP client: {e}")))
}

pub(crate) fn base_url(config: &LlmConfig, default: &str) -> String {
    config
        .base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}...")
}

pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout { after: timeout }
    } else {
        ProviderError::from(err)
    }
}

/// Send the request and turn any non-2xx status into [`ProviderError::Http`].
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<reqwest::Response, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(e, timeout))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());
    Err(ProviderError::Http {
        status: status.as_u16(),
        body: truncate(&body, MAX_ERROR_BODY_CHARS),
    })
}

/// Final text or `EmptyResponse`.
pub(crate) fn non_empty(text: String) -> Result<String, ProviderError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let out = truncate(&body, 10);
        assert_eq!(out, "xxxxxxxxxx...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let cfg = LlmConfig::new("openai", "m", "k").with_base_url("http://localhost:9999/v1/");
        assert_eq!(base_url(&cfg, "https://api.openai.com/v1"), "http://localhost:9999/v1");
        let cfg = LlmConfig::new("openai", "m", "k");
        assert_eq!(base_url(&cfg, "https://api.openai.com/v1"), "https://api.openai.com/v1");
    }

    #[test]
    fn blank_completion_is_empty_response() {
        assert!(matches!(non_empty("  \n".into()), Err(ProviderError::EmptyResponse)));
        assert_eq!(non_empty("  ok \n".into()).unwrap(), "ok");
    }
}
