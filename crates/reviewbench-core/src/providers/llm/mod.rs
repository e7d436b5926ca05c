//! Model clients: one uniform `generate(prompt) -> text` contract over
//! heterogeneous LLM backends.

pub mod anthropic;
pub mod fake;
pub mod gemini;
mod http;
pub mod openai;

use crate::errors::{EvalError, EvalResult, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use anthropic::AnthropicClient;
pub use fake::ScriptedClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one prompt and return the complete text answer.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    fn provider_name(&self) -> &'static str;

    fn model(&self) -> &str;
}

/// Supported backends. New providers get a variant, an adapter and a factory arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Conventional environment variables holding the API key, in lookup order.
    pub fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            _ => Err(EvalError::UnsupportedProvider {
                provider: s.to_string(),
            }),
        }
    }
}

/// Fixed per-client configuration supplied at construction.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Override of the provider's API root (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &if self.api_key.is_empty() { "<empty>" } else { "<redacted>" })
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl LlmConfig {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: api_key.into(),
            temperature: None,
            max_tokens: None,
            timeout_secs: None,
            base_url: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// Build the client for `config.provider`. Unknown tags construct nothing.
pub fn create_client(config: &LlmConfig) -> EvalResult<Arc<dyn LlmClient>> {
    let provider: Provider = config.provider.parse()?;
    let client: Arc<dyn LlmClient> = match provider {
        Provider::OpenAi => Arc::new(OpenAiClient::new(config.clone())?),
        Provider::Anthropic => Arc::new(AnthropicClient::new(config.clone())?),
        Provider::Gemini => Arc::new(GeminiClient::new(config.clone())?),
    };
    tracing::debug!(provider = %provider, model = %config.model, "model client created");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_tags_and_aliases_parse() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("Claude".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!(" gemini ".parse::<Provider>().unwrap(), Provider::Gemini);
    }

    #[test]
    fn unsupported_provider_is_rejected_before_key_check() {
        for tag in ["mistral", "", "open-ai", "ollama"] {
            let cfg = LlmConfig::new(tag, "some-model", "");
            let err = create_client(&cfg).err().expect("must fail");
            assert!(
                matches!(err, EvalError::UnsupportedProvider { ref provider } if provider == tag),
                "unexpected error for {tag:?}: {err}"
            );
        }
    }

    #[test]
    fn empty_api_key_is_a_configuration_error_for_every_provider() {
        for tag in ["openai", "anthropic", "claude", "gemini"] {
            let cfg = LlmConfig::new(tag, "m", "");
            let err = create_client(&cfg).err().expect("must fail");
            assert!(matches!(err, EvalError::Configuration { .. }), "{tag}: {err}");
        }
        let blank = LlmConfig::new("openai", "gpt-4o-mini", "   ");
        assert!(matches!(
            create_client(&blank).err(),
            Some(EvalError::Configuration { .. })
        ));
    }

    #[test]
    fn valid_config_builds_a_client() {
        let cfg = LlmConfig::new("gemini", "gemini-2.5-pro", "k").with_max_tokens(20000);
        let client = create_client(&cfg).unwrap();
        assert_eq!(client.provider_name(), "gemini");
        assert_eq!(client.model(), "gemini-2.5-pro");
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let cfg = LlmConfig::new("openai", "gpt-4o", "sk-secret");
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn knob_defaults() {
        let cfg = LlmConfig::new("openai", "gpt-4o", "k");
        assert_eq!(cfg.temperature(), DEFAULT_TEMPERATURE);
        assert_eq!(cfg.max_tokens(), DEFAULT_MAX_TOKENS);
        assert_eq!(cfg.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}
