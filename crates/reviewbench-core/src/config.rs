//! Run configuration: a YAML file plus a few environment overrides.

use crate::errors::{EvalError, EvalResult};
use crate::providers::llm::{LlmConfig, Provider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "reviewbench.yaml";
pub const DEFAULT_EXAMPLES_DIR: &str = "examples";
pub const DEFAULT_OUTPUT_ROOT: &str = "output";

pub const ENV_OUTPUT_DIR: &str = "REVIEWBENCH_OUTPUT_DIR";
pub const ENV_REPETITIONS: &str = "REVIEWBENCH_REPETITIONS";

/// One model entry of the config file.
#[derive(Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    pub provider: String,
    pub model: String,
    /// Literal key. Prefer `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Name of the environment variable holding the key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ModelSpec {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: None,
            api_key_env: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: None,
            base_url: None,
        }
    }

    /// Literal key, then `api_key_env`, then the provider's conventional variables.
    ///
    /// A missing key resolves to "" so that client construction reports it.
    pub fn resolve_api_key(&self) -> String {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return key.clone();
        }
        if let Some(var) = &self.api_key_env {
            return env_non_empty(var).unwrap_or_default();
        }
        self.provider
            .parse::<Provider>()
            .ok()
            .and_then(|p| p.api_key_env_vars().iter().find_map(|v| env_non_empty(v)))
            .unwrap_or_default()
    }

    /// Client configuration. `default_timeout` applies when the entry sets none.
    pub fn resolve(&self, default_timeout: Option<u64>) -> LlmConfig {
        LlmConfig {
            provider: self.provider.clone(),
            model: self.model.clone(),
            api_key: self.resolve_api_key(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_secs: self.timeout_secs.or(default_timeout),
            base_url: self.base_url.clone(),
        }
    }

    fn validate(&self, role: &str) -> EvalResult<()> {
        if self.model.trim().is_empty() {
            return Err(EvalError::config(format!("{role}.model must not be empty")));
        }
        if let Some(t) = self.temperature {
            if !t.is_finite() || t < 0.0 {
                return Err(EvalError::config(format!(
                    "{role}.temperature must be a non-negative number, got {t}"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(EvalError::config(format!("{role}.max_tokens must be >= 1")));
        }
        if self.timeout_secs == Some(0) {
            return Err(EvalError::config(format!("{role}.timeout_secs must be >= 1")));
        }
        Ok(())
    }
}

fn default_repetitions() -> u32 {
    1
}

fn default_parallel() -> usize {
    1
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EvalConfig {
    pub reviewer: ModelSpec,
    pub evaluator: ModelSpec,
    /// Root under which each run creates a timestamped directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Replacement for the built-in reviewer prompt template.
    #[serde(default)]
    pub reviewer_prompt: Option<PathBuf>,
    #[serde(default)]
    pub examples_dir: Option<PathBuf>,
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    /// Per-call timeout applied to both models unless they set their own.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl EvalConfig {
    pub fn new(reviewer: ModelSpec, evaluator: ModelSpec) -> Self {
        Self {
            reviewer,
            evaluator,
            output_dir: None,
            reviewer_prompt: None,
            examples_dir: None,
            repetitions: default_repetitions(),
            parallel: default_parallel(),
            timeout_secs: None,
        }
    }

    /// Read, apply environment overrides and validate.
    pub fn load(path: &Path) -> EvalResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EvalError::not_found("config file", path)
            } else {
                EvalError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let mut cfg = Self::from_yaml_str(&text).map_err(|e| match e {
            EvalError::Configuration { message } => {
                EvalError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;

        // Relative prompt paths are relative to the config file.
        if let (Some(prompt), Some(dir)) = (&cfg.reviewer_prompt, path.parent()) {
            if prompt.is_relative() && !dir.as_os_str().is_empty() {
                cfg.reviewer_prompt = Some(dir.join(prompt));
            }
        }

        cfg.apply_env_overrides()?;
        cfg.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(cfg)
    }

    pub fn from_yaml_str(text: &str) -> EvalResult<Self> {
        serde_yaml::from_str(text).map_err(|e| EvalError::config(format!("invalid config: {e}")))
    }

    pub fn apply_env_overrides(&mut self) -> EvalResult<()> {
        if let Some(dir) = env_non_empty(ENV_OUTPUT_DIR) {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = env_non_empty(ENV_REPETITIONS) {
            self.repetitions = raw.trim().parse().map_err(|_| {
                EvalError::config(format!("{ENV_REPETITIONS} must be a positive integer, got '{raw}'"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> EvalResult<()> {
        if self.repetitions == 0 {
            return Err(EvalError::config("repetitions must be >= 1"));
        }
        if self.parallel == 0 {
            return Err(EvalError::config("parallel must be >= 1"));
        }
        if self.timeout_secs == Some(0) {
            return Err(EvalError::config("timeout_secs must be >= 1"));
        }
        self.reviewer.validate("reviewer")?;
        self.evaluator.validate("evaluator")?;
        Ok(())
    }

    pub fn reviewer_config(&self) -> LlmConfig {
        self.reviewer.resolve(self.timeout_secs)
    }

    pub fn evaluator_config(&self) -> LlmConfig {
        self.evaluator.resolve(self.timeout_secs)
    }

    pub fn examples_dir(&self) -> PathBuf {
        self.examples_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXAMPLES_DIR))
    }

    pub fn output_root(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT))
    }

    /// Contents of the reviewer prompt override, if one is configured.
    pub fn load_reviewer_template(&self) -> EvalResult<Option<String>> {
        let Some(path) = &self.reviewer_prompt else {
            return Ok(None);
        };
        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EvalError::not_found("reviewer prompt template", path),
                _ => EvalError::Io {
                    path: path.clone(),
                    source: e,
                },
            })
    }
}
