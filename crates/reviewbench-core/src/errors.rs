//! Error types for the evaluation pipeline.

use std::path::PathBuf;
use std::time::Duration;

/// Pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Bad or missing configuration (e.g. empty API key). Fatal when building clients.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Provider tag outside the supported set.
    #[error("unsupported provider: '{provider}' (expected one of: openai, anthropic, gemini)")]
    UnsupportedProvider { provider: String },

    /// Transport/API failure from a model client.
    #[error("provider error ({provider}): {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// The reviewer model's completion could not be turned into a review.
    #[error("malformed review output: {0}")]
    MalformedReviewOutput(#[source] ExtractionError),

    /// The evaluator model's completion could not be turned into a score.
    #[error("malformed evaluation output: {0}")]
    MalformedEvaluationOutput(#[source] ExtractionError),

    /// Corpus directory, test case, or one of its parts is missing.
    #[error("not found: {what} ({})", path.display())]
    NotFound { what: String, path: PathBuf },

    /// Ground truth payload does not parse as a review structure.
    #[error("malformed ground truth for '{name}': {message}")]
    MalformedGroundTruth { name: String, message: String },

    /// Prompt template and parameters disagree.
    #[error("template error: {message}")]
    Template { message: String },

    /// Filesystem error outside the test-case provider.
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EvalError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, source: ProviderError) -> Self {
        Self::Provider {
            provider: provider.into(),
            source,
        }
    }

    pub fn not_found(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what: what.into(),
            path: path.into(),
        }
    }

    /// Stable machine-readable kind, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::UnsupportedProvider { .. } => "unsupported_provider",
            Self::Provider { source, .. } if source.is_timeout() => "provider_timeout",
            Self::Provider { .. } => "provider",
            Self::MalformedReviewOutput(_) => "malformed_review_output",
            Self::MalformedEvaluationOutput(_) => "malformed_evaluation_output",
            Self::NotFound { .. } => "not_found",
            Self::MalformedGroundTruth { .. } => "malformed_ground_truth",
            Self::Template { .. } => "template",
            Self::Io { .. } => "io",
        }
    }

    /// Raw model text attached to extraction failures, for diagnostics.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::MalformedReviewOutput(e) | Self::MalformedEvaluationOutput(e) => Some(&e.raw),
            _ => None,
        }
    }
}

/// Failure of a single model call. Never retried by the client itself.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Non-2xx HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, DNS, TLS or body-read failure.
    #[error("network error: {message}")]
    Network { message: String },

    /// The call exceeded its deadline.
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    /// The provider answered but produced no text.
    #[error("empty response")]
    EmptyResponse,

    /// Response body did not have the expected shape.
    #[error("failed to decode response: {message}")]
    Decode { message: String },
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                message: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Why a structured payload could not be recovered from model text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// Neither a json fence nor a `{...}` span was present.
    NoStructuredSpan,
    /// A span was located but is not valid JSON.
    InvalidJson(String),
    /// Valid JSON that does not match the expected structure.
    SchemaMismatch(String),
    /// Structurally valid payload that violates a domain invariant.
    InvalidPayload(String),
}

impl std::fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoStructuredSpan => write!(f, "no JSON object found"),
            Self::InvalidJson(msg) => write!(f, "invalid JSON: {msg}"),
            Self::SchemaMismatch(msg) => write!(f, "unexpected structure: {msg}"),
            Self::InvalidPayload(msg) => write!(f, "invalid payload: {msg}"),
        }
    }
}

/// Extraction failure carrying the full raw completion.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason} (raw output: {} chars)", raw.chars().count())]
pub struct ExtractionError {
    pub reason: ExtractionFailure,
    pub raw: String,
}

impl ExtractionError {
    pub fn new(reason: ExtractionFailure, raw: impl Into<String>) -> Self {
        Self {
            reason,
            raw: raw.into(),
        }
    }
}

/// Result type for pipeline operations.
pub type EvalResult<T> = Result<T, EvalError>;
