//! Recovery of a single JSON payload from free-form model output.
//!
//! Models wrap their answer inconsistently, so extraction is a two-tier fallback:
//!
//! 1. a fenced block tagged as json (```` ```json ... ``` ````),
//! 2. otherwise the outermost `{ ... }` span (first `{` to last `}`).
//!
//! A located span that fails to parse is a hard failure; the caller decides
//! whether the whole model call is worth repeating.

use crate::errors::{ExtractionError, ExtractionFailure};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)```").expect("json fence regex")
});

/// Where the payload was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanSource {
    Fence,
    Braces,
}

/// Locate the candidate span without parsing it.
pub fn locate(raw: &str) -> Option<(SpanSource, &str)> {
    if let Some(inner) = JSON_FENCE.captures(raw).and_then(|c| c.get(1)) {
        return Some((SpanSource::Fence, inner.as_str().trim()));
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some((SpanSource::Braces, &raw[start..=end]))
}

/// Extract the payload as untyped JSON.
pub fn extract_value(raw: &str) -> Result<Value, ExtractionError> {
    let (source, span) =
        locate(raw).ok_or_else(|| ExtractionError::new(ExtractionFailure::NoStructuredSpan, raw))?;

    serde_json::from_str::<Value>(span).map_err(|e| {
        tracing::debug!(?source, error = %e, "located span is not valid JSON");
        ExtractionError::new(ExtractionFailure::InvalidJson(e.to_string()), raw)
    })
}

/// Extract the payload and decode it into `T`.
pub fn extract<T: DeserializeOwned>(raw: &str) -> Result<T, ExtractionError> {
    let value = extract_value(raw)?;
    serde_json::from_value(value)
        .map_err(|e| ExtractionError::new(ExtractionFailure::SchemaMismatch(e.to_string()), raw))
}
