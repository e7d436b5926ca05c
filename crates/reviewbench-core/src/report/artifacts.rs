//! Write-only audit trail of a run. Nothing here is read back by the pipeline.

use crate::errors::{EvalError, EvalResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const PROMPT_FILE: &str = "prompt.md";
pub const RESPONSE_FILE: &str = "response.md";
pub const EVALUATOR_RESPONSE_FILE: &str = "evaluator_response.md";
pub const TRIAL_RECORD_FILE: &str = "trial.json";
pub const RESULTS_FILE: &str = "evaluation_results.json";
pub const SUMMARY_FILE: &str = "summary.json";

pub fn sha256_digest(text: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(text.as_bytes())))
}

/// `<root>/<UTC timestamp>`, e.g. `output/2025-06-01T12-30-05Z`.
pub fn timestamped_dir(root: &Path, now: DateTime<Utc>) -> PathBuf {
    root.join(now.format("%Y-%m-%dT%H-%M-%SZ").to_string())
}

fn write_file(path: &Path, contents: &[u8]) -> EvalResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| EvalError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, contents).map_err(|e| EvalError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> EvalResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| EvalError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    write_file(path, text.as_bytes())
}

/// Per-run output directory. Each trial writes under its own subdirectory, so
/// concurrent cases never touch the same file.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<case>/` for single-trial runs, `<root>/<case>/trial-<k>/` otherwise.
    pub fn trial(&self, test_case: &str, trial: u32, repetitions: u32) -> TrialArtifacts {
        let case_dir = self.root.join(test_case);
        let dir = if repetitions > 1 {
            case_dir.join(format!("trial-{trial}"))
        } else {
            case_dir
        };
        TrialArtifacts { dir }
    }

    pub fn write_results<T: Serialize + ?Sized>(&self, results: &T) -> EvalResult<PathBuf> {
        let path = self.root.join(RESULTS_FILE);
        write_json(&path, results)?;
        Ok(path)
    }

    pub fn write_summary<T: Serialize + ?Sized>(&self, summary: &T) -> EvalResult<PathBuf> {
        let path = self.root.join(SUMMARY_FILE);
        write_json(&path, summary)?;
        Ok(path)
    }
}

#[derive(Debug, Clone)]
pub struct TrialArtifacts {
    dir: PathBuf,
}

impl TrialArtifacts {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_prompt(&self, prompt: &str) -> EvalResult<()> {
        write_file(&self.dir.join(PROMPT_FILE), prompt.as_bytes())
    }

    pub fn write_response(&self, response: &str) -> EvalResult<()> {
        write_file(&self.dir.join(RESPONSE_FILE), response.as_bytes())
    }

    pub fn write_evaluator_response(&self, response: &str) -> EvalResult<()> {
        write_file(&self.dir.join(EVALUATOR_RESPONSE_FILE), response.as_bytes())
    }

    pub fn write_record<T: Serialize>(&self, record: &T) -> EvalResult<()> {
        write_json(&self.dir.join(TRIAL_RECORD_FILE), record)
    }
}

/// Log-and-continue for artifact writes made during a trial.
pub(crate) fn best_effort(result: EvalResult<()>, test_case: &str, what: &'static str) {
    if let Err(e) = result {
        tracing::warn!(test_case, artifact = what, error = %e, "failed to write artifact");
    }
}
