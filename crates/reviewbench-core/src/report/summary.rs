//! Cross-case metrics and the serializable run report.

use crate::engine::aggregate::mean;
use crate::engine::trial::TrialFailure;
use crate::model::EvaluationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run-level metrics over the per-case (aggregated) results.
///
/// `mean_accuracy` weights every case equally. `pooled_match_rate` is summed
/// matched over summed total suggestions, so large cases weigh more. The two
/// differ whenever cases have unequal suggestion counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub cases_evaluated: usize,
    pub mean_accuracy: Option<f64>,
    pub matched_suggestions: f64,
    pub total_suggestions: f64,
    /// Percentage in `[0, 100]`; absent when no suggestions were counted.
    pub pooled_match_rate: Option<f64>,
}

impl RunSummary {
    pub fn from_results(results: &[EvaluationResult]) -> Self {
        let accuracies: Vec<f64> = results.iter().map(|r| r.accuracy).collect();
        let matched = results.iter().fold(0.0, |acc, r| acc + r.matched_suggestions);
        let total = results.iter().fold(0.0, |acc, r| acc + r.total_suggestions);

        Self {
            cases_evaluated: results.len(),
            mean_accuracy: mean(&accuracies),
            matched_suggestions: matched,
            total_suggestions: total,
            pooled_match_rate: (total > 0.0).then(|| matched * 100.0 / total),
        }
    }
}

/// A selected case that produced no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCase {
    pub name: String,
    /// Machine-readable error kind (`not_found`, `malformed_ground_truth`, `all_trials_failed`, ...).
    pub kind: String,
    pub reason: String,
}

/// One failed trial, kept for the report after the error itself has been logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTrial {
    pub test_case: String,
    pub trial: u32,
    pub stage: String,
    pub kind: String,
    pub error: String,
}

impl From<&TrialFailure> for FailedTrial {
    fn from(f: &TrialFailure) -> Self {
        Self {
            test_case: f.test_case.clone(),
            trial: f.trial,
            stage: f.stage.as_str().to_string(),
            kind: f.error.kind().to_string(),
            error: f.error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub repetitions: u32,
    /// One entry per scored case, in selection order.
    pub results: Vec<EvaluationResult>,
    pub summary: RunSummary,
    pub skipped_cases: Vec<SkippedCase>,
    pub failed_trials: Vec<FailedTrial>,
}

impl RunReport {
    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }
}
