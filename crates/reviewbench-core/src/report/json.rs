use super::artifacts::ArtifactWriter;
use super::summary::{FailedTrial, RunReport, RunSummary, SkippedCase};
use crate::errors::EvalResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// `summary.json`: everything in the report except the per-case results.
#[derive(Debug, Serialize)]
struct SummaryFile<'a> {
    run_id: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    repetitions: u32,
    summary: &'a RunSummary,
    skipped_cases: &'a [SkippedCase],
    failed_trials: &'a [FailedTrial],
}

/// Write `evaluation_results.json` and `summary.json`; returns both paths.
pub fn write_run(writer: &ArtifactWriter, report: &RunReport) -> EvalResult<(PathBuf, PathBuf)> {
    let results = writer.write_results(&report.results)?;
    let summary = writer.write_summary(&SummaryFile {
        run_id: &report.run_id,
        started_at: report.started_at,
        finished_at: report.finished_at,
        repetitions: report.repetitions,
        summary: &report.summary,
        skipped_cases: &report.skipped_cases,
        failed_trials: &report.failed_trials,
    })?;
    Ok((results, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EvaluationResult;

    #[test]
    fn results_file_is_the_bare_array() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(tmp.path());
        let results = vec![EvaluationResult {
            test_case: "cart".into(),
            overall_match: true,
            overall_similarity: 90.0,
            suggestion_matches: vec![],
            total_suggestions: 1.0,
            matched_suggestions: 1.0,
            accuracy: 100.0,
            detailed_analysis: "ok".into(),
            repetition_count: None,
            per_run_results: None,
        }];
        let report = RunReport {
            run_id: "run-1".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            repetitions: 1,
            summary: RunSummary::from_results(&results),
            results,
            skipped_cases: vec![SkippedCase {
                name: "gone".into(),
                kind: "not_found".into(),
                reason: "missing".into(),
            }],
            failed_trials: vec![],
        };

        let (results_path, summary_path) = write_run(&writer, &report).unwrap();
        let results: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(results_path).unwrap()).unwrap();
        assert_eq!(results[0]["testCase"], "cart");
        assert_eq!(results[0]["accuracy"], 100.0);
        assert!(results[0].get("repetitionCount").is_none());

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(summary_path).unwrap()).unwrap();
        assert_eq!(summary["run_id"], "run-1");
        assert_eq!(summary["summary"]["pooled_match_rate"], 100.0);
        assert_eq!(summary["skipped_cases"][0]["kind"], "not_found");
        assert!(summary.get("results").is_none());
    }
}
