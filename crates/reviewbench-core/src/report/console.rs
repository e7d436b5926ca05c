use crate::report::progress::{ProgressEvent, ProgressSink};
use crate::report::summary::RunReport;
use std::sync::Arc;

#[must_use]
pub fn format_progress_line(ev: &ProgressEvent) -> String {
    let status = if ev.scored { "" } else { " (no result)" };
    format!("Evaluated case {}/{}: {}{}", ev.done, ev.total, ev.test_case, status)
}

/// For large corpora, emit at most every this many cases (about a 10% step).
pub(crate) fn progress_step(total: usize) -> usize {
    if total <= 10 {
        1
    } else {
        std::cmp::max(1, total / 10)
    }
}

/// Progress sink printing to stderr. `None` for runs of zero or one case.
pub fn default_progress_sink(total: usize) -> Option<ProgressSink> {
    if total <= 1 {
        return None;
    }
    let step = progress_step(total);
    Some(Arc::new(move |ev: ProgressEvent| {
        if ev.done == ev.total || ev.done == 1 || ev.done % step == 0 || !ev.scored {
            eprintln!("{}", format_progress_line(&ev));
        }
    }))
}

fn pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}%"))
        .unwrap_or_else(|| "n/a".into())
}

/// Human-readable run summary, one entry per line.
#[must_use]
pub fn format_summary(report: &RunReport) -> Vec<String> {
    let s = &report.summary;
    let mut lines = Vec::new();

    for r in &report.results {
        let reps = r
            .repetition_count
            .map(|n| format!("  ({n} trials)"))
            .unwrap_or_default();
        lines.push(format!(
            "✅ {:<30} accuracy {:>7}  matched {}/{}{}",
            r.test_case,
            pct(Some(r.accuracy)),
            fmt_count(r.matched_suggestions),
            fmt_count(r.total_suggestions),
            reps
        ));
    }
    for skipped in &report.skipped_cases {
        lines.push(format!(
            "⏭️  {:<30} SKIPPED [{}] {}",
            skipped.name, skipped.kind, skipped.reason
        ));
    }
    if !report.failed_trials.is_empty() {
        lines.push(String::new());
        lines.push(format!("Failed trials ({}):", report.failed_trials.len()));
        for f in &report.failed_trials {
            lines.push(format!(
                "  ❌ {} trial {} at {} [{}]: {}",
                f.test_case, f.trial, f.stage, f.kind, f.error
            ));
        }
    }

    lines.push(String::new());
    lines.push("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━".into());
    lines.push(format!(
        "Cases: {} evaluated, {} skipped",
        s.cases_evaluated,
        report.skipped_cases.len()
    ));
    lines.push(format!("Mean accuracy:      {}", pct(s.mean_accuracy)));
    lines.push(format!(
        "Pooled match rate:  {} ({}/{} suggestions)",
        pct(s.pooled_match_rate),
        fmt_count(s.matched_suggestions),
        fmt_count(s.total_suggestions)
    ));
    lines
}

/// Counts are averages when trials were repeated; print integers without decimals.
fn fmt_count(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

pub fn print_summary(report: &RunReport) {
    eprintln!();
    for line in format_summary(report) {
        eprintln!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EvaluationResult;
    use crate::report::summary::{FailedTrial, RunSummary, SkippedCase};
    use chrono::Utc;

    fn report() -> RunReport {
        let results = vec![
            EvaluationResult {
                test_case: "a".into(),
                overall_match: true,
                overall_similarity: 95.0,
                suggestion_matches: vec![],
                total_suggestions: 1.0,
                matched_suggestions: 1.0,
                accuracy: 100.0,
                detailed_analysis: String::new(),
                repetition_count: None,
                per_run_results: None,
            },
            EvaluationResult {
                test_case: "b".into(),
                overall_match: false,
                overall_similarity: 30.0,
                suggestion_matches: vec![],
                total_suggestions: 4.0,
                matched_suggestions: 1.0,
                accuracy: 25.0,
                detailed_analysis: String::new(),
                repetition_count: Some(2),
                per_run_results: None,
            },
        ];
        RunReport {
            run_id: "r".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            repetitions: 2,
            summary: RunSummary::from_results(&results),
            results,
            skipped_cases: vec![SkippedCase {
                name: "c".into(),
                kind: "all_trials_failed".into(),
                reason: "all 2 trial(s) failed".into(),
            }],
            failed_trials: vec![FailedTrial {
                test_case: "c".into(),
                trial: 1,
                stage: "reviewer_invoked".into(),
                kind: "malformed_review_output".into(),
                error: "no JSON object found".into(),
            }],
        }
    }

    #[test]
    fn summary_reports_both_metrics_and_absences() {
        let text = format_summary(&report()).join("\n");
        assert!(text.contains("Mean accuracy:      62.50%"), "{text}");
        assert!(text.contains("Pooled match rate:  40.00% (2/5 suggestions)"), "{text}");
        assert!(text.contains("SKIPPED [all_trials_failed]"));
        assert!(text.contains("c trial 1 at reviewer_invoked"));
        assert!(text.contains("(2 trials)"));
    }

    #[test]
    fn progress_line_mentions_case() {
        let line = format_progress_line(&ProgressEvent {
            done: 3,
            total: 10,
            test_case: "cart".into(),
            scored: false,
        });
        assert_eq!(line, "Evaluated case 3/10: cart (no result)");
    }

    #[test]
    fn progress_sink_only_for_multi_case_runs() {
        assert!(default_progress_sink(0).is_none());
        assert!(default_progress_sink(1).is_none());
        assert!(default_progress_sink(2).is_some());
        assert_eq!(progress_step(25), 2);
    }
}
