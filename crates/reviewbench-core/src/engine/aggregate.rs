//! Folding repeated trials into one result per test case.
//!
//! Repeated trials are combined with a plain arithmetic mean. The mean is not
//! robust to an outlier trial and carries no variance; per-trial results are
//! attached so the spread stays inspectable.

use crate::model::EvaluationResult;

/// Arithmetic mean, independent of input order.
///
/// Values are sorted and folded with an incremental update, so `n` copies of
/// `x` give back exactly `x`.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut m = 0.0;
    for (i, x) in sorted.iter().enumerate() {
        m += (x - m) / (i as f64 + 1.0);
    }
    Some(m)
}

/// Combine the successful trials of one test case.
///
/// Numeric scores are averaged; the descriptive fields come from the first
/// successful trial. Returns `None` when no trial succeeded.
pub fn aggregate_trials(
    trials: Vec<EvaluationResult>,
    repetitions: u32,
) -> Option<EvaluationResult> {
    let first = trials.first()?.clone();
    if repetitions <= 1 && trials.len() == 1 {
        return Some(first);
    }

    let pick = |f: fn(&EvaluationResult) -> f64| -> f64 {
        let values: Vec<f64> = trials.iter().map(f).collect();
        mean(&values).unwrap_or_default()
    };
    let accuracy = pick(|r| r.accuracy);
    let total_suggestions = pick(|r| r.total_suggestions);
    let matched_suggestions = pick(|r| r.matched_suggestions);

    Some(EvaluationResult {
        accuracy,
        total_suggestions,
        matched_suggestions,
        repetition_count: Some(trials.len() as u32),
        per_run_results: Some(trials),
        ..first
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(accuracy: f64, matched: f64, total: f64) -> EvaluationResult {
        EvaluationResult {
            test_case: "cart".into(),
            overall_match: accuracy >= 50.0,
            overall_similarity: accuracy,
            suggestion_matches: vec![],
            total_suggestions: total,
            matched_suggestions: matched,
            accuracy,
            detailed_analysis: format!("accuracy {accuracy}"),
            repetition_count: None,
            per_run_results: None,
        }
    }

    #[test]
    fn identical_trials_keep_their_value_exactly() {
        for x in [0.0, 33.333333333333336, 66.7, 90.0, 100.0, 0.1] {
            for n in 1..=12 {
                let values = vec![x; n];
                assert_eq!(mean(&values), Some(x), "x={x} n={n}");
            }
        }
    }

    #[test]
    fn two_trials_average() {
        let agg = aggregate_trials(vec![trial(80.0, 4.0, 5.0), trial(100.0, 5.0, 5.0)], 2).unwrap();
        assert_eq!(agg.accuracy, 90.0);
        assert_eq!(agg.matched_suggestions, 4.5);
        assert_eq!(agg.total_suggestions, 5.0);
        assert_eq!(agg.repetition_count, Some(2));
        assert_eq!(agg.per_run_results.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn descriptive_fields_come_from_first_trial() {
        let agg = aggregate_trials(vec![trial(20.0, 1.0, 5.0), trial(100.0, 5.0, 5.0)], 3).unwrap();
        assert!(!agg.overall_match);
        assert_eq!(agg.detailed_analysis, "accuracy 20");
        assert_eq!(agg.accuracy, 60.0);
    }

    #[test]
    fn mean_does_not_depend_on_order() {
        let a = [12.5, 99.0, 0.3, 47.0, 61.25];
        let mut b = a;
        b.reverse();
        assert_eq!(mean(&a), mean(&b));
    }

    #[test]
    fn single_trial_is_passed_through() {
        let one = trial(75.0, 3.0, 4.0);
        let agg = aggregate_trials(vec![one.clone()], 1).unwrap();
        assert_eq!(agg, one);
        assert!(agg.per_run_results.is_none());
    }

    #[test]
    fn repeated_run_with_one_survivor_still_reports_repetition() {
        let agg = aggregate_trials(vec![trial(75.0, 3.0, 4.0)], 3).unwrap();
        assert_eq!(agg.repetition_count, Some(1));
        assert_eq!(agg.accuracy, 75.0);
    }

    #[test]
    fn no_successful_trials_yields_nothing() {
        assert!(aggregate_trials(vec![], 3).is_none());
        assert_eq!(mean(&[]), None);
    }
}
