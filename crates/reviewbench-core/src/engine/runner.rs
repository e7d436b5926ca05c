use super::aggregate::aggregate_trials;
use super::trial::{run_trial, TrialContext, TrialFailure};
use crate::config::EvalConfig;
use crate::dataset::TestCaseSource;
use crate::errors::{EvalError, EvalResult};
use crate::model::{EvaluationResult, TestCase};
use crate::prompts;
use crate::providers::llm::{create_client, LlmClient};
use crate::report::artifacts::ArtifactWriter;
use crate::report::progress::{ProgressEvent, ProgressSink};
use crate::report::summary::{FailedTrial, RunReport, RunSummary, SkippedCase};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

#[derive(Debug, Clone)]
pub struct RunPolicy {
    /// Trials per test case, run one after another.
    pub repetitions: u32,
    /// Test cases evaluated concurrently.
    pub parallel: usize,
    /// Deadline for each model call.
    pub call_timeout: Option<Duration>,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            repetitions: 1,
            parallel: 1,
            call_timeout: None,
        }
    }
}

/// Which test cases to run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Explicit names, in the order given. `None` means the whole corpus.
    pub names: Option<Vec<String>>,
    /// Keep only the first `limit` names.
    pub limit: Option<usize>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Names to evaluate. Explicit names are deduplicated but not checked here;
    /// an unknown name is reported as skipped when it fails to load.
    pub fn resolve(&self, source: &dyn TestCaseSource) -> EvalResult<Vec<String>> {
        let mut names = match &self.names {
            Some(explicit) => {
                let mut seen = HashSet::new();
                explicit
                    .iter()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty() && seen.insert(n.clone()))
                    .collect()
            }
            None => source.list_names()?,
        };
        if let Some(limit) = self.limit {
            names.truncate(limit);
        }
        Ok(names)
    }
}

/// Per-case outcome before it is folded into the report.
#[derive(Debug)]
pub struct CaseEvaluation {
    /// Aggregated result; `None` when every trial failed.
    pub result: Option<EvaluationResult>,
    pub failures: Vec<TrialFailure>,
    pub trials: u32,
}

#[derive(Debug)]
enum CaseOutcome {
    Evaluated(CaseEvaluation),
    LoadFailed(EvalError),
}

/// Finished cases by input index, with the progress counter.
struct Completions<'a> {
    names: &'a [String],
    finished: Vec<Option<CaseOutcome>>,
    done: usize,
    progress: Option<&'a ProgressSink>,
}

impl Completions<'_> {
    fn record(&mut self, joined: Result<(usize, CaseOutcome), JoinError>) {
        let (index, outcome) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "test case task failed");
                return;
            }
        };
        self.done += 1;
        let scored = matches!(
            &outcome,
            CaseOutcome::Evaluated(CaseEvaluation { result: Some(_), .. })
        );
        if let Some(sink) = self.progress {
            sink(ProgressEvent {
                done: self.done,
                total: self.names.len(),
                test_case: self.names[index].clone(),
                scored,
            });
        }
        self.finished[index] = Some(outcome);
    }
}

#[derive(Clone)]
pub struct Runner {
    pub reviewer: Arc<dyn LlmClient>,
    pub evaluator: Arc<dyn LlmClient>,
    pub policy: RunPolicy,
    reviewer_template: Option<Arc<str>>,
    artifacts: Option<ArtifactWriter>,
    progress: Option<ProgressSink>,
}

impl Runner {
    pub fn new(reviewer: Arc<dyn LlmClient>, evaluator: Arc<dyn LlmClient>) -> Self {
        Self {
            reviewer,
            evaluator,
            policy: RunPolicy::default(),
            reviewer_template: None,
            artifacts: None,
            progress: None,
        }
    }

    /// Build both clients and the policy from a loaded configuration.
    pub fn from_config(cfg: &EvalConfig) -> EvalResult<Self> {
        let reviewer = create_client(&cfg.reviewer_config())?;
        let evaluator = create_client(&cfg.evaluator_config())?;
        let mut runner = Self::new(reviewer, evaluator).with_policy(RunPolicy {
            repetitions: cfg.repetitions,
            parallel: cfg.parallel,
            call_timeout: cfg.timeout_secs.map(Duration::from_secs),
        });
        if let Some(template) = cfg.load_reviewer_template()? {
            runner = runner.with_reviewer_template(template)?;
        }
        Ok(runner)
    }

    pub fn with_policy(mut self, policy: RunPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the built-in reviewer prompt. Rejected up front if it does not
    /// use exactly the `{file}` and `{diff}` placeholders.
    pub fn with_reviewer_template(mut self, template: impl Into<String>) -> EvalResult<Self> {
        let template: String = template.into();
        prompts::reviewer_prompt("", "", Some(&template))?;
        self.reviewer_template = Some(Arc::from(template));
        Ok(self)
    }

    pub fn with_artifacts(mut self, writer: ArtifactWriter) -> Self {
        self.artifacts = Some(writer);
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn artifacts(&self) -> Option<&ArtifactWriter> {
        self.artifacts.as_ref()
    }

    /// Run every trial of one case and aggregate the successful ones.
    pub async fn evaluate_case(&self, case: &TestCase) -> CaseEvaluation {
        let repetitions = self.policy.repetitions.max(1);
        let ctx = TrialContext {
            reviewer: self.reviewer.as_ref(),
            evaluator: self.evaluator.as_ref(),
            reviewer_template: self.reviewer_template.as_deref(),
            call_timeout: self.policy.call_timeout,
            artifacts: self.artifacts.as_ref(),
            repetitions,
        };

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for index in 1..=repetitions {
            match run_trial(case, index, &ctx).await {
                Ok(result) => successes.push(result),
                Err(failure) => failures.push(failure),
            }
        }

        let scored = successes.len();
        let result = aggregate_trials(successes, repetitions);
        match &result {
            Some(r) => tracing::info!(
                test_case = %case.name,
                accuracy = r.accuracy,
                scored_trials = scored,
                failed_trials = failures.len(),
                "test case evaluated"
            ),
            None => tracing::warn!(
                test_case = %case.name,
                failed_trials = failures.len(),
                "all trials failed; test case omitted from results"
            ),
        }
        CaseEvaluation {
            result,
            failures,
            trials: repetitions,
        }
    }

    /// Evaluate the selected cases. Per-case and per-trial failures end up in the
    /// report; only an unreadable corpus listing fails the run.
    pub async fn run(
        &self,
        source: Arc<dyn TestCaseSource>,
        selection: &Selection,
    ) -> EvalResult<RunReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let names = selection.resolve(source.as_ref())?;
        let total = names.len();
        let parallel = self.policy.parallel.max(1);

        tracing::info!(
            run_id = %run_id,
            cases = total,
            repetitions = self.policy.repetitions,
            parallel,
            reviewer = %format!("{}/{}", self.reviewer.provider_name(), self.reviewer.model()),
            evaluator = %format!("{}/{}", self.evaluator.provider_name(), self.evaluator.model()),
            "starting evaluation run"
        );

        let sem = Arc::new(Semaphore::new(parallel));
        let mut join_set = JoinSet::new();
        let mut completions = Completions {
            names: &names,
            finished: names.iter().map(|_| None).collect(),
            done: 0,
            progress: self.progress.as_ref(),
        };
        for (index, name) in names.iter().enumerate() {
            // Cases that finish while we wait for a free slot are reported right away.
            let permit = loop {
                tokio::select! {
                    biased;
                    Some(joined) = join_set.join_next(), if !join_set.is_empty() => {
                        completions.record(joined);
                    }
                    permit = sem.clone().acquire_owned() => {
                        break permit
                            .map_err(|e| EvalError::config(format!("scheduler closed: {e}")))?;
                    }
                }
            };
            let this = self.clone();
            let source = source.clone();
            let name = name.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let outcome = match source.load(&name) {
                    Ok(case) => CaseOutcome::Evaluated(this.evaluate_case(&case).await),
                    Err(e) => CaseOutcome::LoadFailed(e),
                };
                (index, outcome)
            });
        }
        while let Some(joined) = join_set.join_next().await {
            completions.record(joined);
        }
        let finished = completions.finished;

        // Input order, whatever the completion order was.
        let mut results = Vec::new();
        let mut skipped_cases = Vec::new();
        let mut failed_trials = Vec::new();
        for (name, outcome) in names.iter().zip(finished) {
            match outcome {
                Some(CaseOutcome::Evaluated(eval)) => {
                    failed_trials.extend(eval.failures.iter().map(FailedTrial::from));
                    match eval.result {
                        Some(result) => results.push(result),
                        None => skipped_cases.push(SkippedCase {
                            name: name.clone(),
                            kind: "all_trials_failed".to_string(),
                            reason: format!("all {} trial(s) failed", eval.trials),
                        }),
                    }
                }
                Some(CaseOutcome::LoadFailed(e)) => {
                    tracing::warn!(test_case = %name, kind = e.kind(), error = %e, "skipping test case");
                    skipped_cases.push(SkippedCase {
                        name: name.clone(),
                        kind: e.kind().to_string(),
                        reason: e.to_string(),
                    });
                }
                None => skipped_cases.push(SkippedCase {
                    name: name.clone(),
                    kind: "task_failed".to_string(),
                    reason: "evaluation task did not complete".to_string(),
                }),
            }
        }

        let summary = RunSummary::from_results(&results);
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            repetitions: self.policy.repetitions,
            results,
            summary,
            skipped_cases,
            failed_trials,
        };

        if let Some(writer) = &self.artifacts {
            match crate::report::json::write_run(writer, &report) {
                Ok((results_path, _)) => {
                    tracing::info!(path = %results_path.display(), "results written")
                }
                Err(e) => tracing::error!(error = %e, "failed to write run results"),
            }
        }

        tracing::info!(
            run_id = %report.run_id,
            evaluated = report.summary.cases_evaluated,
            skipped = report.skipped_cases.len(),
            failed_trials = report.failed_trials.len(),
            "evaluation run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemorySource;
    use crate::model::GroundTruth;
    use crate::providers::llm::ScriptedClient;

    fn case(name: &str) -> TestCase {
        TestCase {
            name: name.into(),
            file_content: "x".into(),
            diff_text: "1 +x".into(),
            ground_truth: GroundTruth {
                overall_summary: "s".into(),
                code_suggestions: vec![],
            },
        }
    }

    #[test]
    fn selection_limit_applies_to_corpus_order() {
        let src = MemorySource::new(vec![case("c"), case("a"), case("b")]);
        assert_eq!(Selection::all().resolve(&src).unwrap(), vec!["c", "a", "b"]);
        assert_eq!(
            Selection::all().with_limit(2).resolve(&src).unwrap(),
            vec!["c", "a"]
        );
    }

    #[test]
    fn explicit_names_are_deduplicated_in_order() {
        let src = MemorySource::new(vec![]);
        let sel = Selection::names(["b", "a", "b", " ", "zz"]);
        assert_eq!(sel.resolve(&src).unwrap(), vec!["b", "a", "zz"]);
    }

    #[test]
    fn bad_template_override_is_rejected_up_front() {
        let runner = Runner::new(
            Arc::new(ScriptedClient::new("r")),
            Arc::new(ScriptedClient::new("e")),
        );
        assert!(matches!(
            runner.clone().with_reviewer_template("only {file}"),
            Err(EvalError::Template { .. })
        ));
        assert!(runner.with_reviewer_template("{file}\n{diff}").is_ok());
    }

    #[tokio::test]
    async fn unknown_names_are_skipped_not_fatal() {
        let runner = Runner::new(
            Arc::new(ScriptedClient::new("r")),
            Arc::new(ScriptedClient::new("e")),
        );
        let src: Arc<dyn TestCaseSource> = Arc::new(MemorySource::new(vec![]));
        let report = runner.run(src, &Selection::names(["ghost"])).await.unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.skipped_cases.len(), 1);
        assert_eq!(report.skipped_cases[0].kind, "not_found");
    }
}
