//! One reviewer-then-evaluator pass over a test case.

use crate::errors::{EvalError, EvalResult, ExtractionError, ExtractionFailure, ProviderError};
use crate::extract;
use crate::model::{EvaluationResult, EvaluatorVerdict, ReviewResponse, TestCase};
use crate::prompts;
use crate::providers::llm::LlmClient;
use crate::report::artifacts::{self, sha256_digest, ArtifactWriter, TrialArtifacts};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info_span, Instrument};

/// Progress of a single trial. Failure can happen in any state before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStage {
    Pending,
    PromptBuilt,
    ReviewerInvoked,
    ReviewParsed,
    EvaluatorInvoked,
    Scored,
    Done,
}

impl TrialStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PromptBuilt => "prompt_built",
            Self::ReviewerInvoked => "reviewer_invoked",
            Self::ReviewParsed => "review_parsed",
            Self::EvaluatorInvoked => "evaluator_invoked",
            Self::Scored => "scored",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TrialStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trial that ended in the failed state. `stage` is the last state reached.
#[derive(Debug)]
pub struct TrialFailure {
    pub test_case: String,
    pub trial: u32,
    pub stage: TrialStage,
    pub error: EvalError,
}

impl fmt::Display for TrialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} trial {} failed after {}: {}",
            self.test_case, self.trial, self.stage, self.error
        )
    }
}

pub type TrialOutcome = Result<EvaluationResult, TrialFailure>;

/// Everything a trial needs besides the test case.
#[derive(Clone, Copy)]
pub struct TrialContext<'a> {
    pub reviewer: &'a dyn LlmClient,
    pub evaluator: &'a dyn LlmClient,
    pub reviewer_template: Option<&'a str>,
    pub call_timeout: Option<Duration>,
    pub artifacts: Option<&'a ArtifactWriter>,
    pub repetitions: u32,
}

#[derive(Debug, Serialize)]
struct ModelRef<'a> {
    provider: &'a str,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct ErrorRecord<'a> {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_output: Option<&'a str>,
}

/// Contents of `trial.json`.
#[derive(Debug, Serialize)]
struct TrialRecord<'a> {
    test_case: &'a str,
    trial: u32,
    reviewer: ModelRef<'a>,
    evaluator: ModelRef<'a>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration_ms: u64,
    stage: TrialStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorRecord<'a>>,
}

/// Invoke one model with the per-call deadline. A deadline hit is a provider timeout.
pub(crate) async fn call_model(
    client: &dyn LlmClient,
    prompt: &str,
    call_timeout: Option<Duration>,
    role: &'static str,
) -> EvalResult<String> {
    let span = info_span!(
        "model.call",
        provider = client.provider_name(),
        model = client.model(),
        role
    );
    async move {
        let started = Instant::now();
        let result = match call_timeout {
            Some(limit) => match tokio::time::timeout(limit, client.generate(prompt)).await {
                Ok(r) => r,
                Err(_) => Err(ProviderError::Timeout { after: limit }),
            },
            None => client.generate(prompt).await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(text) => tracing::debug!(elapsed_ms, chars = text.len(), "model call completed"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "model call failed"),
        }
        result.map_err(|e| EvalError::provider(client.provider_name(), e))
    }
    .instrument(span)
    .await
}

struct Trial<'a> {
    case: &'a TestCase,
    index: u32,
    stage: TrialStage,
    files: Option<TrialArtifacts>,
    prompt_sha256: Option<String>,
    response_sha256: Option<String>,
}

impl<'a> Trial<'a> {
    fn advance(&mut self, next: TrialStage) {
        tracing::trace!(test_case = %self.case.name, trial = self.index, from = %self.stage, to = %next, "trial stage");
        self.stage = next;
    }

    fn fail(&self, error: EvalError) -> TrialFailure {
        TrialFailure {
            test_case: self.case.name.clone(),
            trial: self.index,
            stage: self.stage,
            error,
        }
    }

    fn persist(&self, what: &'static str, write: impl FnOnce(&TrialArtifacts) -> EvalResult<()>) {
        if let Some(files) = &self.files {
            artifacts::best_effort(write(files), &self.case.name, what);
        }
    }

    async fn execute(&mut self, ctx: &TrialContext<'_>) -> Result<EvaluationResult, EvalError> {
        let case = self.case;

        let prompt =
            prompts::reviewer_prompt(&case.file_content, &case.diff_text, ctx.reviewer_template)?;
        self.prompt_sha256 = Some(sha256_digest(&prompt));
        self.persist("prompt", |f| f.write_prompt(&prompt));
        self.advance(TrialStage::PromptBuilt);

        let raw_review = call_model(ctx.reviewer, &prompt, ctx.call_timeout, "reviewer").await?;
        self.response_sha256 = Some(sha256_digest(&raw_review));
        self.persist("response", |f| f.write_response(&raw_review));
        self.advance(TrialStage::ReviewerInvoked);

        let review: ReviewResponse =
            extract::extract(&raw_review).map_err(EvalError::MalformedReviewOutput)?;
        review.validate().map_err(|msg| {
            EvalError::MalformedReviewOutput(ExtractionError::new(
                ExtractionFailure::InvalidPayload(msg),
                raw_review.as_str(),
            ))
        })?;
        self.advance(TrialStage::ReviewParsed);

        let eval_prompt = prompts::evaluator_prompt_for(&case.ground_truth, &review)?;
        let raw_verdict =
            call_model(ctx.evaluator, &eval_prompt, ctx.call_timeout, "evaluator").await?;
        self.persist("evaluator_response", |f| {
            f.write_evaluator_response(&raw_verdict)
        });
        self.advance(TrialStage::EvaluatorInvoked);

        let verdict: EvaluatorVerdict =
            extract::extract(&raw_verdict).map_err(EvalError::MalformedEvaluationOutput)?;
        let result = verdict
            .resolve(&case.name, &case.ground_truth, &review)
            .map_err(|msg| {
                EvalError::MalformedEvaluationOutput(ExtractionError::new(
                    ExtractionFailure::InvalidPayload(msg),
                    raw_verdict.as_str(),
                ))
            })?;
        self.advance(TrialStage::Scored);
        Ok(result)
    }
}

/// Run one trial. Never panics on model misbehaviour; every failure comes back
/// as a [`TrialFailure`] and is logged.
pub async fn run_trial(case: &TestCase, index: u32, ctx: &TrialContext<'_>) -> TrialOutcome {
    let started_at = Utc::now();
    let started = Instant::now();
    let mut trial = Trial {
        case,
        index,
        stage: TrialStage::Pending,
        files: ctx
            .artifacts
            .map(|w| w.trial(&case.name, index, ctx.repetitions)),
        prompt_sha256: None,
        response_sha256: None,
    };

    let outcome = trial.execute(ctx).await;
    if outcome.is_ok() {
        trial.advance(TrialStage::Done);
    }

    {
        let record = TrialRecord {
            test_case: &case.name,
            trial: index,
            reviewer: ModelRef {
                provider: ctx.reviewer.provider_name(),
                model: ctx.reviewer.model(),
            },
            evaluator: ModelRef {
                provider: ctx.evaluator.provider_name(),
                model: ctx.evaluator.model(),
            },
            started_at,
            finished_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            stage: trial.stage,
            prompt_sha256: trial.prompt_sha256.clone(),
            response_sha256: trial.response_sha256.clone(),
            accuracy: outcome.as_ref().ok().map(|r| r.accuracy),
            error: outcome.as_ref().err().map(|e| ErrorRecord {
                kind: e.kind(),
                message: e.to_string(),
                raw_output: e.raw_output(),
            }),
        };
        trial.persist("trial_record", |f| f.write_record(&record));
    }

    match outcome {
        Ok(result) => {
            tracing::info!(
                test_case = %case.name,
                trial = index,
                accuracy = result.accuracy,
                matched = result.matched_suggestions,
                total = result.total_suggestions,
                "trial scored"
            );
            Ok(result)
        }
        Err(error) => {
            let failure = trial.fail(error);
            tracing::warn!(
                test_case = %case.name,
                trial = index,
                stage = %failure.stage,
                kind = failure.error.kind(),
                error = %failure.error,
                "trial failed"
            );
            Err(failure)
        }
    }
}
