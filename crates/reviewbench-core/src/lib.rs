//! Evaluation pipeline for LLM code review.
//!
//! A reviewer model reviews a diff, an evaluator model scores that review
//! against curated ground truth, and repeated trials are folded into one
//! result per test case plus a run-level summary.

pub mod config;
pub mod dataset;
pub mod engine;
pub mod errors;
pub mod extract;
pub mod model;
pub mod prompts;
pub mod providers;
pub mod report;

pub use config::{EvalConfig, ModelSpec};
pub use dataset::{DirectorySource, MemorySource, TestCaseSource};
pub use engine::{RunPolicy, Runner, Selection};
pub use errors::{EvalError, EvalResult, ExtractionError, ExtractionFailure, ProviderError};
pub use model::{
    CodeSuggestion, EvaluationResult, GroundTruth, ReviewResponse, SuggestionLabel,
    SuggestionMatch, TestCase,
};
pub use providers::llm::{create_client, LlmClient, LlmConfig, Provider};
pub use report::{RunReport, RunSummary};
