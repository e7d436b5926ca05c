//! Evaluation orchestration: trials, aggregation and the run loop.

pub mod aggregate;
pub mod runner;
pub mod trial;

pub use runner::{CaseEvaluation, RunPolicy, Runner, Selection};
pub use trial::{run_trial, TrialContext, TrialFailure, TrialOutcome, TrialStage};
