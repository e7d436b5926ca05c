pub mod artifacts;
pub mod console;
pub mod json;
pub mod progress;
pub mod summary;

pub use artifacts::ArtifactWriter;
pub use summary::{FailedTrial, RunReport, RunSummary, SkippedCase};
