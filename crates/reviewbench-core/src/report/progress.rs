//! Run progress. The runner emits done/total in completion order; the console
//! layer consumes it via a sink.

use std::sync::Arc;

/// One progress update: how many cases are finished out of the selection.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub done: usize,
    pub total: usize,
    pub test_case: String,
    pub scored: bool,
}

pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
