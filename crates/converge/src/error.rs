//! Errors that stop a run

use crate::types::RunSummary;
use thiserror::Error;

/// Errors returned by the executor.
///
/// Soft failures never surface here; they are recorded in the
/// [`RunSummary`]. Only a failing fatal step aborts the run.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// A fatal step failed; nothing after it ran
    #[error("step '{step}' ({description}) failed: {message}")]
    Fatal {
        /// Id of the failed step
        step: String,
        /// Description of the failed step
        description: String,
        /// Error text from the check or action
        message: String,
        /// Everything recorded up to and including the failure
        summary: Box<RunSummary>,
    },
}

impl ExecuteError {
    /// Id of the step that aborted the run
    pub fn step(&self) -> &str {
        match self {
            Self::Fatal { step, .. } => step,
        }
    }

    /// The partial summary at the point of failure
    pub fn summary(&self) -> &RunSummary {
        match self {
            Self::Fatal { summary, .. } => summary,
        }
    }
}
