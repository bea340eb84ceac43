//! Error types for the statusbook CLI
//!
//! Messages are user-facing and say what to check next.

use statusbook_common::StatusbookError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Loading, storing or configuration failed in the core library
    #[error(transparent)]
    Statusbook(#[from] StatusbookError),

    /// The load ran but at least one batch failed
    #[error("Load of {kind} from '{file}' did not complete: {failed} of {total} batches failed. Earlier batches may already be stored; rerunning is safe because existing ids are skipped.")]
    LoadFailed {
        kind: String,
        file: String,
        failed: usize,
        total: usize,
    },

    /// Interactive prompt failed or was cancelled
    #[error("Prompt failed: {0}")]
    Prompt(#[from] inquire::InquireError),

    /// Writing the worker report failed
    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<statusbook_common::StoreError> for CliError {
    fn from(err: statusbook_common::StoreError) -> Self {
        CliError::Statusbook(err.into())
    }
}

impl CliError {
    /// True if the user cancelled a prompt (Esc or Ctrl-C)
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            CliError::Prompt(
                inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted
            )
        )
    }
}
