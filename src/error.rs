//! Error types at the pipeline boundary.
//!
//! Only structural failures surface here. Section, report and comparison
//! problems are absorbed into degraded output long before this point.

use crate::llm::LlmError;
use crate::store::StoreError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors returned by the programmatic API.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A snapshot or analysis does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Malformed request options.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Anything else, with the original message preserved.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn snapshot_not_found(id: &str) -> Self {
        PipelineError::NotFound {
            kind: "Snapshot",
            id: id.to_string(),
        }
    }

    pub fn analysis_not_found(id: &str) -> Self {
        PipelineError::NotFound {
            kind: "Analysis",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::NotFound { .. })
    }

    /// Process exit code for the CLI (404 / 400 / 500 equivalents).
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::NotFound { .. } => 3,
            PipelineError::Validation(_) => 2,
            PipelineError::Internal(_) => 1,
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => PipelineError::NotFound {
                kind: "Resource",
                id: what,
            },
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        PipelineError::Internal(err.to_string())
    }
}
