//! Error taxonomy for the edit pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::types::FailureKind;
use crate::io::timeout::budget_millis;

/// Failure of a timeout-guarded step.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("timed out after {}s while {phase}", .budget.as_secs_f64())]
    Timeout { phase: String, budget: Duration },

    /// The detached task running the step panicked or was shut down.
    #[error("{phase} was aborted before completing")]
    Aborted { phase: String },
}

/// Misuse of the edit session state machine or an I/O failure inside it.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {op} while session is {state}")]
    InvalidState { op: &'static str, state: &'static str },

    #[error("path escapes the workspace root: {}", .0.display())]
    OutsideWorkspace(PathBuf),

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("{what}: {source}")]
    Collaborator {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Terminal error of one edit request.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("missing required parameter '{name}'")]
    MissingParameter { name: &'static str },

    #[error("access denied: {path}")]
    AccessDenied { path: String },

    #[error("file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("timed out after {}s while {phase}", .budget.as_secs_f64())]
    Timeout { phase: String, budget: Duration },

    #[error("diff could not be applied ({})", extent(.partial))]
    StrategyFailure { partial: bool },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

fn extent(partial: &bool) -> &'static str {
    if *partial { "partial" } else { "total" }
}

impl EditError {
    pub fn kind(&self) -> FailureKind {
        match self {
            EditError::MissingParameter { name } => FailureKind::MissingParameter {
                name: (*name).to_string(),
            },
            EditError::AccessDenied { .. } => FailureKind::AccessDenied,
            EditError::NotFound { .. } => FailureKind::NotFound,
            EditError::Timeout { phase, budget } => FailureKind::Timeout {
                phase: phase.clone(),
                budget_ms: budget_millis(*budget),
            },
            EditError::StrategyFailure { partial } => FailureKind::StrategyFailure {
                partial: *partial,
            },
            EditError::Unexpected(_) => FailureKind::Unexpected,
        }
    }
}

impl From<GuardError> for EditError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Timeout { phase, budget } => EditError::Timeout { phase, budget },
            aborted @ GuardError::Aborted { .. } => EditError::Unexpected(aborted.into()),
        }
    }
}

impl From<SessionError> for EditError {
    fn from(err: SessionError) -> Self {
        EditError::Unexpected(err.into())
    }
}
