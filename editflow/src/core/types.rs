//! Shared deterministic types for the edit pipeline.
//!
//! These types define the contracts between the orchestrator, the edit
//! session and the collaborators. They carry no I/O.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an edit session reaches disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Every streamed update is written straight to disk.
    #[default]
    Direct,
    /// Updates drive a read-only preview; disk is written only on save.
    Interactive,
}

/// Whether the session creates a new file or modifies an existing one.
///
/// Fixed at open time by an existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    Create,
    Modify,
}

/// Outcome of one diff part (hunk/block) reported by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl PartResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            details: None,
        }
    }

    pub fn failed(error: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            details,
        }
    }
}

/// Result of applying a diff specification to original text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DiffOutcome {
    /// New content was produced. `parts` may still contain failed parts when
    /// only some hunks applied.
    Applied {
        content: String,
        #[serde(default)]
        parts: Vec<PartResult>,
    },
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
        #[serde(default)]
        parts: Vec<PartResult>,
    },
}

impl DiffOutcome {
    pub fn applied(content: impl Into<String>) -> Self {
        DiffOutcome::Applied {
            content: content.into(),
            parts: Vec::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        DiffOutcome::Failed {
            error: error.into(),
            details: None,
            parts: Vec::new(),
        }
    }

    pub fn parts(&self) -> &[PartResult] {
        match self {
            DiffOutcome::Applied { parts, .. } | DiffOutcome::Failed { parts, .. } => parts,
        }
    }

    /// True when at least one part failed while at least one other succeeded.
    pub fn is_partial(&self) -> bool {
        let parts = self.parts();
        parts.iter().any(|part| part.success) && parts.iter().any(|part| !part.success)
    }

    pub fn has_failed_parts(&self) -> bool {
        self.parts().iter().any(|part| !part.success)
    }
}

/// Progress hint a strategy may derive from a (possibly partial) request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ProgressStatus {
    pub fn is_empty(&self) -> bool {
        self.icon.is_none() && self.text.is_none()
    }
}

/// Raw parameters of an `apply_diff` request as produced by the agent.
///
/// Fields are optional because a streaming producer may not have emitted them
/// yet; `partial` marks a block that is still being produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplyDiffRequest {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub diff: Option<String>,
    #[serde(default)]
    pub start_line: Option<String>,
    #[serde(default)]
    pub partial: bool,
}

impl ApplyDiffRequest {
    pub fn new(path: impl Into<String>, diff: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            diff: Some(diff.into()),
            start_line: None,
            partial: false,
        }
    }

    /// Parsed start-line hint; unparseable values are ignored.
    pub fn start_line_hint(&self) -> Option<usize> {
        self.start_line
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
    }
}

/// Raw parameters of a whole-file write request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteFileRequest {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub partial: bool,
}

impl WriteFileRequest {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            content: Some(content.into()),
            partial: false,
        }
    }
}

/// Error category reported in an [`EditOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    MissingParameter { name: String },
    AccessDenied,
    NotFound,
    Timeout { phase: String, budget_ms: u64 },
    StrategyFailure { partial: bool },
    Unexpected,
}

/// What happened to one edit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Partial block; only progress was refreshed.
    Progress,
    Applied { partial_failures: bool },
    Rejected,
    Failed(FailureKind),
}

/// Structured result of one orchestrator invocation.
///
/// Observers (logging, telemetry) consume this value instead of subscribing to
/// ambient events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    pub path: Option<PathBuf>,
    #[serde(flatten)]
    pub kind: OutcomeKind,
    /// Text returned to the calling agent as the tool result.
    pub tool_result: String,
    /// Whether the error was also surfaced on the human-visible channel.
    pub surfaced: bool,
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.kind, OutcomeKind::Applied { .. })
    }

    pub fn failure(&self) -> Option<&FailureKind> {
        match &self.kind {
            OutcomeKind::Failed(kind) => Some(kind),
            _ => None,
        }
    }
}
