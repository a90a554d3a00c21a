//! Deadline guard for I/O-bound pipeline steps.
//!
//! The guarded operation runs on a detached tokio task. When the deadline
//! elapses first, the task is abandoned rather than aborted: it keeps running
//! and whatever it eventually produces (including a late disk write) is
//! discarded. Callers must tolerate such late side effects.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::GuardError;

/// Pipeline steps that get their own deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    CheckExists,
    Read,
    Open,
    Apply,
    /// Streamed updates and reverts that touch the file outside of a save.
    Write,
    Save,
}

impl Phase {
    /// Human-readable step name used in timeout messages.
    pub fn description(self) -> &'static str {
        match self {
            Phase::CheckExists => "checking if file exists",
            Phase::Read => "reading file",
            Phase::Open => "opening file for editing",
            Phase::Apply => "applying diff",
            Phase::Write => "writing file",
            Phase::Save => "saving file",
        }
    }
}

/// Independent per-phase budgets. A slow step never consumes another's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimeouts {
    pub check_exists: Duration,
    pub read: Duration,
    pub open: Duration,
    pub apply: Duration,
    pub write: Duration,
    pub save: Duration,
}

impl PhaseTimeouts {
    pub fn budget(&self, phase: Phase) -> Duration {
        match phase {
            Phase::CheckExists => self.check_exists,
            Phase::Read => self.read,
            Phase::Open => self.open,
            Phase::Apply => self.apply,
            Phase::Write => self.write,
            Phase::Save => self.save,
        }
    }

    /// Same budget for every phase (handy in tests).
    pub fn uniform(budget: Duration) -> Self {
        Self {
            check_exists: budget,
            read: budget,
            open: budget,
            apply: budget,
            write: budget,
            save: budget,
        }
    }
}

/// Race `operation` against `budget`.
///
/// Returns the operation's output, `GuardError::Timeout` naming `phase` when
/// the deadline wins, or `GuardError::Aborted` when the task panicked.
pub async fn guard<F, T>(operation: F, budget: Duration, phase: &str) -> Result<T, GuardError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(operation);
    match tokio::time::timeout(budget, handle).await {
        Ok(Ok(value)) => {
            debug!(phase, "guarded step completed");
            Ok(value)
        }
        Ok(Err(join_err)) => {
            warn!(phase, err = %join_err, "guarded step aborted");
            Err(GuardError::Aborted {
                phase: phase.to_string(),
            })
        }
        Err(_) => {
            // Dropping the join handle detaches the task; it is not cancelled.
            warn!(
                phase,
                budget_ms = budget_millis(budget),
                "guarded step timed out, abandoning it"
            );
            Err(GuardError::Timeout {
                phase: phase.to_string(),
                budget,
            })
        }
    }
}

/// Whole milliseconds in `budget`, saturating at `u64::MAX`.
pub fn budget_millis(budget: Duration) -> u64 {
    u64::try_from(budget.as_millis()).unwrap_or(u64::MAX)
}

/// [`guard`] using the budget and description configured for `phase`.
pub async fn guard_phase<F, T>(
    operation: F,
    timeouts: &PhaseTimeouts,
    phase: Phase,
) -> Result<T, GuardError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    guard(operation, timeouts.budget(phase), phase.description()).await
}
