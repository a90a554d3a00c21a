//! Approval gate between a computed edit and the commit to disk.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// What the caller is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalRequest {
    /// Path relative to the workspace root.
    pub path: String,
    /// Tool that produced the edit (`apply_diff`, `write_to_file`).
    pub tool: &'static str,
    /// The diff specification or full content being committed.
    pub preview: String,
    /// Whether the edit creates a new file.
    pub is_new_file: bool,
}

#[async_trait]
pub trait Approver: Send + Sync {
    /// `true` to commit the edit, `false` to revert it.
    async fn approve(&self, request: &ApprovalRequest) -> Result<bool>;
}

/// Approves everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Approver for AutoApprove {
    async fn approve(&self, _request: &ApprovalRequest) -> Result<bool> {
        Ok(true)
    }
}

/// Asks on stderr and reads a `y`/`n` answer from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptApprover;

#[async_trait]
impl Approver for PromptApprover {
    async fn approve(&self, request: &ApprovalRequest) -> Result<bool> {
        let verb = if request.is_new_file { "Create" } else { "Apply changes to" };
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(format!("{verb} {}? [y/N] ", request.path).as_bytes())
            .await
            .context("write approval prompt")?;
        stderr.flush().await.context("flush approval prompt")?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("read approval answer")?;
        Ok(is_yes(&line))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
