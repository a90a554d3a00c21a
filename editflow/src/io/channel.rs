//! Human-visible channel, distinct from the tool result sent to the agent.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::types::ProgressStatus;

#[async_trait]
pub trait HumanChannel: Send + Sync {
    /// Show an error to the human supervising the task.
    async fn report_error(&self, path: &Path, message: &str) -> Result<()>;

    /// Refresh the progress indicator for an in-flight edit.
    async fn report_progress(&self, path: &Path, status: Option<&ProgressStatus>) -> Result<()>;
}

/// Channel that forwards to tracing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

#[async_trait]
impl HumanChannel for LogChannel {
    async fn report_error(&self, path: &Path, message: &str) -> Result<()> {
        warn!(path = %path.display(), "{message}");
        Ok(())
    }

    async fn report_progress(&self, path: &Path, status: Option<&ProgressStatus>) -> Result<()> {
        let text = status.and_then(|status| status.text.as_deref()).unwrap_or("");
        info!(path = %path.display(), progress = text, "edit in progress");
        Ok(())
    }
}
