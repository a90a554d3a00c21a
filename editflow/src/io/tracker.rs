//! File-context tracking: which files the agent has touched and why.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextReason {
    /// The pipeline wrote the file on the agent's behalf.
    AgentEdited,
}

#[async_trait]
pub trait FileContextTracker: Send + Sync {
    async fn track(&self, rel_path: &str, reason: ContextReason) -> Result<()>;
}

/// Tracker that keeps entries in memory, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    entries: Mutex<Vec<(String, ContextReason)>>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, ContextReason)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl FileContextTracker for InMemoryTracker {
    async fn track(&self, rel_path: &str, reason: ContextReason) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push((rel_path.to_string(), reason));
        Ok(())
    }
}
