//! Diagnostics collaborator (language servers, linters, ...).

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::diagnostics::{DiagnosticsSnapshot, Severity, delta_message};

#[async_trait]
pub trait DiagnosticsSource: Send + Sync {
    /// Current issues for every file the source knows about.
    async fn snapshot(&self) -> Result<DiagnosticsSnapshot>;

    /// Text describing issues introduced between `pre` and `post`, or an
    /// empty string when nothing new at `min` severity or above appeared.
    fn delta(
        &self,
        pre: &DiagnosticsSnapshot,
        post: &DiagnosticsSnapshot,
        min: Severity,
        root: &Path,
    ) -> String {
        delta_message(pre, post, min, root)
    }
}

/// Source that never reports anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

#[async_trait]
impl DiagnosticsSource for NoDiagnostics {
    async fn snapshot(&self) -> Result<DiagnosticsSnapshot> {
        Ok(DiagnosticsSnapshot::new())
    }
}
