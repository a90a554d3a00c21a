//! Pluggable diff-application strategies.
//!
//! The concrete matching algorithms live outside this crate. Each variant
//! (standard, multi-block, unified) is one [`DiffStrategy`] implementation,
//! and the orchestrator receives exactly one of them at construction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::types::{ApplyDiffRequest, DiffOutcome, ProgressStatus};

/// Tag identifying a strategy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Standard,
    #[default]
    MultiBlock,
    Unified,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Standard => "standard",
            StrategyKind::MultiBlock => "multi_block",
            StrategyKind::Unified => "unified",
        };
        f.write_str(name)
    }
}

#[async_trait]
pub trait DiffStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Compute new content from `original` and a diff specification.
    ///
    /// Expected mismatches are reported as [`DiffOutcome::Failed`]; `Err` is
    /// reserved for unexpected faults.
    async fn apply_diff(
        &self,
        original: &str,
        diff: &str,
        start_line_hint: Option<usize>,
    ) -> Result<DiffOutcome>;

    /// Optional progress hint for a request, refreshed with the outcome once
    /// one exists.
    fn progress_status(
        &self,
        _request: &ApplyDiffRequest,
        _outcome: Option<&DiffOutcome>,
    ) -> Option<ProgressStatus> {
        None
    }
}

/// Strategies registered by the host, one per kind.
#[derive(Clone, Default)]
pub struct StrategySet {
    strategies: HashMap<StrategyKind, Arc<dyn DiffStrategy>>,
}

impl StrategySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: Arc<dyn DiffStrategy>) -> Self {
        self.strategies.insert(strategy.kind(), strategy);
        self
    }

    /// The strategy for `kind`, if the host registered one.
    pub fn select(&self, kind: StrategyKind) -> Option<Arc<dyn DiffStrategy>> {
        self.strategies.get(&kind).cloned()
    }
}
