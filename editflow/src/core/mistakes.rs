//! Consecutive-failure counters scoped to one task.
//!
//! Nothing here is persisted. Counters live as long as the owning task and may
//! be shared across concurrent edit requests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Per-path count of consecutive failed apply attempts.
#[derive(Debug, Default)]
pub struct MistakeCounter {
    counts: Mutex<HashMap<PathBuf, u32>>,
}

impl MistakeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the count for `path` and return the new value.
    pub fn record_failure(&self, path: &Path) -> u32 {
        let mut counts = self.lock();
        let count = counts.entry(path.to_path_buf()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Forget the count for `path` after a successful apply.
    pub fn clear(&self, path: &Path) {
        self.lock().remove(path);
    }

    /// Current count for `path` (zero when absent).
    pub fn count(&self, path: &Path) -> u32 {
        self.lock().get(path).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, u32>> {
        // The map is always left consistent, so a poisoned lock is still usable.
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Counters owned by a task: per-path apply failures plus the task-wide
/// consecutive mistake count.
#[derive(Debug, Default)]
pub struct TaskCounters {
    pub per_path: MistakeCounter,
    consecutive: AtomicU32,
}

impl TaskCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the task-level count and return the new value.
    pub fn record_mistake(&self) -> u32 {
        self.consecutive.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset_mistakes(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
    }

    pub fn consecutive_mistakes(&self) -> u32 {
        self.consecutive.load(Ordering::SeqCst)
    }
}
