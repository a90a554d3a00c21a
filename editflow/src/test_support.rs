//! Test-only fakes for the edit pipeline's collaborators.
//!
//! Each fake records what it was asked and answers from a script, so tests
//! can assert on both the outcome and the interaction.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tempfile::TempDir;

use crate::core::decorations::PreviewDecorations;
use crate::core::diagnostics::{Diagnostic, DiagnosticsSnapshot, Severity};
use crate::core::types::{ApplyDiffRequest, DiffOutcome, ProgressStatus};
use crate::io::approval::{ApprovalRequest, Approver};
use crate::io::channel::HumanChannel;
use crate::io::diagnostics::DiagnosticsSource;
use crate::io::fs::{FileStore, LocalFileStore};
use crate::io::strategy::{DiffStrategy, StrategyKind};
use crate::io::surface::EditorSurface;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scratch workspace root backed by a temp directory.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Write `contents` at `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, contents).expect("write workspace file");
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel)).expect("read workspace file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.dir.path().join(rel).exists()
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments of one `apply_diff` call seen by [`ScriptedStrategy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyCall {
    pub original: String,
    pub diff: String,
    pub start_line_hint: Option<usize>,
}

/// Strategy answering from a queue of outcomes.
///
/// An exhausted queue yields a failed outcome.
pub struct ScriptedStrategy {
    kind: StrategyKind,
    outcomes: Mutex<VecDeque<Result<DiffOutcome, String>>>,
    progress: Option<ProgressStatus>,
    delay: Option<Duration>,
    calls: Mutex<Vec<StrategyCall>>,
}

impl ScriptedStrategy {
    pub fn new(outcomes: Vec<DiffOutcome>) -> Self {
        Self::from_results(outcomes.into_iter().map(Ok).collect())
    }

    /// Strategy whose only call fails with an unexpected error.
    pub fn erroring(message: &str) -> Self {
        Self::from_results(vec![Err(message.to_string())])
    }

    fn from_results(outcomes: Vec<Result<DiffOutcome, String>>) -> Self {
        Self {
            kind: StrategyKind::MultiBlock,
            outcomes: Mutex::new(outcomes.into()),
            progress: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_kind(mut self, kind: StrategyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_progress(mut self, status: ProgressStatus) -> Self {
        self.progress = Some(status);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<StrategyCall> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl DiffStrategy for ScriptedStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn apply_diff(
        &self,
        original: &str,
        diff: &str,
        start_line_hint: Option<usize>,
    ) -> Result<DiffOutcome> {
        lock(&self.calls).push(StrategyCall {
            original: original.to_string(),
            diff: diff.to_string(),
            start_line_hint,
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.outcomes).pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(DiffOutcome::failed("no scripted outcome left")),
        }
    }

    fn progress_status(
        &self,
        _request: &ApplyDiffRequest,
        _outcome: Option<&DiffOutcome>,
    ) -> Option<ProgressStatus> {
        self.progress.clone()
    }
}

/// Approver answering from a queue; approves once the queue is empty.
#[derive(Default)]
pub struct ScriptedApprover {
    answers: Mutex<VecDeque<bool>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ApprovalRequest>>,
}

impl ScriptedApprover {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Take `delay` to answer, like a human reading the preview.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ApprovalRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Approver for ScriptedApprover {
    async fn approve(&self, request: &ApprovalRequest) -> Result<bool> {
        lock(&self.requests).push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(lock(&self.answers).pop_front().unwrap_or(true))
    }
}

/// Human channel that records every report.
#[derive(Default)]
pub struct RecordingChannel {
    errors: Mutex<Vec<(PathBuf, String)>>,
    progress: Mutex<Vec<Option<ProgressStatus>>>,
}

impl RecordingChannel {
    pub fn errors(&self) -> Vec<(PathBuf, String)> {
        lock(&self.errors).clone()
    }

    pub fn progress(&self) -> Vec<Option<ProgressStatus>> {
        lock(&self.progress).clone()
    }
}

#[async_trait]
impl HumanChannel for RecordingChannel {
    async fn report_error(&self, path: &Path, message: &str) -> Result<()> {
        lock(&self.errors).push((path.to_path_buf(), message.to_string()));
        Ok(())
    }

    async fn report_progress(&self, _path: &Path, status: Option<&ProgressStatus>) -> Result<()> {
        lock(&self.progress).push(status.cloned());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceCall {
    IsDirty,
    SaveDocument,
    CloseViews,
    OpenPreview,
    UpdatePreview,
    ClearDecorations,
    ShowDiff,
    ClosePreview,
}

/// Editor surface that records calls in order.
#[derive(Default)]
pub struct RecordingSurface {
    dirty: bool,
    calls: Mutex<Vec<SurfaceCall>>,
}

impl RecordingSurface {
    /// Surface whose open document has unsaved changes.
    pub fn dirty() -> Self {
        Self {
            dirty: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: SurfaceCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl EditorSurface for RecordingSurface {
    async fn is_dirty(&self, _path: &Path) -> Result<bool> {
        self.record(SurfaceCall::IsDirty);
        Ok(self.dirty)
    }

    async fn save_document(&self, _path: &Path) -> Result<()> {
        self.record(SurfaceCall::SaveDocument);
        Ok(())
    }

    async fn close_views(&self, _path: &Path) -> Result<()> {
        self.record(SurfaceCall::CloseViews);
        Ok(())
    }

    async fn open_preview(&self, _path: &Path, _original: &str) -> Result<()> {
        self.record(SurfaceCall::OpenPreview);
        Ok(())
    }

    async fn update_preview(
        &self,
        _path: &Path,
        _content: &str,
        _decorations: &PreviewDecorations,
    ) -> Result<()> {
        self.record(SurfaceCall::UpdatePreview);
        Ok(())
    }

    async fn clear_decorations(&self, _path: &Path) -> Result<()> {
        self.record(SurfaceCall::ClearDecorations);
        Ok(())
    }

    async fn show_diff(&self, _path: &Path, _original: &str, _updated: &str) -> Result<()> {
        self.record(SurfaceCall::ShowDiff);
        Ok(())
    }

    async fn close_preview(&self, _path: &Path) -> Result<()> {
        self.record(SurfaceCall::ClosePreview);
        Ok(())
    }
}

/// Diagnostics source whose snapshot the test sets directly.
#[derive(Default)]
pub struct FakeDiagnostics {
    current: Mutex<DiagnosticsSnapshot>,
}

impl FakeDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the issues for `path` with error-severity entries.
    pub fn set_errors(&self, path: &Path, errors: &[(u32, &str)]) {
        let issues = errors
            .iter()
            .map(|(line, message)| Diagnostic {
                line: *line,
                severity: Severity::Error,
                message: (*message).to_string(),
                source: Some("fake".to_string()),
            })
            .collect();
        lock(&self.current).insert(path.to_path_buf(), issues);
    }
}

#[async_trait]
impl DiagnosticsSource for FakeDiagnostics {
    async fn snapshot(&self) -> Result<DiagnosticsSnapshot> {
        Ok(lock(&self.current).clone())
    }
}

/// Local file store that counts I/O, records directory removals in order,
/// and can stall its existence check or writes to one path.
#[derive(Default)]
pub struct RecordingFileStore {
    exists_delay: Option<Duration>,
    stalled_write: Option<(PathBuf, Duration)>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    removed_dirs: Mutex<Vec<PathBuf>>,
}

impl RecordingFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stalling_exists(delay: Duration) -> Self {
        Self {
            exists_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Writes to `path` sleep for `delay` first; other paths are unaffected.
    pub fn stalling_writes_to(path: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            stalled_write: Some((path.into(), delay)),
            ..Self::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Directories passed to `remove_dir`, in call order.
    pub fn removed_dirs(&self) -> Vec<PathBuf> {
        lock(&self.removed_dirs).clone()
    }
}

#[async_trait]
impl FileStore for RecordingFileStore {
    async fn exists(&self, path: &Path) -> Result<bool> {
        if let Some(delay) = self.exists_delay {
            tokio::time::sleep(delay).await;
        }
        LocalFileStore.exists(path).await
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        LocalFileStore.read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some((stalled, delay)) = &self.stalled_write {
            if stalled == path {
                tokio::time::sleep(*delay).await;
            }
        }
        LocalFileStore.write(path, contents).await
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        LocalFileStore.create_dir(path).await
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        LocalFileStore.remove_file(path).await
    }

    async fn remove_dir(&self, path: &Path) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        lock(&self.removed_dirs).push(path.to_path_buf());
        LocalFileStore.remove_dir(path).await
    }
}
