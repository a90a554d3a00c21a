//! Edit session: the state machine owning one file's in-flight edit.
//!
//! ```text
//! Empty -> Opening -> Open -> Streaming -> Finalized -> Saved | Reverted -> Empty
//! ```
//!
//! `reset` is reachable from every state and always lands in `Empty`.
//!
//! In direct mode every `update` is a disk write (content replacement). In
//! interactive mode nothing reaches disk before `save_changes`; updates only
//! drive the preview surface.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::core::decorations::{PreviewDecorations, preview_decorations};
use crate::core::diagnostics::{DiagnosticsSnapshot, Severity};
use crate::core::text::{drop_partial_last_line, normalize_for_write, preserve_trailing_newline};
use crate::core::types::{EditMode, FileMode};
use crate::error::SessionError;
use crate::io::diagnostics::DiagnosticsSource;
use crate::io::fs::{FileStore, create_missing_dirs};
use crate::io::surface::EditorSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Opening,
    Open,
    Streaming,
    Finalized,
    Saved,
    Reverted,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Opening => "opening",
            SessionState::Open => "open",
            SessionState::Streaming => "streaming",
            SessionState::Finalized => "finalized",
            SessionState::Saved => "saved",
            SessionState::Reverted => "reverted",
        }
    }
}

/// Result of committing a finalized edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResult {
    /// New error-severity diagnostics, empty when none appeared.
    pub diagnostics_message: String,
    /// Always `None`: the written content is authoritative and the preview is
    /// read-only, so there are no human edits to report.
    pub user_edits: Option<String>,
    /// Content as written to disk.
    pub final_content: String,
}

/// Collaborators an edit session talks to.
#[derive(Clone)]
pub struct SessionDeps {
    pub fs: Arc<dyn FileStore>,
    pub diagnostics: Arc<dyn DiagnosticsSource>,
    pub surface: Arc<dyn EditorSurface>,
}

pub struct EditSession {
    root: PathBuf,
    edit_mode: EditMode,
    deps: SessionDeps,
    state: SessionState,
    rel_path: Option<String>,
    abs_path: Option<PathBuf>,
    file_mode: Option<FileMode>,
    original_content: String,
    streamed_content: String,
    created_dirs: Vec<PathBuf>,
    pre_edit_diagnostics: DiagnosticsSnapshot,
    decorations: PreviewDecorations,
}

impl EditSession {
    pub fn new(root: impl Into<PathBuf>, edit_mode: EditMode, deps: SessionDeps) -> Self {
        Self {
            root: root.into(),
            edit_mode,
            deps,
            state: SessionState::Empty,
            rel_path: None,
            abs_path: None,
            file_mode: None,
            original_content: String::new(),
            streamed_content: String::new(),
            created_dirs: Vec::new(),
            pre_edit_diagnostics: DiagnosticsSnapshot::new(),
            decorations: PreviewDecorations::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    pub fn file_mode(&self) -> Option<FileMode> {
        self.file_mode
    }

    pub fn rel_path(&self) -> Option<&str> {
        self.rel_path.as_deref()
    }

    pub fn abs_path(&self) -> Option<&Path> {
        self.abs_path.as_deref()
    }

    pub fn original_content(&self) -> &str {
        &self.original_content
    }

    /// Directories created by `open`, in creation order.
    pub fn created_dirs(&self) -> &[PathBuf] {
        &self.created_dirs
    }

    pub fn decorations(&self) -> &PreviewDecorations {
        &self.decorations
    }

    /// Open `rel_path` for editing. Chooses create vs modify by existence.
    #[instrument(skip_all, fields(path = rel_path, mode = ?self.edit_mode))]
    pub async fn open(&mut self, rel_path: &str) -> Result<FileMode, SessionError> {
        self.expect_state("open", &[SessionState::Empty])?;
        let abs_path = resolve_in_root(&self.root, rel_path)?;

        self.state = SessionState::Opening;
        self.rel_path = Some(rel_path.to_string());
        self.abs_path = Some(abs_path.clone());

        match self.open_inner(&abs_path).await {
            Ok(mode) => {
                self.state = SessionState::Open;
                info!(file_mode = ?mode, "edit session opened");
                Ok(mode)
            }
            Err(err) => {
                warn!(err = %err, "open failed, rolling back");
                self.rollback_created().await;
                self.reset().await;
                Err(err)
            }
        }
    }

    async fn open_inner(&mut self, abs_path: &Path) -> Result<FileMode, SessionError> {
        let exists = self
            .deps
            .fs
            .exists(abs_path)
            .await
            .map_err(|source| io_err("stat", abs_path, source))?;
        let mode = if exists {
            FileMode::Modify
        } else {
            FileMode::Create
        };
        self.file_mode = Some(mode);

        if self.edit_mode == EditMode::Interactive && mode == FileMode::Modify {
            let dirty = self
                .deps
                .surface
                .is_dirty(abs_path)
                .await
                .map_err(|source| collaborator("check document state", source))?;
            if dirty {
                debug!("saving dirty document before snapshot");
                self.deps
                    .surface
                    .save_document(abs_path)
                    .await
                    .map_err(|source| collaborator("save open document", source))?;
            }
        }

        self.pre_edit_diagnostics = self
            .deps
            .diagnostics
            .snapshot()
            .await
            .map_err(|source| collaborator("snapshot diagnostics", source))?;

        match mode {
            FileMode::Modify => {
                self.original_content = self
                    .deps
                    .fs
                    .read_to_string(abs_path)
                    .await
                    .map_err(|source| io_err("read", abs_path, source))?;
            }
            FileMode::Create => {
                self.original_content = String::new();
                if let Some(parent) = abs_path.parent() {
                    self.created_dirs = create_missing_dirs(self.deps.fs.as_ref(), parent)
                        .await
                        .map_err(|source| io_err("create directories for", abs_path, source))?;
                }
                self.deps
                    .fs
                    .write(abs_path, "")
                    .await
                    .map_err(|source| io_err("create", abs_path, source))?;
            }
        }

        if self.edit_mode == EditMode::Interactive {
            if let Err(err) = self.deps.surface.close_views(abs_path).await {
                warn!(err = %err, "closing existing views failed");
            }
            if let Err(err) = self
                .deps
                .surface
                .open_preview(abs_path, &self.original_content)
                .await
            {
                warn!(err = %err, "opening preview failed");
            }
        }
        Ok(mode)
    }

    /// Feed accumulated content from the producer.
    ///
    /// Non-final content is truncated to its last complete line; the final
    /// call is used as given (keeping the original's trailing newline).
    #[instrument(skip_all, fields(len = content.len(), is_final = is_final))]
    pub async fn update(&mut self, content: &str, is_final: bool) -> Result<(), SessionError> {
        self.expect_state("update", &[SessionState::Open, SessionState::Streaming])?;
        let abs_path = self.require_abs_path("update")?;

        self.streamed_content = if is_final {
            preserve_trailing_newline(&self.original_content, content)
        } else {
            drop_partial_last_line(content).to_string()
        };

        match self.edit_mode {
            EditMode::Direct => {
                let bytes = normalize_for_write(&self.streamed_content, &self.original_content);
                self.deps
                    .fs
                    .write(&abs_path, &bytes)
                    .await
                    .map_err(|source| io_err("write", &abs_path, source))?;
            }
            EditMode::Interactive => self.refresh_preview(&abs_path, is_final).await,
        }

        self.state = if is_final {
            SessionState::Finalized
        } else {
            SessionState::Streaming
        };
        Ok(())
    }

    async fn refresh_preview(&mut self, abs_path: &Path, is_final: bool) {
        let surface = Arc::clone(&self.deps.surface);
        if !is_final {
            self.decorations = preview_decorations(&self.streamed_content);
            if let Err(err) = surface
                .update_preview(abs_path, &self.streamed_content, &self.decorations)
                .await
            {
                warn!(err = %err, "updating preview failed");
            }
            return;
        }

        self.decorations = PreviewDecorations::default();
        if let Err(err) = surface.clear_decorations(abs_path).await {
            warn!(err = %err, "clearing decorations failed");
        }
        if self.streamed_content != self.original_content {
            if let Err(err) = surface
                .show_diff(abs_path, &self.original_content, &self.streamed_content)
                .await
            {
                warn!(err = %err, "showing diff failed");
            }
        }
    }

    /// Commit the finalized content and report newly introduced errors.
    #[instrument(skip_all)]
    pub async fn save_changes(&mut self) -> Result<SaveResult, SessionError> {
        self.expect_state("save", &[SessionState::Finalized])?;
        let abs_path = self.require_abs_path("save")?;

        let final_content = normalize_for_write(&self.streamed_content, &self.original_content);
        self.deps
            .fs
            .write(&abs_path, &final_content)
            .await
            .map_err(|source| io_err("write", &abs_path, source))?;

        if self.edit_mode == EditMode::Interactive {
            if let Err(err) = self.deps.surface.close_preview(&abs_path).await {
                warn!(err = %err, "closing preview failed");
            }
        }

        let post = self
            .deps
            .diagnostics
            .snapshot()
            .await
            .map_err(|source| collaborator("snapshot diagnostics", source))?;
        let diagnostics_message = self.deps.diagnostics.delta(
            &self.pre_edit_diagnostics,
            &post,
            Severity::Error,
            &self.root,
        );

        self.state = SessionState::Saved;
        info!(bytes = final_content.len(), "edit saved");
        Ok(SaveResult {
            diagnostics_message,
            user_edits: None,
            final_content,
        })
    }

    /// Undo everything the session did to disk, then reset.
    ///
    /// Create mode deletes the file and the directories `open` created, in
    /// reverse creation order; directories that cannot be removed are logged
    /// and left in place. Modify mode restores the original bytes.
    #[instrument(skip_all)]
    pub async fn revert_changes(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Empty {
            return Err(SessionError::InvalidState {
                op: "revert",
                state: self.state.name(),
            });
        }
        let abs_path = self.require_abs_path("revert")?;

        match self.file_mode {
            Some(FileMode::Create) => self.rollback_created().await,
            Some(FileMode::Modify) => {
                self.deps
                    .fs
                    .write(&abs_path, &self.original_content)
                    .await
                    .map_err(|source| io_err("restore", &abs_path, source))?;
            }
            None => {}
        }

        if self.edit_mode == EditMode::Interactive {
            if let Err(err) = self.deps.surface.close_preview(&abs_path).await {
                warn!(err = %err, "closing preview failed");
            }
        }
        self.state = SessionState::Reverted;
        info!("edit reverted");
        self.reset().await;
        Ok(())
    }

    /// Delete the created file and directories. Failures are logged.
    async fn rollback_created(&mut self) {
        if self.file_mode != Some(FileMode::Create) {
            return;
        }
        let Some(abs_path) = self.abs_path.clone() else {
            return;
        };
        let fs = Arc::clone(&self.deps.fs);
        match fs.exists(&abs_path).await {
            Ok(true) => {
                if let Err(err) = fs.remove_file(&abs_path).await {
                    warn!(path = %abs_path.display(), err = %err, "removing created file failed");
                }
            }
            Ok(false) => {}
            Err(err) => warn!(path = %abs_path.display(), err = %err, "stat created file failed"),
        }
        for dir in self.created_dirs.iter().rev() {
            if let Err(err) = fs.remove_dir(dir).await {
                warn!(dir = %dir.display(), err = %err, "removing created directory failed");
            }
        }
        self.created_dirs.clear();
    }

    /// Return to `Empty`. Always succeeds and is safe to repeat.
    pub async fn reset(&mut self) {
        if self.edit_mode == EditMode::Interactive
            && !matches!(
                self.state,
                SessionState::Empty | SessionState::Saved | SessionState::Reverted
            )
        {
            if let Some(abs_path) = &self.abs_path {
                if let Err(err) = self.deps.surface.close_preview(abs_path).await {
                    warn!(err = %err, "closing preview during reset failed");
                }
            }
        }
        self.state = SessionState::Empty;
        self.rel_path = None;
        self.abs_path = None;
        self.file_mode = None;
        self.original_content.clear();
        self.streamed_content.clear();
        self.created_dirs.clear();
        self.pre_edit_diagnostics.clear();
        self.decorations = PreviewDecorations::default();
    }

    fn expect_state(&self, op: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(SessionError::InvalidState {
            op,
            state: self.state.name(),
        })
    }

    fn require_abs_path(&self, op: &'static str) -> Result<PathBuf, SessionError> {
        self.abs_path.clone().ok_or(SessionError::InvalidState {
            op,
            state: self.state.name(),
        })
    }
}

/// Resolve `rel_path` against `root` lexically, refusing to escape it.
pub fn resolve_in_root(root: &Path, rel_path: &str) -> Result<PathBuf, SessionError> {
    let joined = root.join(rel_path);
    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(SessionError::OutsideWorkspace(joined));
                }
            }
            Component::CurDir => {}
            other => resolved.push(other.as_os_str()),
        }
    }
    if !resolved.starts_with(root) {
        return Err(SessionError::OutsideWorkspace(joined));
    }
    Ok(resolved)
}

fn io_err(action: &'static str, path: &Path, source: anyhow::Error) -> SessionError {
    SessionError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

fn collaborator(what: &'static str, source: anyhow::Error) -> SessionError {
    SessionError::Collaborator { what, source }
}
