//! Diff orchestrator: drives one edit request from raw tool parameters to a
//! structured [`EditOutcome`].
//!
//! Collaborators are injected at construction. The orchestrator never
//! publishes events; callers observe the returned outcome.
//!
//! Every request owns its own [`EditSession`]. The only state shared between
//! concurrent requests is the mistake counters and the table of `write_file`
//! sessions still streaming, which is keyed by absolute path.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard, PoisonError};

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::core::messages;
use crate::core::mistakes::TaskCounters;
use crate::core::types::{
    ApplyDiffRequest, DiffOutcome, EditMode, EditOutcome, FileMode, OutcomeKind, WriteFileRequest,
};
use crate::error::EditError;
use crate::io::access::{AccessControl, AllowAll};
use crate::io::approval::{ApprovalRequest, Approver, AutoApprove};
use crate::io::channel::{HumanChannel, LogChannel};
use crate::io::config::EditConfig;
use crate::io::diagnostics::{DiagnosticsSource, NoDiagnostics};
use crate::io::fs::{FileStore, LocalFileStore};
use crate::io::strategy::{DiffStrategy, StrategyKind, StrategySet};
use crate::io::surface::{EditorSurface, HeadlessSurface};
use crate::io::timeout::{Phase, PhaseTimeouts, guard_phase};
use crate::io::tracker::{ContextReason, FileContextTracker, InMemoryTracker};
use crate::session::{EditSession, SaveResult, SessionDeps, SessionState, resolve_in_root};

const APPLY_DIFF_TOOL: &str = "apply_diff";
const WRITE_FILE_TOOL: &str = "write_to_file";

/// Session handle shared between a request and the guarded steps it spawns.
type SharedSession = Arc<Mutex<EditSession>>;

/// Everything the orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub fs: Arc<dyn FileStore>,
    /// Selected once; `None` makes every apply fail without invoking anything.
    pub strategy: Option<Arc<dyn DiffStrategy>>,
    pub access: Arc<dyn AccessControl>,
    pub diagnostics: Arc<dyn DiagnosticsSource>,
    pub surface: Arc<dyn EditorSurface>,
    pub tracker: Arc<dyn FileContextTracker>,
    pub approver: Arc<dyn Approver>,
    pub channel: Arc<dyn HumanChannel>,
}

impl Collaborators {
    /// Local disk, no editor, no diagnostics, everything allowed and approved.
    pub fn headless() -> Self {
        Self {
            fs: Arc::new(LocalFileStore),
            strategy: None,
            access: Arc::new(AllowAll),
            diagnostics: Arc::new(NoDiagnostics),
            surface: Arc::new(HeadlessSurface),
            tracker: Arc::new(InMemoryTracker::new()),
            approver: Arc::new(AutoApprove),
            channel: Arc::new(LogChannel),
        }
    }

    /// Use the `kind` variant from the host's registered strategies. An
    /// unregistered kind leaves no strategy configured.
    pub fn with_strategy_from(mut self, strategies: &StrategySet, kind: StrategyKind) -> Self {
        self.strategy = strategies.select(kind);
        if self.strategy.is_none() {
            info!(%kind, "no strategy registered for configured kind");
        }
        self
    }

    fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            fs: Arc::clone(&self.fs),
            diagnostics: Arc::clone(&self.diagnostics),
            surface: Arc::clone(&self.surface),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub mode: EditMode,
    pub timeouts: PhaseTimeouts,
    /// Consecutive failures on one path before the error reaches the human.
    pub escalation_threshold: u32,
}

impl OrchestratorSettings {
    pub fn from_config(config: &EditConfig) -> Self {
        Self {
            mode: config.mode,
            timeouts: config.timeouts.phase_timeouts(),
            escalation_threshold: config.escalation_threshold,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&EditConfig::default())
    }
}

pub struct DiffOrchestrator {
    root: PathBuf,
    settings: OrchestratorSettings,
    collab: Collaborators,
    counters: Arc<TaskCounters>,
    streams: std::sync::Mutex<HashMap<PathBuf, SharedSession>>,
}

impl DiffOrchestrator {
    pub fn new(
        root: impl Into<PathBuf>,
        settings: OrchestratorSettings,
        collab: Collaborators,
        counters: Arc<TaskCounters>,
    ) -> Self {
        Self {
            root: root.into(),
            settings,
            collab,
            counters,
            streams: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Build from loaded config. The strategy is picked from `strategies` by
    /// `config.strategy`, replacing whatever `collab` carried.
    pub fn from_config(
        root: impl Into<PathBuf>,
        config: &EditConfig,
        strategies: &StrategySet,
        collab: Collaborators,
        counters: Arc<TaskCounters>,
    ) -> Self {
        Self::new(
            root,
            OrchestratorSettings::from_config(config),
            collab.with_strategy_from(strategies, config.strategy),
            counters,
        )
    }

    pub fn counters(&self) -> &Arc<TaskCounters> {
        &self.counters
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Kind of the configured strategy, if any.
    pub fn strategy_kind(&self) -> Option<StrategyKind> {
        self.collab.strategy.as_ref().map(|strategy| strategy.kind())
    }

    /// Number of `write_file` sessions waiting for their final request.
    pub fn open_streams(&self) -> usize {
        self.streams().len()
    }

    fn streams(&self) -> MutexGuard<'_, HashMap<PathBuf, SharedSession>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new_session(&self) -> SharedSession {
        Arc::new(Mutex::new(EditSession::new(
            self.root.clone(),
            self.settings.mode,
            self.collab.session_deps(),
        )))
    }

    /// Run one `apply_diff` request.
    ///
    /// Partial requests only refresh progress. Complete requests run the full
    /// pipeline; every failure is folded into the returned outcome.
    #[instrument(skip_all, fields(path = request.path.as_deref().unwrap_or_default(), partial = request.partial))]
    pub async fn apply_diff(&self, request: ApplyDiffRequest) -> EditOutcome {
        if request.partial {
            return self.handle_partial(&request).await;
        }
        let session = self.new_session();
        let outcome = match self.run_apply(&request, &session).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.discard(&session).await;
                self.fail(request.path.as_deref(), err, "applying diff")
                    .await
            }
        };
        info!(outcome = ?outcome.kind, surfaced = outcome.surfaced, "apply_diff finished");
        outcome
    }

    /// Forward the strategy's progress hint for a block still being produced.
    pub async fn handle_partial(&self, request: &ApplyDiffRequest) -> EditOutcome {
        if let Some(rel_path) = request.path.as_deref() {
            self.report_progress(rel_path, request, None).await;
        }
        progress(request.path.as_deref())
    }

    async fn run_apply(
        &self,
        request: &ApplyDiffRequest,
        session: &SharedSession,
    ) -> Result<EditOutcome, EditError> {
        let rel_path = request
            .path
            .as_deref()
            .ok_or(EditError::MissingParameter { name: "path" })?;
        let diff = request
            .diff
            .as_deref()
            .ok_or(EditError::MissingParameter { name: "diff" })?;
        let abs_path = self.authorize(rel_path)?;

        let fs = Arc::clone(&self.collab.fs);
        let target = abs_path.clone();
        let exists = self
            .guarded(Phase::CheckExists, async move { fs.exists(&target).await })
            .await?;
        if !exists {
            return Err(EditError::NotFound { path: abs_path });
        }

        let fs = Arc::clone(&self.collab.fs);
        let target = abs_path.clone();
        let original = self
            .guarded(Phase::Read, async move { fs.read_to_string(&target).await })
            .await?;

        let result = match &self.collab.strategy {
            Some(strategy) => {
                let strategy = Arc::clone(strategy);
                let diff = diff.to_string();
                let hint = request.start_line_hint();
                self.guarded(Phase::Apply, async move {
                    strategy.apply_diff(&original, &diff, hint).await
                })
                .await?
            }
            None => DiffOutcome::failed("No diff strategy is configured for this session."),
        };

        let content = match &result {
            DiffOutcome::Applied { content, .. } => content.clone(),
            DiffOutcome::Failed {
                error,
                details,
                parts,
            } => {
                let message =
                    messages::strategy_failure(&abs_path, error, details.as_ref(), parts);
                return Ok(self
                    .strategy_failed(rel_path, &abs_path, message, result.is_partial())
                    .await);
            }
        };

        self.counters.per_path.clear(Path::new(rel_path));
        self.counters.reset_mistakes();

        self.open_session(session, rel_path).await?;
        self.update_session(session, content, true).await?;

        let approved = self
            .collab
            .approver
            .approve(&ApprovalRequest {
                path: rel_path.to_string(),
                tool: APPLY_DIFF_TOOL,
                preview: diff.to_string(),
                is_new_file: false,
            })
            .await
            .context("request approval")?;
        if !approved {
            return self.reject(session, rel_path).await;
        }

        let saved = self.save_session(session).await?;
        self.track(rel_path).await;

        let mut text = String::new();
        if result.has_failed_parts() {
            text.push_str(&messages::partial_failure_hint(&abs_path));
        }
        text.push_str(&messages::applied(rel_path, &saved.diagnostics_message));
        self.report_progress(rel_path, request, Some(&result)).await;

        Ok(EditOutcome {
            path: Some(PathBuf::from(rel_path)),
            kind: OutcomeKind::Applied {
                partial_failures: result.has_failed_parts(),
            },
            tool_result: text,
            surfaced: false,
        })
    }

    async fn strategy_failed(
        &self,
        rel_path: &str,
        abs_path: &Path,
        message: String,
        partial: bool,
    ) -> EditOutcome {
        let count = self.counters.per_path.record_failure(Path::new(rel_path));
        self.counters.record_mistake();
        warn!(path = rel_path, count, partial, "diff could not be applied");

        let mut surfaced = false;
        if count >= self.settings.escalation_threshold {
            match self.collab.channel.report_error(abs_path, &message).await {
                Ok(()) => surfaced = true,
                Err(err) => warn!(err = %err, "surfacing strategy failure failed"),
            }
        }
        EditOutcome {
            path: Some(PathBuf::from(rel_path)),
            kind: OutcomeKind::Failed(EditError::StrategyFailure { partial }.kind()),
            tool_result: message,
            surfaced,
        }
    }

    /// Run one whole-file write.
    ///
    /// Partial requests stream into a session kept for their path (direct
    /// mode writes them to disk as they arrive); the complete request takes
    /// that session over, finalizes, asks for approval, and saves or reverts.
    #[instrument(skip_all, fields(path = request.path.as_deref().unwrap_or_default(), partial = request.partial))]
    pub async fn write_file(&self, request: WriteFileRequest) -> EditOutcome {
        let session = self.write_session(request.path.as_deref());
        let result = if request.partial {
            self.stream_partial_write(&request, &session).await
        } else {
            self.run_write(&request, &session).await
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                self.discard(&session).await;
                self.fail(request.path.as_deref(), err, "writing file")
                    .await
            }
        };
        if !request.partial {
            info!(outcome = ?outcome.kind, surfaced = outcome.surfaced, "write_file finished");
        }
        outcome
    }

    /// The streaming session for `rel_path`, or a fresh one.
    fn write_session(&self, rel_path: Option<&str>) -> SharedSession {
        rel_path
            .and_then(|rel| resolve_in_root(&self.root, rel).ok())
            .and_then(|abs| self.streams().get(&abs).cloned())
            .unwrap_or_else(|| self.new_session())
    }

    async fn stream_partial_write(
        &self,
        request: &WriteFileRequest,
        session: &SharedSession,
    ) -> Result<EditOutcome, EditError> {
        let (Some(rel_path), Some(content)) = (request.path.as_deref(), request.content.as_deref())
        else {
            return Ok(progress(request.path.as_deref()));
        };
        // Policy errors are reported once the request is complete.
        let Ok(abs_path) = self.authorize(rel_path) else {
            return Ok(progress(Some(rel_path)));
        };
        self.open_session(session, rel_path).await?;
        self.update_session(session, content.to_string(), false)
            .await?;
        self.streams()
            .entry(abs_path)
            .or_insert_with(|| Arc::clone(session));
        Ok(progress(Some(rel_path)))
    }

    async fn run_write(
        &self,
        request: &WriteFileRequest,
        session: &SharedSession,
    ) -> Result<EditOutcome, EditError> {
        let rel_path = request
            .path
            .as_deref()
            .ok_or(EditError::MissingParameter { name: "path" })?;
        let content = request
            .content
            .as_deref()
            .ok_or(EditError::MissingParameter { name: "content" })?;
        let abs_path = self.authorize(rel_path)?;
        // From here on this request owns the streamed session.
        self.streams().remove(&abs_path);

        self.open_session(session, rel_path).await?;
        let file_mode = self
            .update_session(session, content.to_string(), true)
            .await?;
        let is_new_file = file_mode == Some(FileMode::Create);

        let approved = self
            .collab
            .approver
            .approve(&ApprovalRequest {
                path: rel_path.to_string(),
                tool: WRITE_FILE_TOOL,
                preview: content.to_string(),
                is_new_file,
            })
            .await
            .context("request approval")?;
        if !approved {
            return self.reject(session, rel_path).await;
        }

        let saved = self.save_session(session).await?;
        self.track(rel_path).await;
        self.counters.reset_mistakes();

        Ok(EditOutcome {
            path: Some(PathBuf::from(rel_path)),
            kind: OutcomeKind::Applied {
                partial_failures: false,
            },
            tool_result: messages::saved(rel_path, &saved.diagnostics_message),
            surfaced: false,
        })
    }

    /// Access policy plus workspace containment.
    fn authorize(&self, rel_path: &str) -> Result<PathBuf, EditError> {
        if !self.collab.access.validate_access(rel_path) {
            return Err(EditError::AccessDenied {
                path: rel_path.to_string(),
            });
        }
        resolve_in_root(&self.root, rel_path).map_err(|_| EditError::AccessDenied {
            path: rel_path.to_string(),
        })
    }

    /// Open `session` on `rel_path` unless it is already streaming.
    async fn open_session(
        &self,
        session: &SharedSession,
        rel_path: &str,
    ) -> Result<FileMode, EditError> {
        let session = Arc::clone(session);
        let rel_path = rel_path.to_string();
        self.guarded(Phase::Open, async move {
            let mut session = session.lock_owned().await;
            if session.state() == SessionState::Empty {
                return Ok(session.open(&rel_path).await?);
            }
            session
                .file_mode()
                .context("edit session is active without a file mode")
        })
        .await
    }

    /// Push streamed or final content into `session`. Direct mode writes it
    /// to disk, so this runs under the write budget.
    async fn update_session(
        &self,
        session: &SharedSession,
        content: String,
        is_final: bool,
    ) -> Result<Option<FileMode>, EditError> {
        let session = Arc::clone(session);
        self.guarded(Phase::Write, async move {
            let mut session = session.lock_owned().await;
            session.update(&content, is_final).await?;
            Ok(session.file_mode())
        })
        .await
    }

    async fn save_session(&self, session: &SharedSession) -> Result<SaveResult, EditError> {
        let session = Arc::clone(session);
        self.guarded(Phase::Save, async move {
            let mut session = session.lock_owned().await;
            let saved = session.save_changes().await?;
            session.reset().await;
            Ok(saved)
        })
        .await
    }

    async fn reject(
        &self,
        session: &SharedSession,
        rel_path: &str,
    ) -> Result<EditOutcome, EditError> {
        info!(path = rel_path, "edit rejected, reverting");
        let reverting = Arc::clone(session);
        self.guarded(Phase::Write, async move {
            let mut session = reverting.lock_owned().await;
            Ok(session.revert_changes().await?)
        })
        .await?;
        Ok(EditOutcome {
            path: Some(PathBuf::from(rel_path)),
            kind: OutcomeKind::Rejected,
            tool_result: messages::rejected(rel_path),
            surfaced: false,
        })
    }

    /// Drop a failed request's session. One still held by an abandoned
    /// guarded step is left to that step; nothing else can reach it.
    async fn discard(&self, session: &SharedSession) {
        self.streams()
            .retain(|_, streaming| !Arc::ptr_eq(streaming, session));
        match session.try_lock() {
            Ok(mut session) => session.reset().await,
            Err(_) => debug!("edit session held by an abandoned step, dropping it"),
        }
    }

    async fn track(&self, rel_path: &str) {
        if let Err(err) = self
            .collab
            .tracker
            .track(rel_path, ContextReason::AgentEdited)
            .await
        {
            warn!(path = rel_path, err = %err, "file context tracking failed");
        }
    }

    async fn report_progress(
        &self,
        rel_path: &str,
        request: &ApplyDiffRequest,
        result: Option<&DiffOutcome>,
    ) {
        let Some(strategy) = &self.collab.strategy else {
            return;
        };
        let Some(status) = strategy.progress_status(request, result) else {
            return;
        };
        if status.is_empty() {
            return;
        }
        if let Err(err) = self
            .collab
            .channel
            .report_progress(Path::new(rel_path), Some(&status))
            .await
        {
            debug!(err = %err, "progress update failed");
        }
    }

    /// Run `operation` under the budget configured for `phase`.
    async fn guarded<T, F>(&self, phase: Phase, operation: F) -> Result<T, EditError>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        guard_phase(operation, &self.settings.timeouts, phase)
            .await?
            .with_context(|| format!("failed while {}", phase.description()))
            .map_err(EditError::from)
    }

    /// Turn a terminal error into an outcome, applying the side effects its
    /// category calls for.
    async fn fail(&self, rel_path: Option<&str>, err: EditError, action: &str) -> EditOutcome {
        let kind = err.kind();
        let mut surfaced = false;
        let tool_result = match &err {
            EditError::MissingParameter { name } => {
                let count = self.counters.record_mistake();
                debug!(name, count, "missing parameter");
                messages::missing_parameter(name)
            }
            EditError::AccessDenied { path } => messages::access_denied(path),
            EditError::NotFound { path } => messages::file_not_found(path),
            EditError::Timeout { phase, budget } => messages::timeout(phase, *budget),
            EditError::StrategyFailure { .. } => err.to_string(),
            EditError::Unexpected(source) => {
                warn!(action, "unexpected failure: {source:#}");
                let text = messages::unexpected(action, source);
                let path = rel_path.map_or_else(|| self.root.clone(), |rel| self.root.join(rel));
                match self.collab.channel.report_error(&path, &text).await {
                    Ok(()) => surfaced = true,
                    Err(report_err) => warn!(err = %report_err, "reporting error failed"),
                }
                text
            }
        };
        EditOutcome {
            path: rel_path.map(PathBuf::from),
            kind: OutcomeKind::Failed(kind),
            tool_result,
            surfaced,
        }
    }
}

fn progress(rel_path: Option<&str>) -> EditOutcome {
    EditOutcome {
        path: rel_path.map(PathBuf::from),
        kind: OutcomeKind::Progress,
        tool_result: String::new(),
        surfaced: false,
    }
}
