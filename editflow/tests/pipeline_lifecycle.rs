//! End-to-end tests for the edit pipeline.
//!
//! Drives `DiffOrchestrator` against a real temp workspace with scripted
//! strategies, approvers and channels, and checks both the returned outcome
//! and what ended up on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use editflow::core::diagnostics::{Diagnostic, DiagnosticsSnapshot, Severity};
use editflow::core::mistakes::TaskCounters;
use editflow::core::types::{
    ApplyDiffRequest, DiffOutcome, EditMode, FailureKind, OutcomeKind, PartResult,
    WriteFileRequest,
};
use editflow::io::strategy::{DiffStrategy, StrategyKind};
use editflow::io::timeout::PhaseTimeouts;
use editflow::io::tracker::{ContextReason, InMemoryTracker};
use editflow::orchestrator::{Collaborators, DiffOrchestrator, OrchestratorSettings};
use editflow::test_support::{
    RecordingChannel, RecordingFileStore, RecordingSurface, ScriptedApprover, ScriptedStrategy,
    SurfaceCall, TestWorkspace,
};

/// Linter that flags every line other than `a` in the files it watches.
struct LineLinter {
    files: Vec<PathBuf>,
}

#[async_trait]
impl editflow::io::diagnostics::DiagnosticsSource for LineLinter {
    async fn snapshot(&self) -> Result<DiagnosticsSnapshot> {
        let mut snapshot = BTreeMap::new();
        for file in &self.files {
            let contents = tokio::fs::read_to_string(file).await?;
            let issues = contents
                .lines()
                .enumerate()
                .filter(|(_, line)| *line != "a")
                .map(|(idx, line)| Diagnostic {
                    line: u32::try_from(idx + 1).unwrap_or(u32::MAX),
                    severity: Severity::Error,
                    message: format!("name '{line}' is not defined"),
                    source: Some("lint".to_string()),
                })
                .collect();
            snapshot.insert(file.clone(), issues);
        }
        Ok(snapshot)
    }
}

/// Strategy whose diff text is the complete new file content.
struct ReplaceStrategy;

#[async_trait]
impl DiffStrategy for ReplaceStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Standard
    }

    async fn apply_diff(
        &self,
        _original: &str,
        diff: &str,
        _start_line_hint: Option<usize>,
    ) -> Result<DiffOutcome> {
        Ok(DiffOutcome::applied(diff))
    }
}

fn settings(mode: EditMode, timeouts: PhaseTimeouts) -> OrchestratorSettings {
    OrchestratorSettings {
        mode,
        timeouts,
        escalation_threshold: 2,
    }
}

fn direct(workspace: &TestWorkspace, collab: Collaborators) -> DiffOrchestrator {
    DiffOrchestrator::new(
        workspace.root(),
        settings(
            EditMode::Direct,
            PhaseTimeouts::uniform(Duration::from_secs(5)),
        ),
        collab,
        Arc::new(TaskCounters::new()),
    )
}

/// Verifies a modify edit is saved and only newly introduced errors are reported.
#[tokio::test]
async fn modify_edit_saves_and_reports_new_errors_only() {
    let workspace = TestWorkspace::new();
    workspace.write("x.py", "a\nb\n");
    workspace.write("other.py", "a\nlegacy\n");
    let tracker = Arc::new(InMemoryTracker::new());
    let strategy = Arc::new(ScriptedStrategy::new(vec![DiffOutcome::applied("a\nc\n")]));

    let orch = direct(
        &workspace,
        Collaborators {
            strategy: Some(strategy.clone()),
            diagnostics: Arc::new(LineLinter {
                files: vec![workspace.root().join("x.py"), workspace.root().join("other.py")],
            }),
            tracker: tracker.clone(),
            ..Collaborators::headless()
        },
    );

    let mut request = ApplyDiffRequest::new("x.py", "-b\n+c");
    request.start_line = Some("2".to_string());
    let outcome = orch.apply_diff(request).await;

    assert_eq!(
        outcome.kind,
        OutcomeKind::Applied {
            partial_failures: false
        }
    );
    assert_eq!(workspace.read("x.py"), "a\nc\n");
    assert!(outcome.tool_result.starts_with("Changes successfully applied to x.py:\n\n"));
    assert!(outcome.tool_result.contains("name 'c' is not defined"));
    assert!(!outcome.tool_result.contains("legacy"));
    assert!(!outcome.tool_result.contains("name 'b'"));

    let calls = strategy.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].original, "a\nb\n");
    assert_eq!(calls[0].start_line_hint, Some(2));
    assert_eq!(
        tracker.entries(),
        vec![("x.py".to_string(), ContextReason::AgentEdited)]
    );
}

/// Verifies the second consecutive failure on a path reaches the human and a
/// later success clears the count.
#[tokio::test]
async fn repeated_failures_escalate_and_success_clears_count() {
    let workspace = TestWorkspace::new();
    workspace.write("x.py", "a\nb\n");
    let channel = Arc::new(RecordingChannel::default());
    let strategy = Arc::new(ScriptedStrategy::new(vec![
        DiffOutcome::failed("No sufficiently similar match found"),
        DiffOutcome::Failed {
            error: "ignored".to_string(),
            details: None,
            parts: vec![
                PartResult::failed("block 1 not found", None),
                PartResult::failed("block 2 not found", None),
            ],
        },
        DiffOutcome::applied("a\nc\n"),
    ]));
    let orch = direct(
        &workspace,
        Collaborators {
            strategy: Some(strategy),
            channel: channel.clone(),
            ..Collaborators::headless()
        },
    );
    let key = Path::new("x.py");

    let first = orch.apply_diff(ApplyDiffRequest::new("x.py", "d1")).await;
    assert_eq!(
        first.failure(),
        Some(&FailureKind::StrategyFailure { partial: false })
    );
    assert!(!first.surfaced);
    assert!(channel.errors().is_empty());
    assert_eq!(orch.counters().per_path.count(key), 1);
    assert_eq!(workspace.read("x.py"), "a\nb\n");

    let second = orch.apply_diff(ApplyDiffRequest::new("x.py", "d2")).await;
    assert!(second.surfaced);
    assert_eq!(second.tool_result.matches("<error_details>").count(), 2);
    assert_eq!(channel.errors().len(), 1);
    assert_eq!(channel.errors()[0].1, second.tool_result);
    assert_eq!(orch.counters().per_path.count(key), 2);
    assert_eq!(orch.counters().consecutive_mistakes(), 2);

    let third = orch.apply_diff(ApplyDiffRequest::new("x.py", "d3")).await;
    assert!(third.is_applied());
    assert_eq!(orch.counters().per_path.count(key), 0);
    assert_eq!(orch.counters().consecutive_mistakes(), 0);
    assert_eq!(workspace.read("x.py"), "a\nc\n");
}

/// Verifies a stalled existence check times out without reading or writing.
#[tokio::test]
async fn stalled_existence_check_times_out_before_any_io() {
    let workspace = TestWorkspace::new();
    workspace.write("x.py", "a\n");
    let fs = Arc::new(RecordingFileStore::stalling_exists(Duration::from_millis(500)));
    let strategy = Arc::new(ScriptedStrategy::new(vec![DiffOutcome::applied("b\n")]));
    let mut timeouts = PhaseTimeouts::uniform(Duration::from_secs(5));
    timeouts.check_exists = Duration::from_millis(50);

    let orch = DiffOrchestrator::new(
        workspace.root(),
        settings(EditMode::Direct, timeouts),
        Collaborators {
            fs: fs.clone(),
            strategy: Some(strategy.clone()),
            ..Collaborators::headless()
        },
        Arc::new(TaskCounters::new()),
    );

    let outcome = orch.apply_diff(ApplyDiffRequest::new("x.py", "d")).await;

    assert_eq!(
        outcome.failure(),
        Some(&FailureKind::Timeout {
            phase: "checking if file exists".to_string(),
            budget_ms: 50,
        })
    );
    assert!(outcome.tool_result.contains("checking if file exists"));
    assert!(outcome.tool_result.contains("0.05s"));
    assert_eq!(fs.reads(), 0);
    assert_eq!(fs.writes(), 0);
    assert!(strategy.calls().is_empty());
    assert_eq!(workspace.read("x.py"), "a\n");
}

/// Verifies a slow strategy times out on its own budget and leaves the file alone.
#[tokio::test]
async fn slow_strategy_times_out_on_apply_budget() {
    let workspace = TestWorkspace::new();
    workspace.write("x.py", "a\n");
    let strategy = Arc::new(
        ScriptedStrategy::new(vec![DiffOutcome::applied("b\n")])
            .with_delay(Duration::from_millis(500)),
    );
    let mut timeouts = PhaseTimeouts::uniform(Duration::from_secs(5));
    timeouts.apply = Duration::from_millis(50);
    let orch = DiffOrchestrator::new(
        workspace.root(),
        settings(EditMode::Direct, timeouts),
        Collaborators {
            strategy: Some(strategy),
            ..Collaborators::headless()
        },
        Arc::new(TaskCounters::new()),
    );

    let outcome = orch.apply_diff(ApplyDiffRequest::new("x.py", "d")).await;

    assert!(matches!(
        outcome.failure(),
        Some(FailureKind::Timeout { phase, .. }) if phase == "applying diff"
    ));
    assert_eq!(workspace.read("x.py"), "a\n");
}

/// Verifies a rejected create removes the file and only the directories it
/// made, deepest first.
#[tokio::test]
async fn rejected_create_removes_file_and_created_dirs() {
    let workspace = TestWorkspace::new();
    workspace.write("src/lib.rs", "");
    let approver = Arc::new(ScriptedApprover::new(vec![false]));
    let fs = Arc::new(RecordingFileStore::new());
    let orch = direct(
        &workspace,
        Collaborators {
            fs: fs.clone(),
            approver: approver.clone(),
            ..Collaborators::headless()
        },
    );

    let outcome = orch
        .write_file(WriteFileRequest::new("src/gen/deep/out.rs", "pub fn f() {}\n"))
        .await;

    assert_eq!(outcome.kind, OutcomeKind::Rejected);
    assert!(outcome.tool_result.contains("src/gen/deep/out.rs"));
    assert!(!workspace.exists("src/gen/deep/out.rs"));
    assert!(!workspace.exists("src/gen"));
    assert!(workspace.exists("src/lib.rs"));
    assert_eq!(
        fs.removed_dirs(),
        vec![
            workspace.root().join("src/gen/deep"),
            workspace.root().join("src/gen"),
        ]
    );

    let requests = approver.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].is_new_file);
    assert_eq!(requests[0].tool, "write_to_file");
}

/// Verifies a rejected modify restores the original bytes exactly.
#[tokio::test]
async fn rejected_modify_restores_original_bytes() {
    let workspace = TestWorkspace::new();
    let original = "\u{feff}x\r\ny\r\n";
    workspace.write("win.txt", original);
    let orch = direct(
        &workspace,
        Collaborators {
            approver: Arc::new(ScriptedApprover::new(vec![false])),
            ..Collaborators::headless()
        },
    );

    let outcome = orch
        .write_file(WriteFileRequest::new("win.txt", "z\n"))
        .await;

    assert_eq!(outcome.kind, OutcomeKind::Rejected);
    assert_eq!(workspace.read("win.txt"), original);
}

/// Verifies interactive mode keeps disk untouched until approval and closes
/// the preview when the edit is rejected.
#[tokio::test]
async fn interactive_apply_previews_then_reverts_on_rejection() {
    let workspace = TestWorkspace::new();
    workspace.write("x.py", "a\nb\n");
    let surface = Arc::new(RecordingSurface::default());
    let orch = DiffOrchestrator::new(
        workspace.root(),
        settings(
            EditMode::Interactive,
            PhaseTimeouts::uniform(Duration::from_secs(5)),
        ),
        Collaborators {
            strategy: Some(Arc::new(ScriptedStrategy::new(vec![DiffOutcome::applied(
                "a\nc\n",
            )]))),
            surface: surface.clone(),
            approver: Arc::new(ScriptedApprover::new(vec![false])),
            ..Collaborators::headless()
        },
        Arc::new(TaskCounters::new()),
    );

    let outcome = orch.apply_diff(ApplyDiffRequest::new("x.py", "d")).await;

    assert_eq!(outcome.kind, OutcomeKind::Rejected);
    assert_eq!(workspace.read("x.py"), "a\nb\n");
    let calls = surface.calls();
    assert!(calls.contains(&SurfaceCall::ShowDiff));
    assert_eq!(calls.last(), Some(&SurfaceCall::ClosePreview));
}

/// Verifies two requests in flight on one orchestrator each save their own
/// content to their own file.
#[tokio::test]
async fn concurrent_requests_on_different_paths_stay_isolated() {
    let workspace = TestWorkspace::new();
    workspace.write("a.txt", "a\n");
    workspace.write("b.txt", "b\n");
    let approver = Arc::new(ScriptedApprover::default().with_delay(Duration::from_millis(100)));
    let orch = DiffOrchestrator::new(
        workspace.root(),
        settings(
            EditMode::Interactive,
            PhaseTimeouts::uniform(Duration::from_secs(5)),
        ),
        Collaborators {
            strategy: Some(Arc::new(ReplaceStrategy)),
            surface: Arc::new(RecordingSurface::default()),
            approver: approver.clone(),
            ..Collaborators::headless()
        },
        Arc::new(TaskCounters::new()),
    );

    let (first, second) = tokio::join!(
        orch.apply_diff(ApplyDiffRequest::new("a.txt", "A\n")),
        orch.apply_diff(ApplyDiffRequest::new("b.txt", "B\n")),
    );

    assert!(first.is_applied(), "{}", first.tool_result);
    assert!(second.is_applied(), "{}", second.tool_result);
    assert!(first.tool_result.contains("a.txt"));
    assert!(second.tool_result.contains("b.txt"));
    assert_eq!(workspace.read("a.txt"), "A\n");
    assert_eq!(workspace.read("b.txt"), "B\n");
    assert_eq!(approver.requests().len(), 2);
}

fn stalled_writes(
    workspace: &TestWorkspace,
    mode: EditMode,
    stalled: &str,
) -> DiffOrchestrator {
    let fs = RecordingFileStore::stalling_writes_to(
        workspace.root().join(stalled),
        Duration::from_secs(10),
    );
    DiffOrchestrator::new(
        workspace.root(),
        settings(mode, PhaseTimeouts::uniform(Duration::from_millis(100))),
        Collaborators {
            fs: Arc::new(fs),
            strategy: Some(Arc::new(ReplaceStrategy)),
            surface: Arc::new(RecordingSurface::default()),
            ..Collaborators::headless()
        },
        Arc::new(TaskCounters::new()),
    )
}

/// Verifies a save stuck past its budget does not hold up the next request.
#[tokio::test]
async fn request_after_timed_out_save_completes() {
    let workspace = TestWorkspace::new();
    workspace.write("a.txt", "a\n");
    workspace.write("b.txt", "b\n");
    let orch = stalled_writes(&workspace, EditMode::Interactive, "a.txt");

    let first = orch.apply_diff(ApplyDiffRequest::new("a.txt", "A\n")).await;
    assert_eq!(
        first.failure(),
        Some(&FailureKind::Timeout {
            phase: "saving file".to_string(),
            budget_ms: 100,
        })
    );

    let second = tokio::time::timeout(
        Duration::from_secs(2),
        orch.apply_diff(ApplyDiffRequest::new("b.txt", "B\n")),
    )
    .await
    .expect("second request finishes within its own budgets");
    assert!(second.is_applied(), "{}", second.tool_result);
    assert_eq!(workspace.read("b.txt"), "B\n");
}

/// Verifies a direct-mode content write runs under its own budget and a
/// stuck one does not hold up the next request.
#[tokio::test]
async fn direct_write_is_guarded_and_next_request_completes() {
    let workspace = TestWorkspace::new();
    workspace.write("a.txt", "a\n");
    workspace.write("b.txt", "b\n");
    let orch = stalled_writes(&workspace, EditMode::Direct, "a.txt");

    let first = orch.apply_diff(ApplyDiffRequest::new("a.txt", "A\n")).await;
    assert!(matches!(
        first.failure(),
        Some(FailureKind::Timeout { phase, .. }) if phase == "writing file"
    ));
    assert!(first.tool_result.contains("writing file"));

    let second = tokio::time::timeout(
        Duration::from_secs(2),
        orch.apply_diff(ApplyDiffRequest::new("b.txt", "B\n")),
    )
    .await
    .expect("second request finishes within its own budgets");
    assert!(second.is_applied(), "{}", second.tool_result);
    assert_eq!(workspace.read("b.txt"), "B\n");
}

/// Verifies an open stuck creating its file does not hold up the next request.
#[tokio::test]
async fn request_after_timed_out_open_completes() {
    let workspace = TestWorkspace::new();
    let orch = stalled_writes(&workspace, EditMode::Direct, "new/a.txt");

    let first = orch
        .write_file(WriteFileRequest::new("new/a.txt", "A\n"))
        .await;
    assert!(matches!(
        first.failure(),
        Some(FailureKind::Timeout { phase, .. }) if phase == "opening file for editing"
    ));

    let second = tokio::time::timeout(
        Duration::from_secs(2),
        orch.write_file(WriteFileRequest::new("new/b.txt", "B\n")),
    )
    .await
    .expect("second request finishes within its own budgets");
    assert!(second.is_applied(), "{}", second.tool_result);
    assert_eq!(workspace.read("new/b.txt"), "B\n");
    assert_eq!(orch.open_streams(), 0);
}

/// Verifies a stream that times out is dropped while other streams carry on.
#[tokio::test]
async fn timed_out_stream_is_dropped() {
    let workspace = TestWorkspace::new();
    workspace.write("a.txt", "a\n");
    workspace.write("b.txt", "b\n");
    let fs = Arc::new(RecordingFileStore::stalling_writes_to(
        workspace.root().join("a.txt"),
        Duration::from_millis(300),
    ));
    let orch = DiffOrchestrator::new(
        workspace.root(),
        settings(
            EditMode::Direct,
            PhaseTimeouts::uniform(Duration::from_millis(100)),
        ),
        Collaborators {
            fs,
            ..Collaborators::headless()
        },
        Arc::new(TaskCounters::new()),
    );

    let mut streaming_b = WriteFileRequest::new("b.txt", "b1\nb2");
    streaming_b.partial = true;
    assert_eq!(orch.write_file(streaming_b).await.kind, OutcomeKind::Progress);
    assert_eq!(orch.open_streams(), 1);

    let mut streaming_a = WriteFileRequest::new("a.txt", "x\ny");
    streaming_a.partial = true;
    let outcome = orch.write_file(streaming_a).await;
    assert!(matches!(
        outcome.failure(),
        Some(FailureKind::Timeout { phase, .. }) if phase == "writing file"
    ));
    assert_eq!(orch.open_streams(), 1);

    let outcome = orch
        .write_file(WriteFileRequest::new("b.txt", "b1\nb2\n"))
        .await;
    assert!(outcome.is_applied(), "{}", outcome.tool_result);
    assert_eq!(workspace.read("b.txt"), "b1\nb2\n");
    assert_eq!(orch.open_streams(), 0);
}
