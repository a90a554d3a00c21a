//! Streaming file-edit pipeline for coding agents.
//!
//! An agent proposes a change to a workspace file, either as a diff
//! specification or as whole new content. The pipeline applies it through a
//! pluggable strategy, stages it in an edit session, asks for approval, and
//! commits or rolls back, reporting a tool result plus newly introduced
//! diagnostics. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (text normalization, diagnostics
//!   deltas, mistake counting, tool-result text). No I/O.
//! - **[`io`]**: Collaborator traits and side-effecting adapters (filesystem,
//!   strategies, access control, editor surface, approval, config, timeouts).
//!   Isolated to enable fakes in tests.
//!
//! Orchestration modules ([`session`], [`orchestrator`]) coordinate core logic
//! with I/O to implement `apply_diff` and whole-file writes.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
