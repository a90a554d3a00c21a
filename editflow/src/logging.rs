//! Diagnostic logging for the edit pipeline.
//!
//! Log lines go to stderr and are meant for whoever is debugging a host or
//! the CLI. They never reach the agent: tool-result text and the structured
//! [`EditOutcome`](crate::core::types::EditOutcome) are produced regardless
//! of the log filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Variable checked before `RUST_LOG`, so a host embedding the pipeline can
/// tune edit logging without touching its own filter.
pub const LOG_ENV: &str = "EDITFLOW_LOG";

/// Directive used when neither variable holds a valid filter.
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the stderr subscriber. Later calls leave the first one in place.
///
/// Timeouts, rollbacks and escalations log at `warn`; per-step progress at
/// `debug`. To follow a single write:
///
/// ```bash
/// EDITFLOW_LOG=editflow::session=debug,editflow::orchestrator=info \
///     editflow write notes/todo.md --from draft.md --yes
/// ```
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .try_init();
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
