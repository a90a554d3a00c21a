//! Diagnostics snapshots and the pre/post delta reported after an edit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Hint,
    Information,
    Warning,
    Error,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Hint => "Hint",
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

/// One issue reported against a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// One-based line number.
    pub line: u32,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Issues per file at a point in time. Ordered so formatting is stable.
pub type DiagnosticsSnapshot = BTreeMap<PathBuf, Vec<Diagnostic>>;

/// Diagnostics present in `post` but not in `pre`, at or above `min`.
///
/// Files with no new issues are omitted.
pub fn new_diagnostics(
    pre: &DiagnosticsSnapshot,
    post: &DiagnosticsSnapshot,
    min: Severity,
) -> DiagnosticsSnapshot {
    let mut delta = DiagnosticsSnapshot::new();
    for (path, post_issues) in post {
        let before = pre.get(path).map(Vec::as_slice).unwrap_or_default();
        let fresh: Vec<Diagnostic> = post_issues
            .iter()
            .filter(|issue| issue.severity >= min)
            .filter(|issue| !before.contains(issue))
            .cloned()
            .collect();
        if !fresh.is_empty() {
            delta.insert(path.clone(), fresh);
        }
    }
    delta
}

/// Render a snapshot as a problems block with paths relative to `root`.
pub fn format_problems(snapshot: &DiagnosticsSnapshot, root: &Path) -> String {
    let mut out = String::new();
    for (path, issues) in snapshot {
        if issues.is_empty() {
            continue;
        }
        let display = path.strip_prefix(root).unwrap_or(path);
        out.push_str(&format!("\n\n{}", display.display()));
        for issue in issues {
            let label = match &issue.source {
                Some(source) => format!("{source} {}", issue.severity.label()),
                None => issue.severity.label().to_string(),
            };
            out.push_str(&format!(
                "\n- [{label}] Line {}: {}",
                issue.line, issue.message
            ));
        }
    }
    out.trim().to_string()
}

/// Formatted delta text, or an empty string when nothing new appeared.
pub fn delta_message(
    pre: &DiagnosticsSnapshot,
    post: &DiagnosticsSnapshot,
    min: Severity,
    root: &Path,
) -> String {
    let problems = format_problems(&new_diagnostics(pre, post, min), root);
    if problems.is_empty() {
        return String::new();
    }
    format!("New problems detected after saving the file:\n{problems}")
}
