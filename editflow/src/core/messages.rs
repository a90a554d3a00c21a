//! Tool-result text returned to the calling agent.
//!
//! The wording here is part of the contract with the agent prompt, so changes
//! must be deliberate.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use crate::core::types::PartResult;

pub fn missing_parameter(name: &str) -> String {
    format!("Missing value for required parameter '{name}'. Please retry with complete response.")
}

pub fn access_denied(path: &str) -> String {
    format!(
        "Access to {path} is blocked by the access policy. You must try to continue in the task without using this file, or ask the user to update the policy."
    )
}

pub fn file_not_found(abs_path: &Path) -> String {
    format!(
        "File does not exist at path: {}\n\n<error_details>\nThe specified file could not be found. Please verify the file path and try again.\n</error_details>",
        abs_path.display()
    )
}

pub fn timeout(phase: &str, budget: Duration) -> String {
    format!(
        "Operation timed out while {phase} (budget {}s). The operation did not complete and may be retried.",
        budget.as_secs_f64()
    )
}

pub fn applied(rel_path: &str, diagnostics: &str) -> String {
    format!("Changes successfully applied to {rel_path}:\n\n{diagnostics}\n")
}

pub fn saved(rel_path: &str, diagnostics: &str) -> String {
    format!("The content was successfully saved to {rel_path}.\n\n{diagnostics}\n")
}

pub fn partial_failure_hint(abs_path: &Path) -> String {
    format!(
        "But unable to apply all diff parts to file: {}, silently use the read_file tool to check the newest file version and re-apply the failed diff parts\n",
        abs_path.display()
    )
}

pub fn rejected(rel_path: &str) -> String {
    format!("The user denied this operation. The file {rel_path} was not modified.")
}

pub fn unexpected(action: &str, err: &anyhow::Error) -> String {
    format!("Error {action}:\n{err:#}")
}

/// Error text for a failed strategy application.
///
/// With per-part results, every failed part contributes its own
/// `<error_details>` block; otherwise the top-level error is wrapped once.
pub fn strategy_failure(
    abs_path: &Path,
    error: &str,
    details: Option<&Value>,
    parts: &[PartResult],
) -> String {
    let failed: Vec<&PartResult> = parts.iter().filter(|part| !part.success).collect();
    if failed.is_empty() {
        return format!(
            "Unable to apply diff to file: {}\n\n{}",
            abs_path.display(),
            error_details(error, details)
        );
    }
    failed
        .iter()
        .map(|part| {
            error_details(
                part.error.as_deref().unwrap_or("diff part failed"),
                part.details.as_ref(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn error_details(error: &str, details: Option<&Value>) -> String {
    let rendered = details
        .and_then(|value| serde_json::to_string_pretty(value).ok())
        .map(|json| format!("\n\nDetails:\n{json}"))
        .unwrap_or_default();
    format!("<error_details>\n{error}{rendered}\n</error_details>")
}
