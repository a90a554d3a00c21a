//! Pipeline configuration stored as TOML (default `.editflow/config.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::EditMode;
use crate::io::strategy::StrategyKind;
use crate::io::timeout::PhaseTimeouts;

/// Config location relative to the workspace root.
pub const CONFIG_PATH: &str = ".editflow/config.toml";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_PATH)
}

/// Pipeline configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EditConfig {
    /// `direct` writes every streamed update to disk; `interactive` previews.
    pub mode: EditMode,

    /// Diff strategy variant, fixed for the lifetime of an orchestrator.
    pub strategy: StrategyKind,

    /// Consecutive failures on one path before errors are shown to the human.
    pub escalation_threshold: u32,

    pub timeouts: TimeoutConfig,

    pub access: AccessConfig,
}

/// Per-phase deadlines in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub file_exists_ms: u64,
    pub read_ms: u64,
    pub open_ms: u64,
    pub apply_ms: u64,
    /// Streamed direct-mode writes and reverts.
    pub write_ms: u64,
    pub save_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AccessConfig {
    /// Glob patterns denied in addition to `.editignore`.
    pub deny: Vec<String>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            file_exists_ms: 10_000,
            read_ms: 30_000,
            open_ms: 30_000,
            apply_ms: 60_000,
            write_ms: 30_000,
            save_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn phase_timeouts(&self) -> PhaseTimeouts {
        PhaseTimeouts {
            check_exists: Duration::from_millis(self.file_exists_ms),
            read: Duration::from_millis(self.read_ms),
            open: Duration::from_millis(self.open_ms),
            apply: Duration::from_millis(self.apply_ms),
            write: Duration::from_millis(self.write_ms),
            save: Duration::from_millis(self.save_ms),
        }
    }
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            mode: EditMode::Direct,
            strategy: StrategyKind::default(),
            escalation_threshold: 2,
            timeouts: TimeoutConfig::default(),
            access: AccessConfig::default(),
        }
    }
}

impl EditConfig {
    pub fn validate(&self) -> Result<()> {
        if self.escalation_threshold == 0 {
            return Err(anyhow!("escalation_threshold must be > 0"));
        }
        let t = &self.timeouts;
        for (name, value) in [
            ("timeouts.file_exists_ms", t.file_exists_ms),
            ("timeouts.read_ms", t.read_ms),
            ("timeouts.open_ms", t.open_ms),
            ("timeouts.apply_ms", t.apply_ms),
            ("timeouts.write_ms", t.write_ms),
            ("timeouts.save_ms", t.save_ms),
        ] {
            if value == 0 {
                return Err(anyhow!("{name} must be > 0"));
            }
        }
        if self.access.deny.iter().any(|pattern| pattern.trim().is_empty()) {
            return Err(anyhow!("access.deny must not contain empty patterns"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EditConfig::default()`.
pub fn load_config(path: &Path) -> Result<EditConfig> {
    if !path.exists() {
        let cfg = EditConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EditConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EditConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
