//! Supervisor configuration stored in `wiggum.toml` at the repo root.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::agent::Backend;

/// Supervisor configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values; a missing file is
/// equivalent to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WiggumConfig {
    /// Agent CLI backend to invoke each iteration.
    pub backend: Backend,

    /// Model override passed to the backend, if it supports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Tell the agent CLI to bypass its own permission prompts.
    pub yolo: bool,

    /// Maximum loop iterations; 0 means unbounded.
    pub max_iterations: u32,

    /// Consecutive non-done iterations before the stuck warning fires.
    pub failure_threshold: u32,

    /// Pause between iterations, to avoid hammering the remote or the spawner.
    pub iter_delay_secs: u64,

    /// Truncate captured agent output beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Stop plan mode after the first completion signal (single-shot).
    pub plan_single_shot: bool,

    pub tail: TailConfig,
}

/// Settings for the live tail display of the running iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TailConfig {
    /// Disable the tail renderer entirely.
    pub enabled: bool,
    /// Number of trailing output lines to re-render.
    pub lines: usize,
    /// Polling interval for re-rendering.
    pub interval_ms: u64,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lines: 20,
            interval_ms: 500,
        }
    }
}

impl Default for WiggumConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Claude,
            model: None,
            yolo: false,
            max_iterations: 0,
            failure_threshold: 3,
            iter_delay_secs: 2,
            output_limit_bytes: 200_000,
            plan_single_shot: true,
            tail: TailConfig::default(),
        }
    }
}

impl WiggumConfig {
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(anyhow!("failure_threshold must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.tail.enabled {
            if self.tail.lines == 0 {
                return Err(anyhow!("tail.lines must be > 0"));
            }
            if self.tail.interval_ms == 0 {
                return Err(anyhow!("tail.interval_ms must be > 0"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WiggumConfig::default()`.
pub fn load_config(path: &Path) -> Result<WiggumConfig> {
    if !path.exists() {
        let cfg = WiggumConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WiggumConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WiggumConfig) -> Result<()> {
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
