//! Log artifacts under `.wiggum/logs/<session>/`.
//!
//! These are product artifacts, written every run regardless of `RUST_LOG`:
//! one text file per iteration with the captured agent output, a small
//! `meta.json` next to it, and a consolidated `session.log` appending every
//! iteration of the run. Nothing here is ever read back by the supervisor.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::classifier::{Outcome, Signal};

/// Canonical log paths for one supervisor session.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub logs_dir: PathBuf,
    pub session_log_path: PathBuf,
}

impl SessionPaths {
    pub fn new(root: &Path, session_id: &str) -> Self {
        let logs_dir = root.join(".wiggum").join("logs").join(session_id);
        Self {
            session_log_path: logs_dir.join("session.log"),
            logs_dir,
        }
    }

    pub fn iteration_log_path(&self, iter: u32) -> PathBuf {
        self.logs_dir.join(format!("iteration-{iter:03}.log"))
    }

    pub fn iteration_meta_path(&self, iter: u32) -> PathBuf {
        self.logs_dir.join(format!("iteration-{iter:03}.meta.json"))
    }

    /// Live tee target for the tail display; overwritten each iteration.
    pub fn iteration_stream_path(&self, iter: u32) -> PathBuf {
        self.logs_dir.join(format!("iteration-{iter:03}.stream"))
    }
}

/// Per-iteration bookkeeping written to `meta.json`.
#[derive(Debug, Clone, Serialize)]
pub struct IterationMeta {
    pub session_id: String,
    pub iter: u32,
    pub started_at_epoch_ms: u64,
    pub ended_at_epoch_ms: u64,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    pub signal: Signal,
    pub outcome: Outcome,
}

/// Milliseconds since the Unix epoch, for meta timestamps.
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Derive a session id from the wall clock.
pub fn generate_session_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("run-{secs}")
}

/// Write one iteration's artifacts: the output log, its meta, and the
/// session-log append. Files are written in deterministic order to keep
/// partially written sessions easy to reason about.
pub fn write_iteration(
    paths: &SessionPaths,
    meta: &IterationMeta,
    output: &str,
) -> Result<()> {
    fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("create logs dir {}", paths.logs_dir.display()))?;

    let log_path = paths.iteration_log_path(meta.iter);
    fs::write(&log_path, output).with_context(|| format!("write {}", log_path.display()))?;

    write_json(&paths.iteration_meta_path(meta.iter), meta)?;

    append_session_log(paths, meta, output)?;
    Ok(())
}

fn append_session_log(paths: &SessionPaths, meta: &IterationMeta, output: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.session_log_path)
        .with_context(|| format!("open {}", paths.session_log_path.display()))?;
    writeln!(
        file,
        "=== iteration {} (exit {:?}, {:?}) ===",
        meta.iter, meta.exit_code, meta.outcome
    )
    .context("append session log header")?;
    file.write_all(output.as_bytes())
        .context("append session log body")?;
    if !output.ends_with('\n') {
        writeln!(file).context("append session log newline")?;
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}
