//! Git adapter for the supervisor's push step.
//!
//! The agent subprocess owns all commits; the supervisor only reads the
//! current branch and synchronizes it to the remote between iterations, so we
//! keep a small, explicit wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (refuse to push)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// True if the current branch has an upstream configured.
    pub fn has_upstream(&self) -> Result<bool> {
        let status = self
            .run(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{upstream}"])?
            .status;
        Ok(status.success())
    }

    /// Push the current branch, creating the upstream on first push.
    #[instrument(skip_all)]
    pub fn push_current_branch(&self) -> Result<()> {
        if self.has_upstream()? {
            debug!("pushing to existing upstream");
            self.run_checked(&["push"])?;
            return Ok(());
        }
        let branch = self.current_branch()?;
        debug!(branch = %branch, "no upstream, pushing with --set-upstream");
        self.run_checked(&["push", "--set-upstream", "origin", &branch])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}
