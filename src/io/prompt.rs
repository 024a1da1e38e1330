//! Prompt scaffolding and loading.
//!
//! The prompt files at the repo root (`PROMPT.md`, `PROMPT_PLAN.md`) are the
//! operator's to edit; we render them once from embedded templates and never
//! overwrite an existing file unless forced. Template rendering happens at
//! scaffold time, not per iteration, so a run always feeds the agent exactly
//! what is on disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, context};
use tracing::{debug, info};

const BUILD_TEMPLATE: &str = include_str!("prompts/build.md");
const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");

/// Prompt file consumed by build-mode iterations.
pub const BUILD_PROMPT_FILE: &str = "PROMPT.md";
/// Prompt file consumed by plan-mode iterations.
pub const PLAN_PROMPT_FILE: &str = "PROMPT_PLAN.md";
/// Plan document the agent maintains; the supervisor only checks presence.
pub const PLAN_FILE: &str = "IMPLEMENTATION_PLAN.md";
/// Specs directory the agent reads; the supervisor only checks presence.
pub const SPECS_DIR: &str = "specs";

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("build", BUILD_TEMPLATE)
            .expect("build template should be valid");
        env.add_template("plan", PLAN_TEMPLATE)
            .expect("plan template should be valid");
        Self { env }
    }

    fn render(&self, name: &str) -> Result<String> {
        let template = self.env.get_template(name)?;
        let rendered = template.render(context! {
            plan_file => PLAN_FILE,
            specs_dir => SPECS_DIR,
        })?;
        Ok(rendered)
    }
}

/// Write the prompt files, skipping any that already exist unless `force`.
///
/// Returns the paths that were actually written. Idempotent: running it twice
/// without `force` writes nothing the second time.
pub fn scaffold_prompts(root: &Path, force: bool) -> Result<Vec<PathBuf>> {
    let engine = PromptEngine::new();
    let mut written = Vec::new();
    for (name, file) in [("build", BUILD_PROMPT_FILE), ("plan", PLAN_PROMPT_FILE)] {
        let path = root.join(file);
        if path.exists() && !force {
            debug!(path = %path.display(), "prompt exists, skipping");
            continue;
        }
        let rendered = engine.render(name)?;
        fs::write(&path, rendered).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), "wrote prompt template");
        written.push(path);
    }
    Ok(written)
}

/// Load the prompt file for a mode; missing file is a fatal setup error.
pub fn read_prompt(root: &Path, prompt_file: &str) -> Result<String> {
    let path = root.join(prompt_file);
    if !path.exists() {
        return Err(anyhow!(
            "missing prompt file {} (run `wiggum init` first)",
            path.display()
        ));
    }
    fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
}

/// Advisory status lines about the artifacts the agent works from.
///
/// Presence checks only; the supervisor never parses these files.
pub fn workspace_status(root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    if root.join(PLAN_FILE).is_file() {
        lines.push(format!("{PLAN_FILE} present"));
    } else {
        lines.push(format!("{PLAN_FILE} missing (run `wiggum plan` to create it)"));
    }
    if root.join(SPECS_DIR).is_dir() {
        lines.push(format!("{SPECS_DIR}/ present"));
    } else {
        lines.push(format!("{SPECS_DIR}/ missing (the agent will work from the prompt alone)"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_writes_both_prompts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let written = scaffold_prompts(temp.path(), false).expect("scaffold");
        assert_eq!(written.len(), 2);

        let build = fs::read_to_string(temp.path().join(BUILD_PROMPT_FILE)).expect("read");
        assert!(build.contains(PLAN_FILE));
        assert!(build.contains("<promise>DONE</promise>"));
        let plan = fs::read_to_string(temp.path().join(PLAN_PROMPT_FILE)).expect("read");
        assert!(plan.contains(SPECS_DIR));
    }

    #[test]
    fn scaffold_preserves_operator_edits() {
        let temp = tempfile::tempdir().expect("tempdir");
        scaffold_prompts(temp.path(), false).expect("scaffold");
        let path = temp.path().join(BUILD_PROMPT_FILE);
        fs::write(&path, "my custom prompt\n").expect("write");

        let written = scaffold_prompts(temp.path(), false).expect("rescaffold");
        assert!(written.is_empty());
        assert_eq!(fs::read_to_string(&path).expect("read"), "my custom prompt\n");

        let written = scaffold_prompts(temp.path(), true).expect("force");
        assert_eq!(written.len(), 2);
        assert!(fs::read_to_string(&path).expect("read").contains(PLAN_FILE));
    }

    #[test]
    fn read_prompt_errors_when_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_prompt(temp.path(), BUILD_PROMPT_FILE).unwrap_err();
        assert!(err.to_string().contains("missing prompt file"));
    }

    #[test]
    fn status_reports_presence() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lines = workspace_status(temp.path());
        assert!(lines.iter().any(|l| l.contains("missing")));

        fs::write(temp.path().join(PLAN_FILE), "- [ ] task\n").expect("write");
        fs::create_dir_all(temp.path().join(SPECS_DIR)).expect("mkdir");
        let lines = workspace_status(temp.path());
        assert!(lines.iter().all(|l| l.contains("present")));
    }
}
