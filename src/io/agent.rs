//! Agent CLI abstraction for loop invocation.
//!
//! The [`AgentCli`] trait decouples the supervisor from the actual coding
//! agent (Claude Code, Codex, Gemini, Copilot). Each backend encapsulates its
//! own flag-building; the loop is written once against the trait. Tests use
//! scripted agents that return predetermined outputs without spawning
//! processes.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::io::config::WiggumConfig;
use crate::io::process::run_command_streamed;

/// Env var overriding the agent binary name.
pub const AGENT_ENV: &str = "WIGGUM_AGENT";
/// Env var overriding the model passed to the backend.
pub const MODEL_ENV: &str = "WIGGUM_MODEL";

/// Supported agent CLI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Claude,
    Codex,
    Gemini,
    Copilot,
}

impl Backend {
    /// Binary name to invoke when no override is configured.
    pub fn default_command(self) -> &'static str {
        match self {
            Backend::Claude => "claude",
            Backend::Codex => "codex",
            Backend::Gemini => "gemini",
            Backend::Copilot => "copilot",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.default_command())
    }
}

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Prompt text fed to the agent.
    pub prompt: String,
    /// Truncate captured output beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Path to tee stdout lines for the live tail display, when enabled.
    pub stream_path: Option<PathBuf>,
}

/// Captured result of one agent invocation.
///
/// A nonzero exit is data, not an error: the classifier turns it into a
/// `Failure` outcome and the loop keeps going.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// True when the process exited with status 0.
    pub exit_ok: bool,
    /// Raw exit code when the process was not killed by a signal.
    pub exit_code: Option<i32>,
    /// Combined stdout + stderr text (bounded), what the classifier scans.
    pub output: String,
}

/// Abstraction over agent CLI backends.
pub trait AgentCli {
    /// Run the agent once with the given request and capture its output.
    fn invoke(&self, request: &InvokeRequest) -> Result<Invocation>;

    /// Human-readable name for status lines and logs.
    fn name(&self) -> String;
}

/// Real agent backend: spawns the configured CLI binary.
#[derive(Debug, Clone)]
pub struct CliAgent {
    backend: Backend,
    command: String,
    model: Option<String>,
    yolo: bool,
}

impl CliAgent {
    pub fn new(backend: Backend, command: String, model: Option<String>, yolo: bool) -> Self {
        Self {
            backend,
            command,
            model,
            yolo,
        }
    }

    /// Build an agent from config plus `WIGGUM_AGENT` / `WIGGUM_MODEL` overrides.
    pub fn from_config(cfg: &WiggumConfig) -> Self {
        let command = resolve_command(cfg.backend, std::env::var(AGENT_ENV).ok());
        let model = resolve_model(cfg.model.clone(), std::env::var(MODEL_ENV).ok());
        Self::new(cfg.backend, command, model, cfg.yolo)
    }

    /// Verify the agent binary is reachable before the loop starts.
    ///
    /// A missing binary is a setup error: the supervisor must exit before any
    /// log file is created, rather than burn iterations on spawn failures.
    pub fn preflight(&self) -> Result<()> {
        if binary_on_path(&self.command) {
            debug!(command = %self.command, "agent binary found");
            return Ok(());
        }
        Err(anyhow!(
            "agent binary '{}' not found on PATH (set {AGENT_ENV} to override)",
            self.command
        ))
    }

    fn build_command(&self, request: &InvokeRequest) -> Command {
        let mut cmd = Command::new(&self.command);
        match self.backend {
            // Prompt on stdin via `-p`, print mode.
            Backend::Claude => {
                cmd.arg("-p");
                if self.yolo {
                    cmd.arg("--dangerously-skip-permissions");
                }
                if let Some(model) = &self.model {
                    cmd.arg("--model").arg(model);
                }
            }
            // Prompt on stdin via the `-` positional to `codex exec`.
            Backend::Codex => {
                cmd.arg("exec");
                if self.yolo {
                    cmd.arg("--sandbox").arg("danger-full-access");
                }
                if let Some(model) = &self.model {
                    cmd.arg("-m").arg(model);
                }
                cmd.arg("-");
            }
            // Prompt on stdin; `--yolo` is gemini's own permission bypass.
            Backend::Gemini => {
                if self.yolo {
                    cmd.arg("--yolo");
                }
                if let Some(model) = &self.model {
                    cmd.arg("-m").arg(model);
                }
            }
            // Prompt as an argument; copilot reads no stdin in prompt mode.
            Backend::Copilot => {
                cmd.arg("-p").arg(&request.prompt);
                if self.yolo {
                    cmd.arg("--allow-all-tools");
                }
                if let Some(model) = &self.model {
                    cmd.arg("--model").arg(model);
                }
            }
        }
        cmd.current_dir(&request.workdir);
        cmd
    }

    fn prompt_via_stdin(&self) -> bool {
        !matches!(self.backend, Backend::Copilot)
    }
}

impl AgentCli for CliAgent {
    #[instrument(skip_all, fields(backend = %self.backend))]
    fn invoke(&self, request: &InvokeRequest) -> Result<Invocation> {
        info!(workdir = %request.workdir.display(), "invoking agent");
        let cmd = self.build_command(request);
        let stdin = self.prompt_via_stdin().then(|| request.prompt.as_bytes());
        let output = run_command_streamed(
            cmd,
            stdin,
            request.output_limit_bytes,
            request.stream_path.as_deref(),
        )
        .with_context(|| format!("run {}", self.command))?;

        // The notice goes first: truncation drops the oldest bytes.
        let mut text = output.truncated_notice("agent");
        text.push_str(&output.combined_text());
        debug!(exit_code = ?output.status.code(), "agent finished");
        Ok(Invocation {
            exit_ok: output.status.success(),
            exit_code: output.status.code(),
            output: text,
        })
    }

    fn name(&self) -> String {
        self.command.clone()
    }
}

/// Pick the binary name: env override beats the backend default.
fn resolve_command(backend: Backend, env_override: Option<String>) -> String {
    match env_override {
        Some(cmd) if !cmd.trim().is_empty() => cmd,
        _ => backend.default_command().to_string(),
    }
}

/// Pick the model: env override beats the configured model.
fn resolve_model(configured: Option<String>, env_override: Option<String>) -> Option<String> {
    match env_override {
        Some(model) if !model.trim().is_empty() => Some(model),
        _ => configured,
    }
}

/// Check whether a command resolves to an executable file.
fn binary_on_path(command: &str) -> bool {
    let path = Path::new(command);
    if path.components().count() > 1 {
        return path.is_file();
    }
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(command).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InvokeRequest {
        InvokeRequest {
            workdir: PathBuf::from("."),
            prompt: "do the thing".to_string(),
            output_limit_bytes: 1_000,
            stream_path: None,
        }
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn env_override_wins_for_command() {
        assert_eq!(
            resolve_command(Backend::Claude, Some("claude-nightly".to_string())),
            "claude-nightly"
        );
        assert_eq!(resolve_command(Backend::Codex, None), "codex");
        assert_eq!(resolve_command(Backend::Gemini, Some("  ".to_string())), "gemini");
    }

    #[test]
    fn env_override_wins_for_model() {
        assert_eq!(
            resolve_model(Some("sonnet".to_string()), Some("opus".to_string())),
            Some("opus".to_string())
        );
        assert_eq!(resolve_model(Some("sonnet".to_string()), None), Some("sonnet".to_string()));
        assert_eq!(resolve_model(None, None), None);
    }

    #[test]
    fn claude_flags_include_yolo_and_model() {
        let agent = CliAgent {
            backend: Backend::Claude,
            command: "claude".to_string(),
            model: Some("opus".to_string()),
            yolo: true,
        };
        let cmd = agent.build_command(&request());
        assert_eq!(
            args_of(&cmd),
            vec!["-p", "--dangerously-skip-permissions", "--model", "opus"]
        );
        assert!(agent.prompt_via_stdin());
    }

    #[test]
    fn codex_reads_prompt_from_stdin_positional() {
        let agent = CliAgent {
            backend: Backend::Codex,
            command: "codex".to_string(),
            model: None,
            yolo: false,
        };
        let cmd = agent.build_command(&request());
        assert_eq!(args_of(&cmd), vec!["exec", "-"]);
    }

    #[test]
    fn copilot_takes_prompt_as_argument() {
        let agent = CliAgent {
            backend: Backend::Copilot,
            command: "copilot".to_string(),
            model: None,
            yolo: true,
        };
        let cmd = agent.build_command(&request());
        assert_eq!(args_of(&cmd), vec!["-p", "do the thing", "--allow-all-tools"]);
        assert!(!agent.prompt_via_stdin());
    }

    #[test]
    fn preflight_rejects_missing_binary() {
        let agent = CliAgent {
            backend: Backend::Claude,
            command: "wiggum-no-such-agent".to_string(),
            model: None,
            yolo: false,
        };
        let err = agent.preflight().unwrap_err();
        assert!(err.to_string().contains("not found on PATH"));
    }

    #[test]
    fn preflight_accepts_a_real_binary() {
        let agent = CliAgent {
            backend: Backend::Claude,
            command: "sh".to_string(),
            model: None,
            yolo: false,
        };
        agent.preflight().expect("sh should exist");
    }
}
