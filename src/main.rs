//! Wiggum loop supervisor CLI.
//!
//! Repeatedly invokes an external AI coding-agent CLI with a fixed prompt,
//! scans the captured output for a completion marker, pushes commits between
//! iterations, and keeps looping until the iteration bound (or the operator)
//! stops it.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use wiggum::exit_codes;
use wiggum::io::agent::{AgentCli, Backend, CliAgent};
use wiggum::io::config::{WiggumConfig, load_config, write_config};
use wiggum::io::prompt::{scaffold_prompts, workspace_status};
use wiggum::logging;
use wiggum::looping::{IterationReport, LoopOptions, LoopStop, Mode, run_loop};

#[derive(Parser)]
#[command(
    name = "wiggum",
    version,
    about = "Loop an AI coding-agent CLI until it signals completion"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write prompt templates and a default `wiggum.toml` if missing.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the build loop against PROMPT.md.
    Run(LoopArgs),
    /// Run the planning loop against PROMPT_PLAN.md (single-shot by default).
    Plan(LoopArgs),
}

#[derive(Args)]
struct LoopArgs {
    /// Maximum iterations; 0 means unbounded.
    #[arg(short = 'n', long)]
    max_iterations: Option<u32>,

    /// Agent backend to invoke.
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Model to pass to the backend (WIGGUM_MODEL overrides this).
    #[arg(long)]
    model: Option<String>,

    /// Tell the agent CLI to bypass its own permission prompts.
    #[arg(long)]
    yolo: bool,

    /// Disable the live tail of agent output.
    #[arg(long)]
    no_tail: bool,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve current directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Run(args) => cmd_loop(&root, Mode::Build, &args),
        Command::Plan(args) => cmd_loop(&root, Mode::Plan, &args),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let written = scaffold_prompts(root, force)?;
    for path in &written {
        println!("wrote {}", path.display());
    }

    let config_path = root.join("wiggum.toml");
    if force || !config_path.exists() {
        write_config(&config_path, &WiggumConfig::default())?;
        println!("wrote {}", config_path.display());
    }
    if written.is_empty() {
        println!("prompts already present (use --force to regenerate)");
    }
    Ok(exit_codes::OK)
}

fn cmd_loop(root: &Path, mode: Mode, args: &LoopArgs) -> Result<i32> {
    let mut cfg = load_config(&root.join("wiggum.toml"))?;
    apply_overrides(&mut cfg, args);

    // Template scaffolding is a one-time side effect before the loop starts;
    // existing (possibly operator-edited) prompts are left alone.
    scaffold_prompts(root, false)?;
    for line in workspace_status(root) {
        println!("{line}");
    }

    let agent = CliAgent::from_config(&cfg);
    agent.preflight()?;
    println!("agent: {} ({} mode)", agent.name(), mode_name(mode));

    let options = LoopOptions::from_config(&cfg, mode);
    let outcome = run_loop(root, &agent, &options, print_iteration)?;

    println!(
        "session {}: {} iteration(s), stopped: {}",
        outcome.session_id,
        outcome.iterations,
        match outcome.stop {
            LoopStop::MaxIterations => "iteration bound reached",
            LoopStop::PlanComplete => "plan complete",
        }
    );
    if outcome.last_outcome.is_done() {
        println!("completion signal received");
    }
    Ok(exit_codes::OK)
}

fn apply_overrides(cfg: &mut WiggumConfig, args: &LoopArgs) {
    if let Some(max) = args.max_iterations {
        cfg.max_iterations = max;
    }
    if let Some(backend) = args.backend {
        cfg.backend = backend;
    }
    if args.model.is_some() {
        cfg.model = args.model.clone();
    }
    if args.yolo {
        cfg.yolo = true;
    }
    if args.no_tail {
        cfg.tail.enabled = false;
    }
}

fn print_iteration(report: &IterationReport) {
    let summary = match report.outcome {
        wiggum::core::classifier::Outcome::SuccessDone => "completion signal",
        wiggum::core::classifier::Outcome::SuccessNoSignal => "no completion signal",
        wiggum::core::classifier::Outcome::Failure => "agent failed",
    };
    println!(
        "iteration {}: exit {}, {}",
        report.iter,
        report
            .exit_code
            .map_or_else(|| "?".to_string(), |c| c.to_string()),
        summary
    );
    if report.warned_stuck {
        println!(
            "iteration {}: still no completion signal; consider intervening manually",
            report.iter
        );
    }
}

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Build => "build",
        Mode::Plan => "plan",
    }
}
