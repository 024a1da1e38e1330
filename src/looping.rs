//! The iteration supervisor: invoke, classify, log, push, decide, repeat.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::classifier::{Outcome, Signal, classify, detect_signal};
use crate::core::state::SupervisorState;
use crate::io::agent::{AgentCli, InvokeRequest};
use crate::io::config::WiggumConfig;
use crate::io::git::Git;
use crate::io::logs::{IterationMeta, SessionPaths, epoch_ms, generate_session_id, write_iteration};
use crate::io::prompt::{BUILD_PROMPT_FILE, PLAN_PROMPT_FILE, read_prompt};
use crate::tail::spawn_tail;

/// Loop mode, selecting the prompt file and the termination rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Keep iterating until the iteration bound (or the operator) stops us.
    Build,
    /// Planning runs once: the first completion signal ends the loop (unless
    /// the single-shot toggle is off).
    Plan,
}

impl Mode {
    pub fn prompt_file(self) -> &'static str {
        match self {
            Mode::Build => BUILD_PROMPT_FILE,
            Mode::Plan => PLAN_PROMPT_FILE,
        }
    }
}

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStop {
    /// The configured nonzero iteration maximum was reached.
    MaxIterations,
    /// Plan mode saw its first completion signal (single-shot semantics).
    PlanComplete,
}

/// Summary of a supervisor run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub session_id: String,
    pub iterations: u32,
    pub last_outcome: Outcome,
    pub stop: LoopStop,
}

/// What one iteration produced, passed to the progress callback.
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub iter: u32,
    pub exit_code: Option<i32>,
    pub signal: Signal,
    pub outcome: Outcome,
    /// The consecutive-failure threshold was reached on this iteration.
    pub warned_stuck: bool,
}

/// Loop parameters, resolved from config (and CLI overrides) before entry.
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub mode: Mode,
    pub max_iterations: u32,
    pub failure_threshold: u32,
    pub iter_delay: Duration,
    pub output_limit_bytes: usize,
    pub plan_single_shot: bool,
    /// `(max lines per poll, poll interval)`; `None` disables the tail.
    pub tail: Option<(usize, Duration)>,
}

impl LoopOptions {
    pub fn from_config(cfg: &WiggumConfig, mode: Mode) -> Self {
        Self {
            mode,
            max_iterations: cfg.max_iterations,
            failure_threshold: cfg.failure_threshold,
            iter_delay: Duration::from_secs(cfg.iter_delay_secs),
            output_limit_bytes: cfg.output_limit_bytes,
            plan_single_shot: cfg.plan_single_shot,
            tail: cfg
                .tail
                .enabled
                .then(|| (cfg.tail.lines, Duration::from_millis(cfg.tail.interval_ms))),
        }
    }
}

/// Drive the agent loop until a termination condition is met.
///
/// Each iteration is stateless from the supervisor's perspective: the same
/// prompt goes in every time, and task progress persists only through
/// whatever the agent commits to the repository. Setup errors (missing
/// prompt) surface before any log artifact is created. Push failures are
/// warnings, never loop outcomes.
///
/// With `max_iterations == 0` in build mode this only returns on error; the
/// operator's interrupt is the intended way out.
pub fn run_loop<A: AgentCli, F: FnMut(&IterationReport)>(
    root: &Path,
    agent: &A,
    options: &LoopOptions,
    mut on_iteration: F,
) -> Result<LoopOutcome> {
    let prompt = read_prompt(root, options.mode.prompt_file())?;

    let session_id = generate_session_id();
    let paths = SessionPaths::new(root, &session_id);
    let git = Git::new(root);
    let mut state = SupervisorState::new(options.max_iterations, options.failure_threshold);
    info!(session_id = %session_id, mode = ?options.mode, max_iterations = options.max_iterations, "starting loop");

    loop {
        let iter = state.begin_iteration();
        let stream_path = options.tail.map(|_| paths.iteration_stream_path(iter));
        let request = InvokeRequest {
            workdir: root.to_path_buf(),
            prompt: prompt.clone(),
            output_limit_bytes: options.output_limit_bytes,
            stream_path: stream_path.clone(),
        };

        let tail = match (options.tail, stream_path) {
            (Some((lines, interval)), Some(path)) => Some(spawn_tail(path, lines, interval)),
            _ => None,
        };

        let started_at = epoch_ms();
        let invocation = agent.invoke(&request);
        if let Some(tail) = tail {
            tail.stop();
        }
        let invocation = invocation.with_context(|| format!("iteration {iter}"))?;
        let ended_at = epoch_ms();

        let signal = detect_signal(&invocation.output);
        let outcome = classify(invocation.exit_ok, signal);
        info!(iter, exit_code = ?invocation.exit_code, ?signal, ?outcome, "iteration classified");

        let meta = IterationMeta {
            session_id: session_id.clone(),
            iter,
            started_at_epoch_ms: started_at,
            ended_at_epoch_ms: ended_at,
            duration_ms: ended_at.saturating_sub(started_at),
            exit_code: invocation.exit_code,
            signal,
            outcome,
        };
        write_iteration(&paths, &meta, &invocation.output)
            .with_context(|| format!("write logs for iteration {iter}"))?;

        // Push is best effort: the loop's success criterion is independent of
        // git synchronization succeeding.
        if let Err(err) = git.push_current_branch() {
            warn!(iter, err = %err, "push failed, continuing");
        }

        let advice = state.record(outcome);
        if advice.warn_stuck {
            warn!(
                iter,
                threshold = options.failure_threshold,
                "no completion signal in {} consecutive iterations; consider intervening manually",
                options.failure_threshold
            );
        }

        on_iteration(&IterationReport {
            iter,
            exit_code: invocation.exit_code,
            signal,
            outcome,
            warned_stuck: advice.warn_stuck,
        });

        if options.mode == Mode::Plan && options.plan_single_shot && outcome.is_done() {
            return Ok(LoopOutcome {
                session_id,
                iterations: state.iterations(),
                last_outcome: outcome,
                stop: LoopStop::PlanComplete,
            });
        }
        if state.reached_max() {
            return Ok(LoopOutcome {
                session_id,
                iterations: state.iterations(),
                last_outcome: outcome,
                stop: LoopStop::MaxIterations,
            });
        }

        if !options.iter_delay.is_zero() {
            std::thread::sleep(options.iter_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::prompt::scaffold_prompts;
    use crate::test_support::{ScriptedAgent, ScriptedInvocation};

    fn options(mode: Mode, max_iterations: u32) -> LoopOptions {
        LoopOptions {
            mode,
            max_iterations,
            failure_threshold: 3,
            iter_delay: Duration::ZERO,
            output_limit_bytes: 100_000,
            plan_single_shot: true,
            tail: None,
        }
    }

    fn scaffolded_tempdir() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        scaffold_prompts(temp.path(), false).expect("scaffold");
        temp
    }

    #[test]
    fn bounded_loop_runs_exactly_max_iterations() {
        let temp = scaffolded_tempdir();
        let agent = ScriptedAgent::new(vec![
            ScriptedInvocation::clean("thinking..."),
            ScriptedInvocation::clean("still thinking..."),
            ScriptedInvocation::clean("more work to do"),
        ]);

        let mut reports = Vec::new();
        let outcome = run_loop(temp.path(), &agent, &options(Mode::Build, 3), |r| {
            reports.push(r.clone());
        })
        .expect("loop");

        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.stop, LoopStop::MaxIterations);
        assert_eq!(agent.invocations(), 3);
        // 3 consecutive misses: the warning fires exactly once, on the 3rd.
        let warned: Vec<u32> = reports.iter().filter(|r| r.warned_stuck).map(|r| r.iter).collect();
        assert_eq!(warned, vec![3]);
        assert!(reports.iter().all(|r| r.outcome == Outcome::SuccessNoSignal));
    }

    #[test]
    fn plan_mode_stops_on_first_done_even_with_larger_max() {
        let temp = scaffolded_tempdir();
        let agent = ScriptedAgent::new(vec![ScriptedInvocation::clean(
            "plan written\n<promise>DONE</promise>",
        )]);

        let outcome = run_loop(temp.path(), &agent, &options(Mode::Plan, 5), |_| {})
            .expect("loop");

        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.stop, LoopStop::PlanComplete);
        assert_eq!(agent.invocations(), 1);
    }

    #[test]
    fn plan_mode_without_single_shot_runs_to_the_bound() {
        let temp = scaffolded_tempdir();
        let agent = ScriptedAgent::new(vec![
            ScriptedInvocation::clean("<promise>DONE</promise>"),
            ScriptedInvocation::clean("<promise>DONE</promise>"),
        ]);

        let mut opts = options(Mode::Plan, 2);
        opts.plan_single_shot = false;
        let outcome = run_loop(temp.path(), &agent, &opts, |_| {}).expect("loop");

        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.stop, LoopStop::MaxIterations);
    }

    #[test]
    fn build_mode_is_not_single_shot() {
        let temp = scaffolded_tempdir();
        let agent = ScriptedAgent::new(vec![
            ScriptedInvocation::clean("<promise>DONE</promise>"),
            ScriptedInvocation::clean("picked up a new task"),
        ]);

        let outcome = run_loop(temp.path(), &agent, &options(Mode::Build, 2), |_| {})
            .expect("loop");

        // The first DONE does not stop a build loop; iteration 2 still runs.
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.last_outcome, Outcome::SuccessNoSignal);
        assert_eq!(agent.invocations(), 2);
    }

    #[test]
    fn unbounded_build_continues_past_a_done_signal() {
        let temp = scaffolded_tempdir();
        // One scripted response: if the loop stopped on DONE it would return
        // cleanly; instead it starts iteration 2 and exhausts the script.
        let agent = ScriptedAgent::new(vec![ScriptedInvocation::clean(
            "<promise>DONE</promise>",
        )]);

        let err = run_loop(temp.path(), &agent, &options(Mode::Build, 0), |_| {}).unwrap_err();

        assert!(format!("{err:#}").contains("scripted agent exhausted"));
        assert_eq!(agent.invocations(), 2);
    }

    #[test]
    fn failures_and_missing_signals_share_the_stuck_path() {
        let temp = scaffolded_tempdir();
        let agent = ScriptedAgent::new(vec![
            ScriptedInvocation::failed(1, "crash"),
            ScriptedInvocation::clean("no marker"),
            ScriptedInvocation::failed(2, "crash again"),
            ScriptedInvocation::clean("<promise>DONE</promise>"),
        ]);

        let mut reports = Vec::new();
        let outcome = run_loop(temp.path(), &agent, &options(Mode::Build, 4), |r| {
            reports.push(r.clone());
        })
        .expect("loop");

        assert_eq!(outcome.iterations, 4);
        assert_eq!(reports[0].outcome, Outcome::Failure);
        assert_eq!(reports[1].outcome, Outcome::SuccessNoSignal);
        assert_eq!(reports[2].outcome, Outcome::Failure);
        assert!(reports[2].warned_stuck);
        assert_eq!(reports[3].outcome, Outcome::SuccessDone);
        assert!(!reports[3].warned_stuck);
    }

    #[test]
    fn last_marker_occurrence_decides_the_signal() {
        let temp = scaffolded_tempdir();
        let agent = ScriptedAgent::new(vec![ScriptedInvocation::clean(
            "<promise>DONE</promise>\nreconsidering...\n<promise>ALL_DONE</promise>\n",
        )]);

        let mut reports = Vec::new();
        run_loop(temp.path(), &agent, &options(Mode::Build, 1), |r| {
            reports.push(r.clone());
        })
        .expect("loop");

        assert_eq!(reports[0].signal, Signal::AllDone);
        assert_eq!(reports[0].outcome, Outcome::SuccessDone);
    }

    #[test]
    fn missing_prompt_fails_before_any_log_exists() {
        let temp = tempfile::tempdir().expect("tempdir");
        let agent = ScriptedAgent::new(Vec::new());

        let err = run_loop(temp.path(), &agent, &options(Mode::Build, 1), |_| {}).unwrap_err();

        assert!(err.to_string().contains("missing prompt file"));
        assert_eq!(agent.invocations(), 0);
        assert!(!temp.path().join(".wiggum").exists());
    }

    #[test]
    fn iteration_artifacts_land_on_disk() {
        let temp = scaffolded_tempdir();
        let agent = ScriptedAgent::new(vec![
            ScriptedInvocation::clean("first pass"),
            ScriptedInvocation::clean("<promise>DONE</promise>"),
        ]);

        let outcome = run_loop(temp.path(), &agent, &options(Mode::Build, 2), |_| {})
            .expect("loop");

        let paths = SessionPaths::new(temp.path(), &outcome.session_id);
        assert!(paths.iteration_log_path(1).is_file());
        assert!(paths.iteration_log_path(2).is_file());
        assert!(paths.iteration_meta_path(2).is_file());
        let session = std::fs::read_to_string(&paths.session_log_path).expect("session log");
        assert!(session.contains("first pass"));
        assert!(session.contains("<promise>DONE</promise>"));
    }

    #[test]
    fn each_iteration_receives_the_same_prompt() {
        let temp = scaffolded_tempdir();
        let agent = ScriptedAgent::new(vec![
            ScriptedInvocation::failed(1, "boom"),
            ScriptedInvocation::clean("recovered"),
        ]);

        run_loop(temp.path(), &agent, &options(Mode::Build, 2), |_| {}).expect("loop");

        let prompts = agent.prompts();
        assert_eq!(prompts.len(), 2);
        // Nothing from the failed attempt is carried forward.
        assert_eq!(prompts[0], prompts[1]);
    }
}
