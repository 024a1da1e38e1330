//! Completion-signal detection and outcome classification.
//!
//! The only wire contract with the agent is a literal marker substring in its
//! captured output: `<promise>DONE</promise>` or `<promise>ALL_DONE</promise>`.
//! Everything here is pure so the loop's decisions stay testable without
//! spawning processes.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Completion signal detected in captured agent output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// No marker present.
    None,
    /// `<promise>DONE</promise>` was the last marker occurrence.
    Done,
    /// `<promise>ALL_DONE</promise>` was the last marker occurrence.
    AllDone,
}

/// Classification of a single agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Clean exit and a completion marker was found.
    SuccessDone,
    /// Clean exit but no marker: the task is not finished yet.
    SuccessNoSignal,
    /// The agent process exited nonzero.
    Failure,
}

impl Outcome {
    /// True for the only outcome that counts as task completion.
    pub fn is_done(self) -> bool {
        matches!(self, Outcome::SuccessDone)
    }
}

static MARKER_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"<promise>(DONE|ALL_DONE)</promise>").unwrap());

/// Scan captured output for the completion marker.
///
/// When multiple markers appear, the last occurrence is authoritative so a
/// multi-phase prompt can override an earlier `DONE` with `ALL_DONE` (or the
/// reverse) later in the transcript.
pub fn detect_signal(output: &str) -> Signal {
    match MARKER_RE.find_iter(output).last() {
        None => Signal::None,
        Some(m) => {
            if m.as_str().contains("ALL_DONE") {
                Signal::AllDone
            } else {
                Signal::Done
            }
        }
    }
}

/// Classify an invocation from its exit status and detected signal.
///
/// A nonzero exit is a failure regardless of any marker in the output; the
/// marker only means anything on a clean exit.
pub fn classify(exit_ok: bool, signal: Signal) -> Outcome {
    if !exit_ok {
        return Outcome::Failure;
    }
    match signal {
        Signal::None => Outcome::SuccessNoSignal,
        Signal::Done | Signal::AllDone => Outcome::SuccessDone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_done_marker() {
        assert_eq!(detect_signal("all tasks finished <promise>DONE</promise>"), Signal::Done);
    }

    #[test]
    fn detects_all_done_marker() {
        assert_eq!(detect_signal("<promise>ALL_DONE</promise>"), Signal::AllDone);
    }

    #[test]
    fn no_marker_yields_none() {
        assert_eq!(detect_signal("still working on the parser"), Signal::None);
        assert_eq!(detect_signal(""), Signal::None);
    }

    #[test]
    fn partial_markers_do_not_count() {
        assert_eq!(detect_signal("<promise>DONE"), Signal::None);
        assert_eq!(detect_signal("DONE</promise>"), Signal::None);
        assert_eq!(detect_signal("<promise>MAYBE</promise>"), Signal::None);
    }

    #[test]
    fn last_occurrence_is_authoritative() {
        let out = "<promise>DONE</promise> phase 2 begins\nlater <promise>ALL_DONE</promise>";
        assert_eq!(detect_signal(out), Signal::AllDone);

        let out = "<promise>ALL_DONE</promise> wait, more work\n<promise>DONE</promise>";
        assert_eq!(detect_signal(out), Signal::Done);
    }

    #[test]
    fn marker_surrounded_by_noise_still_detected() {
        let out = format!("{}<promise>DONE</promise>{}", "x".repeat(10_000), "y".repeat(10_000));
        assert_eq!(detect_signal(&out), Signal::Done);
    }

    #[test]
    fn clean_exit_with_marker_is_success_done() {
        assert_eq!(classify(true, Signal::Done), Outcome::SuccessDone);
        assert_eq!(classify(true, Signal::AllDone), Outcome::SuccessDone);
    }

    #[test]
    fn clean_exit_without_marker_is_no_signal() {
        assert_eq!(classify(true, Signal::None), Outcome::SuccessNoSignal);
    }

    #[test]
    fn nonzero_exit_is_failure_even_with_marker() {
        assert_eq!(classify(false, Signal::Done), Outcome::Failure);
        assert_eq!(classify(false, Signal::None), Outcome::Failure);
    }
}
