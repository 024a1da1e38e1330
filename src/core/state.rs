//! Supervisor bookkeeping: iteration bounds and consecutive-failure accounting.

use crate::core::classifier::Outcome;

/// Counters owned exclusively by the loop, mutated once per iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorState {
    /// Completed iterations (monotonic, 1-indexed after `begin_iteration`).
    iter: u32,
    /// Configured maximum iteration count; 0 means unbounded.
    max_iterations: u32,
    /// Iterations since the last `SuccessDone` (resets on done or warning).
    consecutive_failures: u32,
    /// Counter value at which a stuck warning fires.
    failure_threshold: u32,
}

/// Advisory result of recording one iteration's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationAdvice {
    /// The consecutive-failure threshold was just reached; recommend manual
    /// intervention. The loop continues regardless.
    pub warn_stuck: bool,
}

impl SupervisorState {
    pub fn new(max_iterations: u32, failure_threshold: u32) -> Self {
        Self {
            iter: 0,
            max_iterations,
            consecutive_failures: 0,
            failure_threshold,
        }
    }

    /// Start the next iteration and return its 1-indexed sequence number.
    pub fn begin_iteration(&mut self) -> u32 {
        self.iter += 1;
        self.iter
    }

    /// Record an iteration's outcome.
    ///
    /// `SuccessDone` resets the consecutive-failure counter; anything else
    /// increments it. When the counter reaches the threshold the advice
    /// carries `warn_stuck` and the counter resets to 0 so the warning fires
    /// once per streak, not once per iteration after it.
    pub fn record(&mut self, outcome: Outcome) -> IterationAdvice {
        if outcome.is_done() {
            self.consecutive_failures = 0;
            return IterationAdvice { warn_stuck: false };
        }
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.failure_threshold {
            self.consecutive_failures = 0;
            return IterationAdvice { warn_stuck: true };
        }
        IterationAdvice { warn_stuck: false }
    }

    /// True when a nonzero maximum is configured and has been reached.
    pub fn reached_max(&self) -> bool {
        self.max_iterations > 0 && self.iter >= self.max_iterations
    }

    pub fn iterations(&self) -> u32 {
        self.iter
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
