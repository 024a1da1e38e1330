//! Iteration supervisor for AI coding-agent CLIs.
//!
//! This crate drives a sequential loop: invoke an external agent CLI with a
//! fixed prompt, capture its output, scan for the completion marker
//! (`<promise>DONE</promise>` / `<promise>ALL_DONE</promise>`), push any
//! commits the agent made, and decide whether to keep looping. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (signal detection, outcome
//!   classification, failure accounting). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, git, process
//!   execution, prompt scaffolding). Isolated to enable scripting in tests.
//!
//! [`looping`] coordinates core logic with I/O to implement the supervisor;
//! [`tail`] is the optional live display of the running iteration.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod tail;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
