//! Side-effecting operations: filesystem, git, process execution.

pub mod agent;
pub mod config;
pub mod git;
pub mod logs;
pub mod process;
pub mod prompt;
