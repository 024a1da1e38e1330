//! Stable exit codes for wiggum CLI commands.
//!
//! The loop's result is reported through its output and log artifacts, not
//! the exit code: a run that ends on a completion signal and a run that ends
//! at its iteration bound both exit 0. Nonzero is reserved for errors.

/// Command succeeded (including loops that end on a completion signal).
pub const OK: i32 = 0;
/// Setup error (missing agent binary, missing prompt file) or other failure.
pub const INVALID: i32 = 1;

#[cfg(test)]
mod tests {
    #[test]
    fn codes_are_stable() {
        assert_eq!(super::OK, 0);
        assert_eq!(super::INVALID, 1);
    }
}
