//! Pure, deterministic supervisor logic. No I/O.

pub mod classifier;
pub mod state;
