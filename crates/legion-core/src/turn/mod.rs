//! The two-stage turn pipeline.
//!
//! A batch fans perception out across every eligible minion, orders the
//! ones that chose to speak by predicted latency, then streams their
//! responses one at a time so each sees the replies before it.

pub mod perception;
pub mod prompt;
pub mod response;
pub mod scheduler;

pub use perception::{PerceptionOutcome, Trigger};
pub use scheduler::{BatchMode, BatchReport, run_batch};
