//! Watch pass pipeline.
//!
//! - `evaluate_watch`: Decide whether a fresh result fires a watch
//! - `WatchPassRunner`: Search, evaluate and notify across the watch list
//! - `run_doctor`: Operator readiness checks

pub mod doctor;
pub mod evaluate;
pub mod health;
pub mod watch_run;

pub use doctor::{CheckStatus, DoctorCheck, DoctorReport, run_doctor};
pub use evaluate::{TriggerReason, evaluate_watch, trigger_reason};
pub use health::{ExitPolicy, PassHealth};
pub use watch_run::{PassOutcome, WatchPassRunner, WatchRunReport, WatchSelector};
