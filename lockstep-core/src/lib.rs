//! # Lockstep Core
//!
//! Core abstractions for the Lockstep concurrent test runner: the task type every
//! registration shape is normalised to, the per-task outcome, the failure taxonomy and
//! the run configuration.
//!
//! ## Design Principles
//!
//! - **Failures are data**: a task's error or panic is captured, never propagated mid-run
//! - **Position is identity**: every outcome remembers its submission index
//! - **Checked vs unchecked**: returned errors and panics stay distinguishable until raised

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod stats;
pub mod task;

pub use config::{RunConfig, MIN_THREAD_COUNT};
pub use error::{
    panic_message, BoxError, PanicPayload, RaisedFailure, RunnerError, RunnerResult, TaskFailure,
    WaitPhase,
};
pub use stats::RunStats;
pub use task::{Task, TaskFn, TaskOutcome};
