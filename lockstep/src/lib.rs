//! # Lockstep - run test closures in lockstep
//!
//! Lockstep runs a set of closures on a fixed pool of worker threads and releases them
//! through a shared start gate, so they begin their real work at about the same instant.
//! It is meant for tests that need to reproduce races: hammer a cache, a counter or a
//! connection pool from many threads at once and check what comes back.
//!
//! ## Features
//!
//! - **Synchronized start**: every scheduled worker parks at a gate that opens only once
//!   all of them are ready
//! - **Ordered results**: outcomes come back in submission order, not completion order
//! - **Failures as data**: a returned `Err` or a panic (including `assert!`) is captured per
//!   task and only raised by the consumption mode you pick
//! - **Bounded pools**: cap the worker count to run many tasks through a few threads
//!
//! ## Example
//!
//! ```rust
//! use lockstep::{run_concurrently, ConcurrentRunner};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), lockstep::RunnerError> {
//! let counter = Arc::new(AtomicU64::new(0));
//! let c = Arc::clone(&counter);
//! run_concurrently(move || { c.fetch_add(1, Ordering::SeqCst); }, 16);
//! assert_eq!(counter.load(Ordering::SeqCst), 16);
//!
//! let results = ConcurrentRunner::fallible(|| Ok::<_, std::io::Error>(1))
//!     .add_fallible(|| Err(std::io::Error::other("boom")))
//!     .add_fallible(|| Ok::<_, std::io::Error>(3))
//!     .execute()?;
//!
//! let seen = results.handle(|value, failure| (value, failure.map(|f| f.message())));
//! assert_eq!(seen, vec![(Some(1), None), (None, Some("boom".to_owned())), (Some(3), None)]);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod result_set;
mod runner;

pub use result_set::{LazyValues, ResultSet};
pub use runner::ConcurrentRunner;

// Re-export core functionality
pub use lockstep_core::{
    panic_message, BoxError, PanicPayload, RaisedFailure, RunConfig, RunStats, RunnerError,
    RunnerResult, Task, TaskFailure, TaskOutcome, WaitPhase, MIN_THREAD_COUNT,
};

// Re-export synchronization primitives
pub use lockstep_sync::{CountDownLatch, GateState, Interrupt, StartGate};

/// Run `action` on `count` threads at once and panic if any run failed.
///
/// # Panics
///
/// Panics if `count` is zero, if the run could not be carried out, or with the first
/// failure raised by any of the `count` runs.
pub fn run_concurrently<F>(action: F, count: usize)
where
    F: Fn() + Send + Sync + 'static,
{
    match ConcurrentRunner::from_action_repeated(action, count).and_then(|r| r.execute()) {
        Ok(results) => results.assert_no_failures(),
        Err(err) => escalate(&err),
    }
}

/// Run every action in `actions` at once and panic if any of them failed.
///
/// # Panics
///
/// Panics if `actions` is empty, if the run could not be carried out, or with the first
/// failure in submission order.
pub fn run_concurrently_all<I>(actions: I)
where
    I: IntoIterator<Item = Task<()>>,
{
    match ConcurrentRunner::from_tasks(actions).and_then(|r| r.execute()) {
        Ok(results) => results.assert_no_failures(),
        Err(err) => escalate(&err),
    }
}

fn escalate(err: &RunnerError) -> ! {
    panic!("concurrent run failed: {err}")
}

/// Convenient re-exports.
pub mod prelude {
    pub use crate::{
        run_concurrently, run_concurrently_all, ConcurrentRunner, ResultSet, RunnerError, Task,
        TaskFailure, TaskOutcome,
    };
}
