//! # Task Abstraction Layer
//!
//! A task is a zero-argument closure that produces a value, returns an error, or panics.
//! Every registration shape is normalised to [`TaskFn`], a shared fallible closure, so a
//! runner can hold duplicates of one closure and run them again on a later call.
//!
//! ## Examples
//!
//! ```rust
//! use lockstep_core::{Task, TaskOutcome};
//!
//! let task = Task::new(|| 21 * 2);
//! match task.run(0) {
//!     TaskOutcome::Success(v) => assert_eq!(v, 42),
//!     TaskOutcome::Failure(f) => panic!("unexpected {f}"),
//! }
//!
//! let failing = Task::<u8>::fallible(|| Err::<u8, _>("disk full"));
//! assert!(failing.run(3).is_failure());
//! ```

use core::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{BoxError, PanicPayload, TaskFailure};

/// Shared, re-runnable task body.
pub type TaskFn<T> = Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync + 'static>;

/// A registered unit of work.
pub struct Task<T> {
    body: TaskFn<T>,
}

impl<T: Send + 'static> Task<T> {
    /// Create a task from an infallible closure.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            body: Arc::new(move || Ok(func())),
        }
    }

    /// Create a task from a closure that reports failure through its return value.
    pub fn fallible<F, E>(func: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self {
            body: Arc::new(move || func().map_err(Into::into)),
        }
    }

    /// Wrap an already-shared body.
    #[must_use]
    pub fn from_fn(body: TaskFn<T>) -> Self {
        Self { body }
    }

    /// Run the task once on the current thread, capturing any failure.
    ///
    /// `index` is the submission position recorded in the failure.
    #[must_use]
    pub fn run(&self, index: usize) -> TaskOutcome<T> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.body)())) {
            Ok(Ok(value)) => TaskOutcome::Success(value),
            Ok(Err(source)) => TaskOutcome::Failure(TaskFailure::Returned { index, source }),
            Err(payload) => TaskOutcome::Failure(TaskFailure::Panicked {
                index,
                payload: PanicPayload::new(payload),
            }),
        }
    }
}

impl Task<()> {
    /// Create a task from a side-effecting action.
    pub fn action<F>(action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(action)
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            body: Arc::clone(&self.body),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("shared", &Arc::strong_count(&self.body))
            .finish()
    }
}

/// The result of running one task.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// The task produced a value
    Success(T),
    /// The task returned an error or panicked
    Failure(TaskFailure),
}

impl<T> TaskOutcome<T> {
    /// Whether the task produced a value.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether the task failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Borrow the value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failure(_) => None,
        }
    }

    /// Borrow the failure, if any.
    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f),
        }
    }

    /// Split into the `(value, failure)` pair handed to outcome handlers.
    pub fn into_parts(self) -> (Option<T>, Option<TaskFailure>) {
        match self {
            Self::Success(v) => (Some(v), None),
            Self::Failure(f) => (None, Some(f)),
        }
    }

    /// Convert to a standard `Result`.
    pub fn into_result(self) -> Result<T, TaskFailure> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure(f) => Err(f),
        }
    }

    /// Take the value, raising the failure on the current thread otherwise.
    pub fn unwrap_or_raise(self) -> T {
        match self {
            Self::Success(v) => v,
            Self::Failure(f) => f.raise(),
        }
    }
}

impl<T> From<TaskOutcome<T>> for Result<T, TaskFailure> {
    fn from(outcome: TaskOutcome<T>) -> Self {
        outcome.into_result()
    }
}
