//! Error types and handling for the Lockstep runner.

use core::any::Any;
use core::fmt;

use thiserror::Error;

/// Boxed error returned by a fallible task.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the runner itself, as opposed to the tasks it runs.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A construction-time parameter was out of range
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Name of the offending parameter
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },
    /// A runner was requested without any task to run
    #[error("a concurrent run needs at least one task")]
    NoTasks,
    /// The orchestrating thread was interrupted while waiting on workers
    #[error("concurrent run interrupted while waiting for {phase}")]
    Interrupted {
        /// What the orchestrator was waiting for
        phase: WaitPhase,
    },
    /// The operating system refused to start a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// A job was submitted to a worker pool that no longer accepts work
    #[error("worker pool is shut down")]
    PoolClosed,
}

impl RunnerError {
    /// Build an [`RunnerError::InvalidArgument`].
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// Whether this error came from an interrupted wait.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// The point of a run at which the orchestrator blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Waiting for scheduled workers to reach the start gate
    Readiness,
    /// Waiting for every task to finish
    Completion,
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Readiness => write!(f, "workers to become ready"),
            Self::Completion => write!(f, "tasks to complete"),
        }
    }
}

/// Payload carried by a panicking task.
pub struct PanicPayload(Box<dyn Any + Send + 'static>);

impl PanicPayload {
    /// Wrap a payload caught by `catch_unwind`.
    #[must_use]
    pub fn new(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self(payload)
    }

    /// Best-effort text of the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        if let Some(s) = self.0.downcast_ref::<&'static str>() {
            s
        } else if let Some(s) = self.0.downcast_ref::<String>() {
            s.as_str()
        } else {
            "Box<dyn Any>"
        }
    }

    /// Borrow the raw payload, for downcasting.
    #[must_use]
    pub fn as_any(&self) -> &(dyn Any + Send) {
        &*self.0
    }

    /// Give back the raw payload, e.g. for `resume_unwind`.
    #[must_use]
    pub fn into_inner(self) -> Box<dyn Any + Send + 'static> {
        self.0
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicPayload").field(&self.message()).finish()
    }
}

/// A single task's failure, captured as data during a run.
///
/// `Returned` is the checked path: the task handed back an `Err`. `Panicked` is the
/// unchecked path and includes `assert!` failures inside the task body.
#[derive(Debug, Error)]
pub enum TaskFailure {
    /// The task returned an error
    #[error("task #{index} failed: {source}")]
    Returned {
        /// Submission index of the task
        index: usize,
        /// Error returned by the task
        #[source]
        source: BoxError,
    },
    /// The task panicked
    #[error("task #{index} panicked: {}", .payload.message())]
    Panicked {
        /// Submission index of the task
        index: usize,
        /// Original panic payload
        payload: PanicPayload,
    },
}

impl TaskFailure {
    /// Submission index of the failed task.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Returned { index, .. } | Self::Panicked { index, .. } => *index,
        }
    }

    /// Whether the task reported the failure through its return value.
    #[must_use]
    pub fn is_checked(&self) -> bool {
        matches!(self, Self::Returned { .. })
    }

    /// Human-readable message of the underlying failure, without the task prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Returned { source, .. } => source.to_string(),
            Self::Panicked { payload, .. } => payload.message().to_owned(),
        }
    }

    /// Raise this failure on the current thread.
    ///
    /// Panics are resumed with their original payload. Returned errors are raised with a
    /// [`RaisedFailure`] payload that keeps the task's error reachable through `source()`.
    pub fn raise(self) -> ! {
        match self {
            Self::Panicked { payload, .. } => std::panic::resume_unwind(payload.into_inner()),
            returned @ Self::Returned { .. } => std::panic::panic_any(RaisedFailure(returned)),
        }
    }
}

/// Unchecked wrapper that carries a returned task error across a panic.
///
/// Recover it from a caught payload with `payload.downcast::<RaisedFailure>()`.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RaisedFailure(#[source] TaskFailure);

impl RaisedFailure {
    /// The wrapped failure.
    #[must_use]
    pub fn failure(&self) -> &TaskFailure {
        &self.0
    }

    /// Error the task returned, if the wrapped failure is a returned one.
    #[must_use]
    pub fn task_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match &self.0 {
            TaskFailure::Returned { source, .. } => Some(source.as_ref()),
            TaskFailure::Panicked { .. } => None,
        }
    }

    /// Unwrap the failure.
    #[must_use]
    pub fn into_inner(self) -> TaskFailure {
        self.0
    }
}

/// Best-effort text of a caught panic payload, including [`RaisedFailure`] payloads.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(raised) = payload.downcast_ref::<RaisedFailure>() {
        raised.to_string()
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

/// A result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
