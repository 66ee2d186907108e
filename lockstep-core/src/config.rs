//! Run configuration.

use crate::error::{RunnerError, RunnerResult};

/// Smallest worker count accepted as an override. A single worker cannot overlap tasks.
pub const MIN_THREAD_COUNT: usize = 2;

/// Configuration for one concurrent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Worker thread override; `None` means one thread per task
    pub thread_count: Option<usize>,
    /// Thread name prefix for worker threads
    pub thread_name_prefix: String,
    /// Stack size for worker threads (bytes); `None` uses the platform default
    pub stack_size: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            thread_count: None,
            thread_name_prefix: "lockstep-worker".into(),
            stack_size: None,
        }
    }
}

impl RunConfig {
    /// Set the worker thread override.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] when `threads` is below
    /// [`MIN_THREAD_COUNT`].
    pub fn with_thread_count(mut self, threads: usize) -> RunnerResult<Self> {
        validate_thread_count(threads)?;
        self.thread_count = Some(threads);
        Ok(self)
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker stack size.
    #[must_use]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Check every field against its invariant.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] for an out-of-range thread count or a
    /// thread name prefix the OS cannot use.
    pub fn validate(&self) -> RunnerResult<()> {
        if let Some(threads) = self.thread_count {
            validate_thread_count(threads)?;
        }
        validate_thread_name_prefix(&self.thread_name_prefix)
    }

    /// Number of workers to start for `tasks` tasks.
    #[must_use]
    pub fn pool_size(&self, tasks: usize) -> usize {
        self.thread_count.map_or(tasks, |threads| threads.min(tasks))
    }
}

/// Reject worker counts that cannot produce any overlap.
///
/// # Errors
///
/// Returns [`RunnerError::InvalidArgument`] when `threads < MIN_THREAD_COUNT`.
pub fn validate_thread_count(threads: usize) -> RunnerResult<()> {
    if threads < MIN_THREAD_COUNT {
        return Err(RunnerError::invalid_argument(
            "thread_count",
            format!("must be at least {MIN_THREAD_COUNT}, got {threads}"),
        ));
    }
    Ok(())
}

/// Reject thread name prefixes that cannot become a thread name.
///
/// # Errors
///
/// Returns [`RunnerError::InvalidArgument`] when `prefix` contains a NUL byte.
pub fn validate_thread_name_prefix(prefix: &str) -> RunnerResult<()> {
    if let Some(pos) = prefix.find('\0') {
        return Err(RunnerError::invalid_argument(
            "thread_name_prefix",
            format!("must not contain a NUL byte, found one at offset {pos}"),
        ));
    }
    Ok(())
}

/// Reject repeat counts that would register nothing.
///
/// # Errors
///
/// Returns [`RunnerError::InvalidArgument`] when `repeat_count` is zero.
pub fn validate_repeat_count(repeat_count: usize) -> RunnerResult<()> {
    if repeat_count < 1 {
        return Err(RunnerError::invalid_argument(
            "repeat_count",
            format!("must be at least 1, got {repeat_count}"),
        ));
    }
    Ok(())
}
