//! The concurrent task runner.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use lockstep_core::{
    config::validate_repeat_count, BoxError, RunConfig, RunStats, RunnerError, RunnerResult,
    Task, TaskOutcome, WaitPhase,
};
use lockstep_executor::WorkerPool;
use lockstep_sync::{CountDownLatch, Interrupt, StartGate};
use tracing::{debug, trace, warn};

use crate::result_set::ResultSet;

/// Runs a list of tasks on a fixed pool of threads that all start at the same instant.
///
/// The runner is a by-value builder: register tasks, optionally cap the worker count,
/// then call [`execute`](Self::execute). Every call to `execute` runs every task again
/// from scratch on a fresh pool.
///
/// # Examples
///
/// ```rust
/// use lockstep::ConcurrentRunner;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let h = Arc::clone(&hits);
/// let results = ConcurrentRunner::repeated(move || h.fetch_add(1, Ordering::SeqCst), 8)?
///     .with_thread_count(4)?
///     .execute()?;
///
/// assert_eq!(results.len(), 8);
/// assert_eq!(hits.load(Ordering::SeqCst), 8);
/// # Ok::<(), lockstep::RunnerError>(())
/// ```
pub struct ConcurrentRunner<T> {
    tasks: Vec<Task<T>>,
    config: RunConfig,
    interrupt: Interrupt,
}

impl<T: Send + 'static> ConcurrentRunner<T> {
    /// Start a runner with one infallible task.
    pub fn new<F>(task: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_task(Task::new(task))
    }

    /// Start a runner with one infallible task registered `repeat_count` times.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] if `repeat_count` is zero.
    pub fn repeated<F>(task: F, repeat_count: usize) -> RunnerResult<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_task_repeated(Task::new(task), repeat_count)
    }

    /// Start a runner with one task that reports failure through `Err`.
    pub fn fallible<F, E>(task: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::from_task(Task::fallible(task))
    }

    /// Start a runner with one fallible task registered `repeat_count` times.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] if `repeat_count` is zero.
    pub fn fallible_repeated<F, E>(task: F, repeat_count: usize) -> RunnerResult<Self>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::from_task_repeated(Task::fallible(task), repeat_count)
    }

    /// Start a runner with an already-built task.
    #[must_use]
    pub fn from_task(task: Task<T>) -> Self {
        Self {
            tasks: vec![task],
            config: RunConfig::default(),
            interrupt: Interrupt::new(),
        }
    }

    /// Start a runner with an already-built task registered `repeat_count` times.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] if `repeat_count` is zero.
    pub fn from_task_repeated(task: Task<T>, repeat_count: usize) -> RunnerResult<Self> {
        validate_repeat_count(repeat_count)?;
        Ok(Self {
            tasks: vec![task; repeat_count],
            config: RunConfig::default(),
            interrupt: Interrupt::new(),
        })
    }

    /// Start a runner from a list of tasks.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::NoTasks`] if the list is empty.
    pub fn from_tasks<I>(tasks: I) -> RunnerResult<Self>
    where
        I: IntoIterator<Item = Task<T>>,
    {
        let tasks: Vec<_> = tasks.into_iter().collect();
        if tasks.is_empty() {
            return Err(RunnerError::NoTasks);
        }
        Ok(Self {
            tasks,
            config: RunConfig::default(),
            interrupt: Interrupt::new(),
        })
    }

    /// Append an infallible task.
    #[must_use]
    pub fn add_task<F>(self, task: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.push(Task::new(task))
    }

    /// Append an infallible task `repeat_count` times.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] if `repeat_count` is zero.
    pub fn add_task_repeated<F>(self, task: F, repeat_count: usize) -> RunnerResult<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.push_repeated(Task::new(task), repeat_count)
    }

    /// Append a fallible task.
    #[must_use]
    pub fn add_fallible<F, E>(self, task: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.push(Task::fallible(task))
    }

    /// Append a fallible task `repeat_count` times.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] if `repeat_count` is zero.
    pub fn add_fallible_repeated<F, E>(self, task: F, repeat_count: usize) -> RunnerResult<Self>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.push_repeated(Task::fallible(task), repeat_count)
    }

    /// Append an already-built task.
    #[must_use]
    pub fn push(mut self, task: Task<T>) -> Self {
        self.tasks.push(task);
        self
    }

    /// Append an already-built task `repeat_count` times.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] if `repeat_count` is zero.
    pub fn push_repeated(mut self, task: Task<T>, repeat_count: usize) -> RunnerResult<Self> {
        validate_repeat_count(repeat_count)?;
        self.tasks.extend(std::iter::repeat(task).take(repeat_count));
        Ok(self)
    }

    /// Cap the number of worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] if `threads` is below 2.
    pub fn with_thread_count(mut self, threads: usize) -> RunnerResult<Self> {
        self.config = self.config.with_thread_count(threads)?;
        Ok(self)
    }

    /// Replace the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] if the configuration is out of range.
    pub fn with_config(mut self, config: RunConfig) -> RunnerResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// A handle that interrupts this runner's waits from another thread.
    ///
    /// Raising it makes the current or next [`execute`](Self::execute) call return
    /// [`RunnerError::Interrupted`].
    #[must_use]
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Number of registered tasks, counting repeats.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// The worker cap, if one was set.
    #[must_use]
    pub fn thread_count(&self) -> Option<usize> {
        self.config.thread_count
    }

    /// Number of workers the next run will start.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.config.pool_size(self.tasks.len())
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every task and gather one outcome per task, in submission order.
    ///
    /// The first pool-size batch of tasks is parked at a start gate until all of them are
    /// ready, then released together. Task failures are captured in the result set.
    ///
    /// # Errors
    ///
    /// - [`RunnerError::Interrupted`] if the [interrupt handle](Self::interrupt_handle)
    ///   was raised while waiting. No partial result is returned.
    /// - [`RunnerError::Spawn`] if a worker thread could not be started.
    pub fn execute(&self) -> RunnerResult<ResultSet<T>> {
        let task_count = self.tasks.len();
        let pool_size = self.pool_size();
        let started = Instant::now();
        debug!(tasks = task_count, threads = pool_size, "starting concurrent run");

        let run = Arc::new(RunState::new(task_count, pool_size));
        let mut pool = WorkerPool::new(pool_size, &self.config)?;

        for (index, task) in self.tasks.iter().enumerate() {
            let task = task.clone();
            let job_state = Arc::clone(&run);
            if let Err(err) = pool.submit(move || job_state.run_job(index, &task)) {
                run.gate.abandon();
                return Err(err);
            }
        }

        if run.ready.wait_interruptible(&self.interrupt).is_err() {
            // Workers are parked at the gate, so abandoning it lets the pool join cleanly.
            run.gate.abandon();
            drop(pool);
            return Err(interrupted(WaitPhase::Readiness));
        }
        run.gate.open();
        debug!(threads = pool_size, "start gate opened");

        if run.done.wait_interruptible(&self.interrupt).is_err() {
            // Task bodies may never return; leave them running.
            pool.detach();
            return Err(interrupted(WaitPhase::Completion));
        }
        pool.shutdown();
        let jobs = pool.stats();

        let (outcomes, started_at) = run.take();
        let results = ResultSet::new(
            outcomes,
            RunStats {
                pool_size,
                task_count,
                started_at,
                elapsed: started.elapsed(),
            },
        );
        debug!(
            successes = results.success_count(),
            failures = results.failure_count(),
            jobs = jobs.completed,
            elapsed = ?results.stats().elapsed,
            "concurrent run finished"
        );
        Ok(results)
    }
}

impl ConcurrentRunner<()> {
    /// Start a runner with one side-effecting action.
    pub fn from_action<F>(action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::from_task(Task::action(action))
    }

    /// Start a runner with one action registered `repeat_count` times.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] if `repeat_count` is zero.
    pub fn from_action_repeated<F>(action: F, repeat_count: usize) -> RunnerResult<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::from_task_repeated(Task::action(action), repeat_count)
    }

    /// Append an action.
    #[must_use]
    pub fn add_action<F>(self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.push(Task::action(action))
    }

    /// Append an action `repeat_count` times.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] if `repeat_count` is zero.
    pub fn add_action_repeated<F>(self, action: F, repeat_count: usize) -> RunnerResult<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.push_repeated(Task::action(action), repeat_count)
    }
}

impl<T> std::fmt::Debug for ConcurrentRunner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentRunner")
            .field("tasks", &self.tasks.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn interrupted(phase: WaitPhase) -> RunnerError {
    warn!(%phase, "concurrent run interrupted");
    RunnerError::Interrupted { phase }
}

/// Coordination state shared by the orchestrator and every job of one run.
struct RunState<T> {
    ready: CountDownLatch,
    gate: StartGate,
    done: CountDownLatch,
    slots: Mutex<Slots<T>>,
}

struct Slots<T> {
    outcomes: Vec<Option<TaskOutcome<T>>>,
    started_at: Vec<Option<Instant>>,
}

impl<T: Send + 'static> RunState<T> {
    fn new(task_count: usize, pool_size: usize) -> Self {
        Self {
            ready: CountDownLatch::new(pool_size),
            gate: StartGate::new(),
            done: CountDownLatch::new(task_count),
            slots: Mutex::new(Slots {
                outcomes: std::iter::repeat_with(|| None).take(task_count).collect(),
                started_at: vec![None; task_count],
            }),
        }
    }

    fn run_job(&self, index: usize, task: &Task<T>) {
        // Jobs beyond the first pool-size batch find the latch already at zero and the
        // gate already open.
        self.ready.count_down();
        trace!(task = index, "parked at start gate");
        if !self.gate.wait() {
            trace!(task = index, "run abandoned, skipping task");
            return;
        }

        let started_at = Instant::now();
        let outcome = task.run(index);
        if let TaskOutcome::Failure(failure) = &outcome {
            debug!(task = index, checked = failure.is_checked(), %failure, "task failed");
        }

        {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.outcomes[index] = Some(outcome);
            slots.started_at[index] = Some(started_at);
        }
        self.done.count_down();
    }

    /// Move the outcomes out. Call only after `done` has reached zero.
    fn take(&self) -> (Vec<TaskOutcome<T>>, Vec<Option<Instant>>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let outcomes: Vec<_> = std::mem::take(&mut slots.outcomes)
            .into_iter()
            .flatten()
            .collect();
        let started_at = std::mem::take(&mut slots.started_at);
        debug_assert_eq!(outcomes.len(), started_at.len(), "every slot is filled");
        (outcomes, started_at)
    }
}
