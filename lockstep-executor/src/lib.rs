//! Fixed-size worker pool for the Lockstep runner.
//!
//! A [`WorkerPool`] is built for a single run: its threads pull boxed jobs from a shared
//! queue in submission order and exit once the queue is closed. Dropping the pool closes
//! the queue and joins every worker; [`WorkerPool::detach`] closes the queue without
//! joining, for runs whose workers may still be blocked.

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc, Mutex, PoisonError,
};
use std::thread::{self, JoinHandle};

use lockstep_core::{RunConfig, RunnerError, RunnerResult};
use tracing::{debug, trace, warn};

/// A unit of work queued on the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

type SharedQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    panicked: AtomicUsize,
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads
    pub workers: usize,
    /// Jobs accepted by [`WorkerPool::submit`]
    pub submitted: usize,
    /// Jobs that ran to completion
    pub completed: usize,
    /// Jobs that unwound out of the worker
    pub panicked: usize,
}

impl PoolStats {
    /// Jobs accepted but not yet finished.
    ///
    /// The counters are read independently, so a snapshot taken while jobs finish may
    /// briefly undercount; it never goes below zero.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.submitted
            .saturating_sub(self.completed)
            .saturating_sub(self.panicked)
    }
}

struct Worker {
    name: String,
    handle: JoinHandle<()>,
}

/// A fixed set of named threads draining one job queue.
pub struct WorkerPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<Worker>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Start `size` workers named after `config.thread_name_prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidArgument`] for a zero size or an invalid `config`,
    /// and [`RunnerError::Spawn`] if a thread could not be created. Workers started
    /// before a spawn failure are shut down again.
    pub fn new(size: usize, config: &RunConfig) -> RunnerResult<Self> {
        config.validate()?;
        if size == 0 {
            return Err(RunnerError::invalid_argument(
                "pool_size",
                "a worker pool needs at least one thread",
            ));
        }

        let (sender, receiver) = mpsc::channel::<Job>();
        let queue: SharedQueue = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(size),
            counters,
        };

        for id in 0..size {
            let name = format!("{}-{id}", config.thread_name_prefix);
            let mut builder = thread::Builder::new().name(name.clone());
            if let Some(bytes) = config.stack_size {
                builder = builder.stack_size(bytes);
            }
            let queue = Arc::clone(&queue);
            let counters = Arc::clone(&pool.counters);
            // On error `pool` drops here, closing the queue and joining what was started.
            let handle = builder.spawn(move || worker_loop(&queue, &counters))?;
            pool.workers.push(Worker { name, handle });
        }

        debug!(workers = size, prefix = %config.thread_name_prefix, "worker pool started");
        Ok(pool)
    }

    /// Queue a job. Jobs start in submission order as workers free up.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::PoolClosed`] once the pool has been shut down.
    pub fn submit<F>(&self, job: F) -> RunnerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(RunnerError::PoolClosed)?;
        // Count before sending so a worker can never report the job finished first.
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        if sender.send(Box::new(job)).is_err() {
            self.counters.submitted.fetch_sub(1, Ordering::Relaxed);
            return Err(RunnerError::PoolClosed);
        }
        Ok(())
    }

    /// Number of worker threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool still accepts jobs.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.sender.is_some()
    }

    /// Snapshot of the job counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers.len(),
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }

    /// Close the queue and wait for every worker to drain it and exit.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.handle.join().is_err() {
                warn!(worker = %worker.name, "worker thread exited abnormally");
            }
        }
    }

    /// Close the queue and let the workers finish on their own.
    ///
    /// Queued jobs still run. Nothing waits for them.
    pub fn detach(mut self) {
        self.sender.take();
        let stats = self.stats();
        self.workers.clear();
        warn!(
            workers = stats.workers,
            pending = stats.pending(),
            "worker pool detached without joining"
        );
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("open", &self.is_open())
            .field("stats", &self.stats())
            .finish()
    }
}

fn worker_loop(queue: &Mutex<mpsc::Receiver<Job>>, counters: &Counters) {
    loop {
        // Only the receive happens under the lock; the job runs after the guard drops.
        let job = {
            let receiver = queue.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv()
        };
        let Ok(job) = job else {
            break;
        };
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                warn!("job unwound out of its worker");
            }
        }
    }
    trace!(worker = ?thread::current().name(), "worker exiting");
}
