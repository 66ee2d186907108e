//! Synchronization primitives for the Lockstep runner.
//!
//! A run is coordinated with three pieces: a [`CountDownLatch`] that workers count down
//! once they are parked and ready, a [`StartGate`] that releases every parked worker at
//! once, and a second latch counted down as tasks finish. The orchestrator's waits on the
//! latches can be cut short by an [`Interrupt`] raised from another thread.

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex, MutexGuard, PoisonError,
};
use std::time::Duration;

use thiserror::Error;

/// How often an interruptible wait rechecks its [`Interrupt`].
pub const INTERRUPT_POLL: Duration = Duration::from_millis(5);

/// Returned when an interruptible wait was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait interrupted")]
pub struct Interrupted;

// None of the guarded sections here run user code, so a poisoned lock still holds
// consistent state.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A one-shot counter that releases waiters when it reaches zero.
pub struct CountDownLatch {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl CountDownLatch {
    /// Create a latch that opens after `count` calls to [`count_down`](Self::count_down).
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            condvar: Condvar::new(),
        }
    }

    /// Decrement the count, waking every waiter when it hits zero.
    ///
    /// Counting down an open latch has no effect.
    pub fn count_down(&self) {
        let mut count = lock(&self.count);
        if *count == 0 {
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.condvar.notify_all();
        }
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> usize {
        *lock(&self.count)
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let mut count = lock(&self.count);
        while *count > 0 {
            count = self
                .condvar
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the count reaches zero or `interrupt` is raised.
    ///
    /// A raised interrupt is consumed by the wait that observes it, so a later wait on the
    /// same handle starts clean.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] if the interrupt was raised before the latch opened.
    pub fn wait_interruptible(&self, interrupt: &Interrupt) -> Result<(), Interrupted> {
        let mut count = lock(&self.count);
        loop {
            if interrupt.take() {
                return Err(Interrupted);
            }
            if *count == 0 {
                return Ok(());
            }
            count = self
                .condvar
                .wait_timeout(count, INTERRUPT_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl std::fmt::Debug for CountDownLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountDownLatch")
            .field("count", &self.count())
            .finish()
    }
}

/// State of a [`StartGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Workers arriving at the gate block
    Closed,
    /// Workers pass straight through
    Open,
    /// The run was abandoned; workers pass but must not run their task
    Abandoned,
}

/// A gate that holds workers until the orchestrator opens it.
pub struct StartGate {
    state: Mutex<GateState>,
    condvar: Condvar,
}

impl StartGate {
    /// Create a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Closed),
            condvar: Condvar::new(),
        }
    }

    /// Release every waiter and let later arrivals through. No effect once abandoned.
    pub fn open(&self) {
        self.settle(GateState::Open);
    }

    /// Release every waiter with the instruction to skip its task.
    pub fn abandon(&self) {
        self.settle(GateState::Abandoned);
    }

    fn settle(&self, to: GateState) {
        let mut state = lock(&self.state);
        if *state == GateState::Closed {
            *state = to;
            self.condvar.notify_all();
        }
    }

    /// Block while the gate is closed and report how it was left.
    ///
    /// Returns `true` when the gate opened, `false` when it was abandoned.
    pub fn wait(&self) -> bool {
        let mut state = lock(&self.state);
        while *state == GateState::Closed {
            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state == GateState::Open
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> GateState {
        *lock(&self.state)
    }
}

impl Default for StartGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StartGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartGate")
            .field("state", &self.state())
            .finish()
    }
}

/// A cloneable flag that interrupts an orchestrator blocked in
/// [`CountDownLatch::wait_interruptible`].
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    /// Create a handle with the flag lowered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Whether the flag is raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Lower the flag and report whether it was raised.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }
}
