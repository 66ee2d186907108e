//! Timing statistics gathered during a run.

use std::time::{Duration, Instant};

/// What happened during one `execute()` call.
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Number of worker threads started
    pub pool_size: usize,
    /// Number of tasks submitted
    pub task_count: usize,
    /// Instant each task passed the start gate, by submission index
    pub started_at: Vec<Option<Instant>>,
    /// Wall-clock time from pool start to the last outcome
    pub elapsed: Duration,
}

impl RunStats {
    /// Gap between the earliest and latest task start.
    ///
    /// Tasks that never started are ignored. Returns zero when fewer than two started.
    #[must_use]
    pub fn start_spread(&self) -> Duration {
        let mut started = self.started_at.iter().flatten();
        let Some(first) = started.next() else {
            return Duration::ZERO;
        };
        let (min, max) = started.fold((*first, *first), |(lo, hi), t| (lo.min(*t), hi.max(*t)));
        max.duration_since(min)
    }

    /// Number of tasks that passed the start gate.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.started_at.iter().filter(|t| t.is_some()).count()
    }
}
