//! Benchmark support for the Lockstep runner.
//!
//! Besides the criterion benches, this crate summarises how tightly the start gate
//! groups task start instants across repeated runs.

use std::time::Duration;

use lockstep::{ConcurrentRunner, RunnerResult};

/// Minimum number of runs for a meaningful spread summary.
pub const MIN_SAMPLES: usize = 10;

/// Start-spread figures over a series of runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadSummary {
    /// Number of runs measured
    pub samples: usize,
    /// Smallest spread observed
    pub min: Duration,
    /// Median spread
    pub median: Duration,
    /// Largest spread observed
    pub max: Duration,
}

impl SpreadSummary {
    /// Summarise a set of spreads. Returns `None` for an empty set.
    #[must_use]
    pub fn from_spreads(mut spreads: Vec<Duration>) -> Option<Self> {
        if spreads.is_empty() {
            return None;
        }
        spreads.sort_unstable();
        Some(Self {
            samples: spreads.len(),
            min: spreads[0],
            median: spreads[spreads.len() / 2],
            max: spreads[spreads.len() - 1],
        })
    }
}

/// Run `tasks` no-op tasks `runs` times and summarise the start spread.
///
/// # Errors
///
/// Propagates any runner error.
pub fn measure_start_spread(tasks: usize, runs: usize) -> RunnerResult<Option<SpreadSummary>> {
    let runner = ConcurrentRunner::repeated(|| (), tasks)?;
    let mut spreads = Vec::with_capacity(runs);
    for _ in 0..runs {
        spreads.push(runner.execute()?.stats().start_spread());
    }
    Ok(SpreadSummary::from_spreads(spreads))
}
