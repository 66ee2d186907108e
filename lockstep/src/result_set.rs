//! The ordered outcomes of one run and the ways to consume them.

use std::iter::FusedIterator;
use std::vec;

use lockstep_core::{RunStats, TaskFailure, TaskOutcome};

/// Outcomes of one `execute()` call, in task submission order.
///
/// Failures stay data until a consuming method decides otherwise:
///
/// | Method                 | On failure                                              |
/// |------------------------|---------------------------------------------------------|
/// | [`collect`]            | raises the first failure                                |
/// | [`try_collect`]        | returns the first failure as `Err`                      |
/// | [`into_lazy`]          | raises a failure when iteration reaches it              |
/// | [`assert_no_failures`] | raises the first failure                                |
/// | [`handle`]             | hands every failure to the caller, raises nothing       |
///
/// "Raise" means a panic: a task that panicked is resumed with its own payload, and a task
/// that returned `Err` panics with the wrapped message `task #<index> failed: <error>`.
///
/// [`collect`]: ResultSet::collect
/// [`try_collect`]: ResultSet::try_collect
/// [`into_lazy`]: ResultSet::into_lazy
/// [`assert_no_failures`]: ResultSet::assert_no_failures
/// [`handle`]: ResultSet::handle
#[derive(Debug)]
pub struct ResultSet<T> {
    outcomes: Vec<TaskOutcome<T>>,
    stats: RunStats,
}

impl<T> ResultSet<T> {
    pub(crate) fn new(outcomes: Vec<TaskOutcome<T>>, stats: RunStats) -> Self {
        Self { outcomes, stats }
    }

    /// Number of outcomes, one per submitted task.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether there are no outcomes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Borrow every outcome in submission order.
    #[must_use]
    pub fn outcomes(&self) -> &[TaskOutcome<T>] {
        &self.outcomes
    }

    /// Iterate over the outcomes in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, TaskOutcome<T>> {
        self.outcomes.iter()
    }

    /// Iterate over the failures in submission order.
    pub fn failures(&self) -> impl Iterator<Item = &TaskFailure> + '_ {
        self.outcomes.iter().filter_map(TaskOutcome::failure)
    }

    /// The failure that raising modes would report.
    #[must_use]
    pub fn first_failure(&self) -> Option<&TaskFailure> {
        self.failures().next()
    }

    /// Number of tasks that produced a value.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of tasks that failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    /// Whether any task failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(TaskOutcome::is_failure)
    }

    /// Timing statistics for the run.
    #[must_use]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Every value in submission order.
    ///
    /// # Panics
    ///
    /// Raises the first failure in submission order, if any.
    #[must_use]
    pub fn collect(self) -> Vec<T> {
        match self.try_collect() {
            Ok(values) => values,
            Err(failure) => failure.raise(),
        }
    }

    /// Every value in submission order, or the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first failure in submission order. Later failures are dropped.
    pub fn try_collect(self) -> Result<Vec<T>, TaskFailure> {
        self.outcomes
            .into_iter()
            .map(TaskOutcome::into_result)
            .collect()
    }

    /// A lazy iterator over the values.
    ///
    /// Values before a failed position are yielded normally; the failure is raised by the
    /// `next()` call that reaches it.
    #[must_use]
    pub fn into_lazy(self) -> LazyValues<T> {
        LazyValues {
            inner: self.outcomes.into_iter(),
        }
    }

    /// Return normally only if every task succeeded.
    ///
    /// # Panics
    ///
    /// Raises the first failure in submission order, if any.
    pub fn assert_no_failures(self) {
        if let Some(failure) = self.outcomes.into_iter().find_map(|o| o.into_parts().1) {
            failure.raise();
        }
    }

    /// Pass each outcome to `combiner` as `(value, failure)` and collect what it returns.
    ///
    /// Exactly one side of the pair is `Some`. Nothing is raised by this method.
    pub fn handle<R, F>(self, mut combiner: F) -> Vec<R>
    where
        F: FnMut(Option<T>, Option<TaskFailure>) -> R,
    {
        self.outcomes
            .into_iter()
            .map(|outcome| {
                let (value, failure) = outcome.into_parts();
                combiner(value, failure)
            })
            .collect()
    }

    /// Give up the outcomes.
    #[must_use]
    pub fn into_outcomes(self) -> Vec<TaskOutcome<T>> {
        self.outcomes
    }
}

impl<T> IntoIterator for ResultSet<T> {
    type Item = TaskOutcome<T>;
    type IntoIter = vec::IntoIter<TaskOutcome<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ResultSet<T> {
    type Item = &'a TaskOutcome<T>;
    type IntoIter = std::slice::Iter<'a, TaskOutcome<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

/// Values of a [`ResultSet`], raising each failure when it is reached.
#[derive(Debug)]
pub struct LazyValues<T> {
    inner: vec::IntoIter<TaskOutcome<T>>,
}

impl<T> Iterator for LazyValues<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next().map(TaskOutcome::unwrap_or_raise)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> FusedIterator for LazyValues<T> {}
