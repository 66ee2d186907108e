//! Property-based tests using proptest and quickcheck.

use lockstep::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Property-based tests using proptest
mod proptest_properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Property: outcome i always belongs to task i, whatever the completion order
        #[test]
        fn prop_submission_order_preserved(
            delays in prop::collection::vec(0u64..8, 1..12),
            threads in prop::option::of(2usize..6),
        ) {
            let tasks = delays.iter().copied().enumerate().map(|(i, delay)| {
                Task::new(move || {
                    thread::sleep(Duration::from_millis(delay));
                    i
                })
            });
            let mut runner = ConcurrentRunner::from_tasks(tasks).unwrap();
            if let Some(threads) = threads {
                runner = runner.with_thread_count(threads).unwrap();
            }
            let values = runner.execute().unwrap().collect();
            prop_assert_eq!(values, (0..delays.len()).collect::<Vec<_>>());
        }

        /// Property: exactly the failing positions are reported, in order
        #[test]
        fn prop_failures_reported_at_their_positions(
            failing in prop::collection::vec(any::<bool>(), 1..16),
        ) {
            let tasks = failing.iter().copied().enumerate().map(|(i, fails)| {
                Task::fallible(move || if fails { Err(format!("#{i}")) } else { Ok(i) })
            });
            let results = ConcurrentRunner::from_tasks(tasks).unwrap().execute().unwrap();

            let expected_failures: Vec<usize> = failing
                .iter()
                .enumerate()
                .filter_map(|(i, f)| f.then_some(i))
                .collect();
            let reported: Vec<usize> = results.failures().map(TaskFailure::index).collect();
            prop_assert_eq!(&reported, &expected_failures);

            let seen = results.handle(|value, failure| (value.is_some(), failure.is_some()));
            for (i, (has_value, has_failure)) in seen.into_iter().enumerate() {
                prop_assert_eq!(has_value, !failing[i]);
                prop_assert_eq!(has_failure, failing[i]);
            }
        }

        /// Property: a capped pool never runs more than its cap at once
        #[test]
        fn prop_thread_cap_respected(tasks in 2usize..20, cap in 2usize..5) {
            let in_flight = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));
            ConcurrentRunner::from_action_repeated(
                move || {
                    let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(1));
                    f.fetch_sub(1, Ordering::SeqCst);
                },
                tasks,
            )
            .unwrap()
            .with_thread_count(cap)
            .unwrap()
            .execute()
            .unwrap()
            .assert_no_failures();
            prop_assert!(peak.load(Ordering::SeqCst) <= cap.min(tasks));
        }
    }
}

/// QuickCheck-based property tests
mod quickcheck_properties {
    use super::*;
    use quickcheck::{quickcheck, TestResult};

    quickcheck! {
        /// Property: every execute() runs every task exactly once more
        fn qc_reexecution_advances_counter(repeats: u8, runs: u8) -> TestResult {
            let repeats = usize::from(repeats % 12);
            let runs = usize::from(runs % 4);
            if repeats == 0 {
                return TestResult::discard();
            }
            let counter = Arc::new(AtomicUsize::new(0));
            let c = Arc::clone(&counter);
            let runner = ConcurrentRunner::from_action_repeated(
                move || {
                    c.fetch_add(1, Ordering::SeqCst);
                },
                repeats,
            )
            .unwrap();
            for run in 1..=runs {
                runner.execute().unwrap().assert_no_failures();
                if counter.load(Ordering::SeqCst) != run * repeats {
                    return TestResult::failed();
                }
            }
            TestResult::passed()
        }

        /// Property: thread counts below two are always rejected, others accepted
        fn qc_thread_count_validation(threads: u8) -> bool {
            let accepted = ConcurrentRunner::new(|| ())
                .with_thread_count(usize::from(threads))
                .is_ok();
            accepted == (threads >= 2)
        }

        /// Property: a zero repeat count is the only rejected one
        fn qc_repeat_count_validation(repeats: u8) -> bool {
            let result = ConcurrentRunner::repeated(|| 0_u8, usize::from(repeats % 8));
            match result {
                Ok(runner) => runner.task_count() == usize::from(repeats % 8),
                Err(RunnerError::InvalidArgument { name, .. }) => repeats % 8 == 0 && name == "repeat_count",
                Err(_) => false,
            }
        }
    }
}
