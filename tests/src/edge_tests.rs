//! Edge-condition tests for the runner: extreme sizes, nesting, and interrupted runs.

use lockstep::prelude::*;
use lockstep::{CountDownLatch, RunConfig, WaitPhase};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_single_task_runs_on_one_worker() {
    let results = ConcurrentRunner::new(|| thread::current().name().map(str::to_owned))
        .execute()
        .unwrap();
    assert_eq!(results.stats().pool_size, 1);
    let names = results.collect();
    assert_eq!(names, vec![Some("lockstep-worker-0".to_owned())]);
}

#[test]
fn test_many_tasks_two_threads() {
    let results = ConcurrentRunner::repeated(|| 1_u32, 200)
        .unwrap()
        .with_thread_count(2)
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(results.stats().pool_size, 2);
    assert_eq!(results.stats().started_count(), 200);
    assert_eq!(results.collect().iter().sum::<u32>(), 200);
}

#[test]
fn test_wide_fan_out() {
    let seen = Arc::new(Mutex::new(HashSet::new()));
    let s = Arc::clone(&seen);
    let results = ConcurrentRunner::repeated(
        move || {
            let id = thread::current().id();
            s.lock().unwrap().insert(id);
        },
        64,
    )
    .unwrap()
    .execute()
    .unwrap();
    results.assert_no_failures();
    // one thread per task when no cap is set
    assert_eq!(seen.lock().unwrap().len(), 64);
}

#[test]
fn test_zero_sized_values() {
    let values = ConcurrentRunner::repeated(|| (), 4)
        .unwrap()
        .execute()
        .unwrap()
        .collect();
    assert_eq!(values.len(), 4);
}

#[test]
fn test_nested_runner_inside_task() {
    let results = ConcurrentRunner::repeated(
        || {
            ConcurrentRunner::repeated(|| 2_u32, 3)
                .unwrap()
                .execute()
                .unwrap()
                .collect()
                .into_iter()
                .sum::<u32>()
        },
        3,
    )
    .unwrap()
    .execute()
    .unwrap();
    assert_eq!(results.collect(), vec![6, 6, 6]);
}

#[test]
fn test_every_task_fails() {
    let results = ConcurrentRunner::fallible_repeated(|| Err::<u8, _>("always"), 5)
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(results.failure_count(), 5);
    let indices: Vec<_> = results.failures().map(TaskFailure::index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    let err = results.try_collect().unwrap_err();
    assert_eq!(err.index(), 0);
}

#[test]
fn test_contended_structure_sees_every_insert() {
    let n = 32;
    let next = Arc::new(AtomicUsize::new(0));
    let set = Arc::new(Mutex::new(HashSet::new()));
    let (nx, st) = (Arc::clone(&next), Arc::clone(&set));
    run_concurrently(
        move || {
            let key = nx.fetch_add(1, Ordering::SeqCst);
            assert!(st.lock().unwrap().insert(key), "duplicate key {key}");
        },
        n,
    );
    assert_eq!(set.lock().unwrap().len(), n);
}

#[test]
fn test_interrupt_at_readiness_runs_nothing() {
    let ran = Arc::new(AtomicBool::new(false));
    let r = Arc::clone(&ran);
    let runner = ConcurrentRunner::from_action_repeated(
        move || r.store(true, Ordering::SeqCst),
        16,
    )
    .unwrap()
    .with_thread_count(4)
    .unwrap();
    runner.interrupt_handle().raise();

    let err = runner.execute().unwrap_err();
    assert!(matches!(err, RunnerError::Interrupted { phase: WaitPhase::Readiness }));
    assert!(!ran.load(Ordering::SeqCst), "no task body may run after an abandoned start");
}

#[test]
fn test_interrupt_leaves_runner_reusable() {
    let release = Arc::new(CountDownLatch::new(1));
    let r = Arc::clone(&release);
    let blocking = AtomicBool::new(true);
    let runner = ConcurrentRunner::from_action_repeated(
        move || {
            if blocking.swap(false, Ordering::SeqCst) {
                r.wait();
            }
        },
        2,
    )
    .unwrap();
    let interrupt = runner.interrupt_handle();

    let raiser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        interrupt.raise();
    });
    assert!(runner.execute().unwrap_err().is_interrupted());
    raiser.join().unwrap();
    release.count_down();

    // the blocking arm fired once; the second run completes normally
    runner.execute().unwrap().assert_no_failures();
}

#[test]
fn test_stack_size_config() {
    let config = RunConfig::default().with_stack_size(4 * 1024 * 1024);
    let depth = ConcurrentRunner::repeated(
        || {
            fn recurse(n: u32) -> u32 {
                let pad = [0_u8; 1024];
                if n == 0 {
                    u32::from(pad[0])
                } else {
                    1 + recurse(n - 1) + u32::from(std::hint::black_box(pad)[1])
                }
            }
            recurse(1000)
        },
        2,
    )
    .unwrap()
    .with_config(config)
    .unwrap()
    .execute()
    .unwrap()
    .collect();
    assert_eq!(depth, vec![1000, 1000]);
}

#[test]
fn test_with_config_validates() {
    let bad = RunConfig {
        thread_count: Some(1),
        ..RunConfig::default()
    };
    assert!(ConcurrentRunner::new(|| 0).with_config(bad).is_err());
}

#[test]
fn test_nul_in_thread_name_prefix_is_an_error() {
    let config = RunConfig::default().with_thread_name_prefix("race\0worker");
    let outcome = std::panic::catch_unwind(|| {
        ConcurrentRunner::repeated(|| 1, 2)
            .unwrap()
            .with_config(config)
    });
    let err = outcome.expect("rejected without panicking").unwrap_err();
    assert!(matches!(
        err,
        RunnerError::InvalidArgument {
            name: "thread_name_prefix",
            ..
        }
    ));
}
