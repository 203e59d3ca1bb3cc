//! Integration tests for the fiber job system.
//!
//! These tests exercise the scheduler through its public API only:
//! counters, nested fiber waits, grouped jobs, continuations and priorities.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rstest::rstest;

use common::{Gate, job_system};
use fibra_core::jobs::{
    JobError, JobHandle, JobInfo, JobSystem, JobSystemConfig, Jobs, MIN_FIBER_STACK_SIZE, Priority,
};

fn counting_jobs(counter: &Arc<AtomicU32>, count: u32) -> Vec<JobInfo> {
    (0..count)
        .map(|i| {
            let counter = Arc::clone(counter);
            JobInfo::new("count", move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .with_param(i)
        })
        .collect()
}

// ============================================================================
// Counters
// ============================================================================

#[rstest]
#[case::one_worker_one_job(1, 1)]
#[case::one_worker_many_jobs(1, 100)]
#[case::four_workers(4, 100)]
#[case::eight_workers(8, 1000)]
fn test_run_jobs_completes_every_job(#[case] workers: usize, #[case] jobs: u32) {
    let system = job_system(workers);
    let counter = Arc::new(AtomicU32::new(0));

    let handle = system.jobs().run_jobs(counting_jobs(&counter, jobs));
    system.jobs().wait(handle);

    assert_eq!(counter.load(Ordering::Relaxed), jobs);
    assert!(system.jobs().is_complete(handle));
}

#[test]
fn test_wait_before_any_job_started_sees_whole_batch() {
    let system = job_system(1);
    let jobs = system.jobs();
    let gate = Gate::new();

    let blocker = {
        let gate = gate.clone();
        jobs.run_job(JobInfo::new("blocker", move |_| gate.hold()))
    };
    gate.wait_entered();

    let counter = Arc::new(AtomicU32::new(0));
    let handle = jobs.run_jobs(counting_jobs(&counter, 50));
    assert!(!jobs.is_complete(handle));
    assert_eq!(counter.load(Ordering::Relaxed), 0);

    gate.open();
    jobs.wait(handle);
    jobs.wait(blocker);
    assert_eq!(counter.load(Ordering::Relaxed), 50);
}

#[test]
fn test_invalid_and_stale_handles_are_complete() {
    let system = job_system(2);
    let jobs = system.jobs();

    jobs.wait(JobHandle::INVALID);
    jobs.wait(JobHandle::default());
    assert!(jobs.is_complete(JobHandle::default()));
    assert!(!JobHandle::default().is_valid());

    let handle = jobs.run_job(JobInfo::new("noop", |_| {}));
    assert!(handle.is_valid());
    jobs.wait(handle);
    // The counter slot has been recycled; the old handle stays complete.
    jobs.wait(handle);
    assert!(jobs.is_complete(handle));
}

#[test]
fn test_run_jobs_on_accumulates_into_live_handle() {
    let system = job_system(1);
    let jobs = system.jobs();
    let gate = Gate::new();
    let counter = Arc::new(AtomicU32::new(0));

    let mut handle = JobHandle::INVALID;
    {
        let gate = gate.clone();
        jobs.run_jobs_on(
            &mut handle,
            vec![JobInfo::new("blocker", move |_| gate.hold())],
        );
    }
    gate.wait_entered();
    let first = handle;

    jobs.run_jobs_on(&mut handle, counting_jobs(&counter, 10));
    assert_eq!(handle, first, "a live handle is extended, not replaced");

    gate.open();
    jobs.wait(handle);
    assert_eq!(counter.load(Ordering::Relaxed), 10);

    // Once complete, the same variable receives a fresh counter.
    jobs.run_jobs_on(&mut handle, counting_jobs(&counter, 5));
    assert_ne!(handle, first);
    jobs.wait(handle);
    assert_eq!(counter.load(Ordering::Relaxed), 15);
}

#[test]
fn test_panicking_job_still_releases_waiters() {
    let system = job_system(2);
    let jobs = system.jobs();
    let counter = Arc::new(AtomicU32::new(0));

    let mut batch = counting_jobs(&counter, 4);
    batch.push(JobInfo::new("explodes", |_| panic!("job failure")));
    let handle = jobs.run_jobs(batch);
    jobs.wait(handle);

    assert_eq!(counter.load(Ordering::Relaxed), 4);
}

// ============================================================================
// Fiber waits
// ============================================================================

fn spawn_nested(jobs: &Jobs, depth: u32, leaves: Arc<AtomicU32>) -> JobHandle {
    jobs.run_job(JobInfo::new("nested", move |ctx| {
        if depth == 0 {
            leaves.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let children: Vec<_> = (0..2)
            .map(|_| spawn_nested(ctx.jobs(), depth - 1, Arc::clone(&leaves)))
            .collect();
        for child in children {
            ctx.jobs().wait(child);
        }
    }))
}

#[rstest]
#[case::single_worker(1)]
#[case::four_workers(4)]
fn test_nested_waits_do_not_deadlock(#[case] workers: usize) {
    let system = job_system(workers);
    let leaves = Arc::new(AtomicU32::new(0));

    let root = spawn_nested(system.jobs(), 3, Arc::clone(&leaves));
    system.jobs().wait(root);

    assert_eq!(leaves.load(Ordering::Relaxed), 8);
}

#[test]
fn test_wait_on_own_sub_jobs_on_single_worker() {
    let system = job_system(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    let root = {
        let order = Arc::clone(&order);
        system.jobs().run_job(JobInfo::new("level0", move |ctx| {
            let inner_order = Arc::clone(&order);
            let level1 = ctx.jobs().run_job(JobInfo::new("level1", move |ctx| {
                let leaf_order = Arc::clone(&inner_order);
                let level2 = ctx.jobs().run_job(JobInfo::new("level2", move |ctx| {
                    let leaf = Arc::clone(&leaf_order);
                    let level3 = ctx.jobs().run_job(JobInfo::new("level3", move |_| {
                        leaf.lock().unwrap().push(3);
                    }));
                    ctx.jobs().wait(level3);
                    leaf_order.lock().unwrap().push(2);
                }));
                ctx.jobs().wait(level2);
                inner_order.lock().unwrap().push(1);
            }));
            ctx.jobs().wait(level1);
            order.lock().unwrap().push(0);
        }))
    };
    system.jobs().wait(root);

    assert_eq!(*order.lock().unwrap(), vec![3, 2, 1, 0]);
}

#[test]
fn test_yield_now_inside_job_lets_others_run() {
    let system = job_system(1);
    let jobs = system.jobs();
    let flag = Arc::new(AtomicBool::new(false));

    let spinner = {
        let flag = Arc::clone(&flag);
        jobs.run_job(JobInfo::new("spinner", move |ctx| {
            let setter_flag = Arc::clone(&flag);
            ctx.jobs()
                .run_job(JobInfo::new("setter", move |_| {
                    setter_flag.store(true, Ordering::Release)
                }));
            while !flag.load(Ordering::Acquire) {
                ctx.jobs().yield_now();
            }
        }))
    };
    jobs.wait(spinner);
    assert!(flag.load(Ordering::Acquire));
}

// ============================================================================
// Grouped jobs
// ============================================================================

#[rstest]
#[case::even_groups(64, 16)]
#[case::ragged_last_group(100, 32)]
#[case::single_group(10, 64)]
fn test_grouped_jobs_merge_on_last_job(#[case] job_count: u32, #[case] group_size: u32) {
    let system = job_system(4);
    let merged = Arc::new(AtomicU32::new(0));
    let firsts = Arc::new(AtomicU32::new(0));
    let seen = Arc::new(Mutex::new(vec![false; job_count as usize]));

    let handle = {
        let merged = Arc::clone(&merged);
        let firsts = Arc::clone(&firsts);
        let seen = Arc::clone(&seen);
        system.jobs().run_grouped::<Vec<u32>, _>(
            "cull",
            Priority::High,
            job_count,
            group_size,
            move |ctx, visible| {
                let group = ctx.group().expect("grouped job has group args");
                if group.is_first_job_in_group {
                    assert!(visible.is_empty());
                    firsts.fetch_add(1, Ordering::Relaxed);
                }
                assert_eq!(ctx.param(), group.group_id * group_size + group.group_index);
                seen.lock().unwrap()[ctx.param() as usize] = true;
                visible.push(ctx.param());
                if group.is_last_job_in_group {
                    merged.fetch_add(visible.len() as u32, Ordering::Relaxed);
                }
            },
        )
    };
    system.jobs().wait(handle);

    assert_eq!(merged.load(Ordering::Relaxed), job_count);
    assert_eq!(firsts.load(Ordering::Relaxed), job_count.div_ceil(group_size));
    assert!(seen.lock().unwrap().iter().all(|&s| s));
}

#[test]
fn test_grouped_jobs_with_zero_count_complete_immediately() {
    let system = job_system(1);
    let handle = system
        .jobs()
        .run_grouped::<(), _>("empty", Priority::Normal, 0, 8, |_, _| {
            panic!("no job should run");
        });
    assert!(system.jobs().is_complete(handle));
    system.jobs().wait(handle);
}

// ============================================================================
// Continuations
// ============================================================================

#[test]
fn test_run_job_after_waits_for_dependency() {
    let system = job_system(4);
    let jobs = system.jobs();
    let dependency_done = Arc::new(AtomicBool::new(false));
    let observed = Arc::new(AtomicBool::new(false));

    let dependency = {
        let done = Arc::clone(&dependency_done);
        jobs.run_job(JobInfo::new("producer", move |_| {
            std::thread::sleep(Duration::from_millis(20));
            done.store(true, Ordering::Release);
        }))
    };
    let follower = {
        let done = Arc::clone(&dependency_done);
        let observed = Arc::clone(&observed);
        jobs.run_job_after(
            dependency,
            JobInfo::new("consumer", move |_| {
                observed.store(done.load(Ordering::Acquire), Ordering::Release);
            }),
        )
    };
    assert!(follower.is_valid());
    jobs.wait(follower);

    assert!(observed.load(Ordering::Acquire));
}

#[test]
fn test_run_job_after_completed_dependency_runs_immediately() {
    let system = job_system(2);
    let jobs = system.jobs();
    let ran = Arc::new(AtomicBool::new(false));

    let follower = {
        let ran = Arc::clone(&ran);
        jobs.run_job_after(
            JobHandle::INVALID,
            JobInfo::new("orphan", move |_| ran.store(true, Ordering::Release)),
        )
    };
    jobs.wait(follower);
    assert!(ran.load(Ordering::Acquire));
}

#[test]
fn test_continuation_chain() {
    let system = job_system(2);
    let jobs = system.jobs();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut previous = JobHandle::INVALID;
    for step in 0..5 {
        let order = Arc::clone(&order);
        previous = jobs.run_job_after(
            previous,
            JobInfo::new("step", move |_| order.lock().unwrap().push(step)),
        );
    }
    jobs.wait(previous);

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

// ============================================================================
// Priorities and lifecycle
// ============================================================================

#[test]
fn test_higher_priorities_run_first() {
    let system = job_system(1);
    let jobs = system.jobs();
    let gate = Gate::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let blocker = {
        let gate = gate.clone();
        jobs.run_job(JobInfo::new("blocker", move |_| gate.hold()).with_priority(Priority::High))
    };
    gate.wait_entered();

    let mut handle = JobHandle::INVALID;
    for priority in [Priority::Low, Priority::Normal, Priority::High] {
        let batch = (0..3)
            .map(|_| {
                let order = Arc::clone(&order);
                JobInfo::new("ordered", move |_| order.lock().unwrap().push(priority))
                    .with_priority(priority)
            })
            .collect();
        jobs.run_jobs_on(&mut handle, batch);
    }

    gate.open();
    jobs.wait(blocker);
    jobs.wait(handle);

    let order = order.lock().unwrap();
    assert_eq!(order.len(), 9);
    assert!(order[..3].iter().all(|&p| p == Priority::High));
    assert!(order[3..6].iter().all(|&p| p == Priority::Normal));
    assert!(order[6..].iter().all(|&p| p == Priority::Low));
}

#[test]
fn test_job_context_reports_name_and_worker() {
    let system = job_system(2);
    let seen = Arc::new(Mutex::new(None));

    let handle = {
        let seen = Arc::clone(&seen);
        system.jobs().run_job(
            JobInfo::new("inspect", move |ctx| {
                *seen.lock().unwrap() = Some((
                    ctx.name().to_string(),
                    ctx.param(),
                    ctx.worker_index(),
                    ctx.group(),
                ));
            })
            .with_param(7),
        )
    };
    system.jobs().wait(handle);

    let (name, param, worker, group) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(name, "inspect");
    assert_eq!(param, 7);
    assert!(worker < 2);
    assert!(group.is_none());
}

#[test]
fn test_wait_all_and_drop_drain_outstanding_jobs() {
    let system = job_system(2);
    let counter = Arc::new(AtomicU32::new(0));

    system.jobs().run_jobs(counting_jobs(&counter, 200));
    system.jobs().wait_all();
    assert_eq!(counter.load(Ordering::Relaxed), 200);
    assert_eq!(system.jobs().pending_jobs(), 0);

    system.jobs().run_jobs(counting_jobs(&counter, 200));
    drop(system);
    assert_eq!(counter.load(Ordering::Relaxed), 400);
}

#[test]
fn test_small_stack_is_rejected_at_startup() {
    let config = JobSystemConfig::default()
        .with_worker_count(1)
        .with_fiber_count(1)
        .with_fiber_stack_size(MIN_FIBER_STACK_SIZE / 2);
    assert!(matches!(
        JobSystem::new(config),
        Err(JobError::StackTooSmall { .. })
    ));
}

#[test]
fn test_counter_pool_exhaustion_recovers() {
    common::init_logging();
    let config = JobSystemConfig::default()
        .with_worker_count(2)
        .with_fiber_count(8)
        .with_fiber_stack_size(common::TEST_STACK_SIZE)
        .with_counter_capacity(4);
    let system = JobSystem::new(config).unwrap();
    let counter = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..32)
        .map(|_| system.jobs().run_jobs(counting_jobs(&counter, 2)))
        .collect();
    for handle in handles {
        system.jobs().wait(handle);
    }
    assert_eq!(counter.load(Ordering::Relaxed), 64);
    system.jobs().wait_all();
    assert_eq!(system.jobs().live_counters(), 0);
}

#[test]
fn test_wait_all_inside_job_returns() {
    let system = job_system(1);
    let finished = Arc::new(AtomicBool::new(false));

    let done = Arc::clone(&finished);
    let handle = system.jobs().run_job(JobInfo::new("waits_on_everything", move |ctx| {
        ctx.jobs().wait_all();
        done.store(true, Ordering::Release);
    }));
    system.jobs().wait(handle);
    assert!(finished.load(Ordering::Acquire));
}

// ============================================================================
// Fatal conditions
// ============================================================================

/// Set in the child process spawned by [`test_fiber_starvation_aborts`].
const STARVATION_CHILD_ENV: &str = "FIBRA_STARVATION_CHILD";

#[test]
fn test_fiber_starvation_aborts() {
    if std::env::var_os(STARVATION_CHILD_ENV).is_some() {
        // One fiber: the root job parks it, leaving nothing to run its child.
        let config = JobSystemConfig::default()
            .with_worker_count(1)
            .with_fiber_count(1)
            .with_fiber_stack_size(common::TEST_STACK_SIZE);
        let system = JobSystem::new(config).unwrap();
        let root = system.jobs().run_job(JobInfo::new("root", |ctx| {
            let child = ctx.jobs().run_job(JobInfo::new("child", |_| {}));
            ctx.jobs().wait(child);
        }));
        system.jobs().wait(root);
        unreachable!("starved job system kept running");
    }

    let mut child = std::process::Command::new(std::env::current_exe().unwrap())
        .args(["test_fiber_starvation_aborts", "--exact", "--test-threads=1"])
        .env(STARVATION_CHILD_ENV, "1")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(30);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if std::time::Instant::now() > deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("starved job system hung instead of aborting");
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    assert!(!status.success());
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        // SIGABRT
        assert_eq!(status.signal(), Some(6));
    }
}
