//! Shared helpers for job system integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fibra_core::jobs::{JobSystem, JobSystemConfig};

/// Stack size used by test fibers; large enough for nested waits.
pub const TEST_STACK_SIZE: usize = 128 * 1024;

/// Install a test logger once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Start a job system with `workers` threads and a fiber pool sized for
/// nesting tests.
pub fn job_system(workers: usize) -> JobSystem {
    init_logging();
    let config = JobSystemConfig::default()
        .with_worker_count(workers)
        .with_fiber_count((workers * 16).min(fibra_core::jobs::MAX_FIBER_COUNT))
        .with_fiber_stack_size(TEST_STACK_SIZE);
    JobSystem::new(config).expect("job system should start")
}

/// A flag a job can spin on to hold its worker busy.
#[derive(Clone, Default)]
pub struct Gate {
    open: Arc<AtomicBool>,
    entered: Arc<AtomicBool>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called from inside a job: signal arrival, then block the worker
    /// thread until the gate opens.
    pub fn hold(&self) {
        self.entered.store(true, Ordering::Release);
        while !self.open.load(Ordering::Acquire) {
            std::thread::yield_now();
        }
    }

    /// Wait until a job is inside [`Gate::hold`].
    pub fn wait_entered(&self) {
        while !self.entered.load(Ordering::Acquire) {
            std::thread::yield_now();
        }
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::Release);
    }
}
