//! Stackful fibers that jobs run on.
//!
//! A fiber runs jobs one after another. When a job waits on an unfinished
//! counter the fiber suspends back into its worker's scheduling loop, and the
//! worker picks up other work on another fiber. Fibers never migrate: a
//! suspended fiber is always resumed by the worker thread that owns it.

use std::cell::Cell;

use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult, Yielder};

use super::counter::JobHandle;
use super::error::{JobError, JobResult};
use super::priority::Priority;
use super::queue::Job;
use super::system::Jobs;

/// Value the worker passes into a fiber when resuming it.
pub(crate) enum FiberInput {
    /// Run a freshly dequeued job.
    Run(Job),
    /// Continue after a wait or a yield.
    Resume,
    /// Leave the fiber body; only sent to idle fibers at shutdown.
    Exit,
}

/// Value a fiber hands back to its worker when it suspends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FiberYield {
    /// The job returned; the fiber is idle again.
    Finished,
    /// The job waits until the counter reaches zero.
    Wait(JobHandle),
    /// The job gives other work a chance to run.
    Yield,
}

type FiberYielder = Yielder<FiberInput, FiberYield>;

/// Scheduling state of a fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FiberState {
    Idle,
    Running,
    Waiting,
    Ready,
}

/// Identifies the fiber executing on the current thread.
#[derive(Clone, Copy)]
struct FiberScope {
    system: usize,
    worker: usize,
    yielder: *const FiberYielder,
}

thread_local! {
    static CURRENT_FIBER: Cell<Option<FiberScope>> = const { Cell::new(None) };
}

pub(crate) struct Fiber {
    coroutine: Coroutine<FiberInput, FiberYield, (), DefaultStack>,
    pub state: FiberState,
    pub priority: Priority,
}

impl Fiber {
    /// Allocate the fiber stack and bind the fiber to a worker.
    pub fn new(jobs: Jobs, worker: usize, stack_size: usize) -> JobResult<Self> {
        let stack = DefaultStack::new(stack_size).map_err(JobError::FiberCreation)?;
        let coroutine = Coroutine::with_stack(stack, move |yielder: &FiberYielder, input| {
            fiber_main(&jobs, worker, yielder, input)
        });
        Ok(Self {
            coroutine,
            state: FiberState::Idle,
            priority: Priority::Normal,
        })
    }

    /// Switch into the fiber until it suspends or returns.
    pub fn resume(&mut self, input: FiberInput) -> CoroutineResult<FiberYield, ()> {
        self.coroutine.resume(input)
    }

    /// True once the fiber has been resumed at least once.
    pub fn started(&self) -> bool {
        self.coroutine.started()
    }
}

fn fiber_main(jobs: &Jobs, worker: usize, yielder: &FiberYielder, mut input: FiberInput) {
    loop {
        match input {
            FiberInput::Run(job) => {
                CURRENT_FIBER.set(Some(FiberScope {
                    system: jobs.system_id(),
                    worker,
                    yielder: yielder as *const FiberYielder,
                }));
                jobs.execute(worker, job);
                CURRENT_FIBER.set(None);
                input = yielder.suspend(FiberYield::Finished);
            }
            FiberInput::Resume => {
                log::warn!("Idle fiber on worker {} resumed without a job", worker);
                input = yielder.suspend(FiberYield::Finished);
            }
            FiberInput::Exit => return,
        }
    }
}

/// Worker index of the fiber running on this thread, if it belongs to `system`.
pub(crate) fn current_worker(system: usize) -> Option<usize> {
    CURRENT_FIBER
        .get()
        .filter(|scope| scope.system == system)
        .map(|scope| scope.worker)
}

/// Suspend the fiber running on this thread.
///
/// Returns `None` without suspending when the calling code is not running
/// on a fiber of `system`.
pub(crate) fn suspend_current(system: usize, value: FiberYield) -> Option<FiberInput> {
    let scope = CURRENT_FIBER.get().filter(|scope| scope.system == system)?;
    // SAFETY: the scope is installed only while the fiber owning `yielder` is
    // executing on this thread, and the yielder outlives the fiber body.
    let yielder = unsafe { &*scope.yielder };

    CURRENT_FIBER.set(None);
    let input = yielder.suspend(value);
    CURRENT_FIBER.set(Some(scope));
    Some(input)
}
