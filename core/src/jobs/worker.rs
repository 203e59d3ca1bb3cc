//! Worker thread scheduling loop.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use corosensei::CoroutineResult;
use crossbeam_utils::sync::Parker;

use super::counter::FiberWaiter;
use super::error::JobResult;
use super::fiber::{Fiber, FiberInput, FiberState, FiberYield};
use super::priority::Priority;
use super::system::{Jobs, Shared};

/// A worker thread and the fibers it owns.
pub(crate) struct Worker {
    index: usize,
    shared: Arc<Shared>,
    parker: Parker,
    fibers: Vec<Fiber>,
    /// Fibers free to take a new job.
    idle: Vec<usize>,
    /// Fibers that yielded; resumed only when nothing else is runnable.
    yielded: VecDeque<usize>,
}

impl Worker {
    /// Thread entry point: allocate the fibers, report readiness, then run
    /// the scheduling loop until shutdown.
    pub fn start(jobs: Jobs, index: usize, parker: Parker, ready: Sender<JobResult<()>>) {
        crate::set_thread_name!("fibra: worker");
        let shared = Arc::clone(jobs.shared());
        let config = shared.config();
        let fiber_count = config.fibers_for_worker(index);
        let stack_size = config.fiber_stack_size;

        let mut fibers = Vec::with_capacity(fiber_count);
        for _ in 0..fiber_count {
            match Fiber::new(jobs.clone(), index, stack_size) {
                Ok(fiber) => fibers.push(fiber),
                Err(err) => {
                    log::error!("Worker {} failed to create its fibers: {}", index, err);
                    let _ = ready.send(Err(err));
                    return;
                }
            }
        }
        let _ = ready.send(Ok(()));
        drop(ready);
        log::debug!("Worker {} started with {} fibers", index, fiber_count);

        let mut worker = Self {
            index,
            shared,
            parker,
            idle: (0..fiber_count).rev().collect(),
            fibers,
            yielded: VecDeque::new(),
        };
        worker.run();
        worker.release_fibers();
    }

    fn run(&mut self) {
        loop {
            if self.step() {
                continue;
            }
            if let Some(fiber) = self.yielded.pop_front() {
                self.resume(fiber, FiberInput::Resume);
                continue;
            }
            if self.shared.is_shutting_down() && self.idle.len() == self.fibers.len() {
                break;
            }
            self.parker.park();
        }
    }

    /// Run one unit of work. Returns `false` if nothing was runnable.
    ///
    /// Within a priority level, fibers that are ready to resume go before
    /// new jobs so suspended work drains and frees its fiber.
    fn step(&mut self) -> bool {
        for priority in Priority::SERVING_ORDER {
            if let Some(fiber) = self.shared.pop_ready(self.index, priority) {
                self.resume(fiber, FiberInput::Resume);
                return true;
            }
            let Some(&fiber) = self.idle.last() else {
                continue;
            };
            if let Some(job) = self.shared.take_job(self.index, priority) {
                self.idle.pop();
                self.fibers[fiber].priority = job.priority;
                self.resume(fiber, FiberInput::Run(job));
                return true;
            }
        }

        if self.idle.is_empty() && self.shared.queued() > 0 {
            self.shared.check_starvation();
        }
        false
    }

    fn resume(&mut self, id: usize, input: FiberInput) {
        let fiber = &mut self.fibers[id];
        fiber.state = FiberState::Running;
        match fiber.resume(input) {
            CoroutineResult::Yield(FiberYield::Finished) => {
                fiber.state = FiberState::Idle;
                self.idle.push(id);
            }
            CoroutineResult::Yield(FiberYield::Wait(handle)) => {
                let waiter = FiberWaiter {
                    worker: self.index,
                    fiber: id,
                    priority: fiber.priority,
                };
                if self.shared.park_fiber(handle, waiter) {
                    fiber.state = FiberState::Waiting;
                } else {
                    fiber.state = FiberState::Ready;
                    self.shared.push_ready(waiter);
                }
            }
            CoroutineResult::Yield(FiberYield::Yield) => {
                fiber.state = FiberState::Ready;
                self.yielded.push_back(id);
            }
            CoroutineResult::Return(()) => {
                log::warn!("Fiber {} of worker {} returned while in use", id, self.index);
            }
        }
    }

    /// Let every idle fiber leave its body so its stack unwinds normally.
    fn release_fibers(&mut self) {
        for (id, mut fiber) in self.fibers.drain(..).enumerate() {
            if fiber.state != FiberState::Idle {
                log::warn!(
                    "Fiber {} of worker {} is {:?} at shutdown; leaking its stack",
                    id,
                    self.index,
                    fiber.state
                );
                std::mem::forget(fiber);
                continue;
            }
            if fiber.started() {
                if let CoroutineResult::Yield(_) = fiber.resume(FiberInput::Exit) {
                    std::mem::forget(fiber);
                }
            }
        }
        log::debug!("Worker {} stopped", self.index);
    }
}
