//! Job storage and per-priority queues.

use std::borrow::Cow;
use std::collections::VecDeque;

use parking_lot::Mutex;

use super::context::JobContext;
use super::counter::JobHandle;
use super::priority::Priority;

/// Boxed job body.
pub(crate) type JobFn = Box<dyn FnOnce(&JobContext<'_>) + Send + 'static>;

/// A job that has been submitted and is bound to a completion counter.
pub(crate) struct Job {
    pub name: Cow<'static, str>,
    pub priority: Priority,
    pub param: u32,
    pub func: JobFn,
    pub counter: JobHandle,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("param", &self.param)
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

/// Jobs waiting for a fiber, one FIFO lane per priority.
///
/// The owning worker takes from the front of a lane; other workers steal
/// from the back so the two ends rarely contend on the same jobs.
#[derive(Debug, Default)]
pub(crate) struct JobQueue {
    lanes: Mutex<[VecDeque<Job>; Priority::COUNT]>,
}

impl JobQueue {
    pub fn push(&self, job: Job) {
        let lane = job.priority.lane();
        self.lanes.lock()[lane].push_back(job);
    }

    pub fn pop(&self, priority: Priority) -> Option<Job> {
        self.lanes.lock()[priority.lane()].pop_front()
    }

    pub fn steal(&self, priority: Priority) -> Option<Job> {
        self.lanes.lock()[priority.lane()].pop_back()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lanes.lock().iter().map(VecDeque::len).sum()
    }
}
