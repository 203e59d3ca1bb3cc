//! Completion counters and job handles.
//!
//! Every submitted batch is bound to a counter slot holding the number of
//! jobs still outstanding. Slots are pooled and generational: when a counter
//! reaches zero its generation is bumped and the slot goes back to the free
//! list, so any copy of the old [`JobHandle`] reads as complete from then on.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

use super::priority::Priority;
use super::queue::Job;

/// Opaque reference to an in-flight batch of jobs.
///
/// `JobHandle` is `Copy` and cheap to pass around. The default handle is
/// invalid and always reads as complete, as does a handle whose batch has
/// already finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle {
    index: u32,
    generation: u32,
}

impl JobHandle {
    /// A handle that refers to no batch.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: 0,
    };

    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Check whether this handle was produced by a submission.
    pub fn is_valid(self) -> bool {
        self.index != u32::MAX
    }

    fn index(self) -> usize {
        self.index as usize
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// A fiber suspended until a counter reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FiberWaiter {
    pub worker: usize,
    pub fiber: usize,
    pub priority: Priority,
}

/// What a counter decrement released.
#[derive(Debug)]
pub(crate) enum Release {
    /// The counter is still above zero.
    Pending,
    /// The counter reached zero.
    Completed {
        waiters: Vec<FiberWaiter>,
        continuations: Vec<Job>,
    },
}

#[derive(Debug, Default)]
struct CounterState {
    generation: u32,
    value: u32,
    waiters: Vec<FiberWaiter>,
    continuations: Vec<Job>,
}

impl CounterState {
    fn is_live(&self, handle: JobHandle) -> bool {
        self.generation == handle.generation && self.value > 0
    }
}

#[derive(Debug, Default)]
struct CounterSlot {
    state: Mutex<CounterState>,
    released: Condvar,
}

/// Fixed-capacity pool of completion counters.
#[derive(Debug)]
pub(crate) struct CounterPool {
    slots: Box<[CounterSlot]>,
    free: Mutex<Vec<u32>>,
}

impl CounterPool {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| CounterSlot::default()).collect();
        // Reversed so the lowest indices are handed out first.
        let free = (0..capacity as u32).rev().collect();
        Self {
            slots,
            free: Mutex::new(free),
        }
    }

    fn slot(&self, handle: JobHandle) -> Option<&CounterSlot> {
        if handle.is_valid() {
            self.slots.get(handle.index())
        } else {
            None
        }
    }

    /// Take a free counter and set it to `count`.
    ///
    /// Returns `None` when every counter is live.
    pub fn try_acquire(&self, count: u32) -> Option<JobHandle> {
        debug_assert!(count > 0);
        let index = self.free.lock().pop()?;
        let mut state = self.slots[index as usize].state.lock();
        debug_assert_eq!(state.value, 0, "free counter slot still has a value");
        state.value = count;
        Some(JobHandle::new(index, state.generation))
    }

    /// Add `count` jobs to a live counter.
    ///
    /// Returns `false` if the handle no longer refers to a live counter.
    pub fn add(&self, handle: JobHandle, count: u32) -> bool {
        let Some(slot) = self.slot(handle) else {
            return false;
        };
        let mut state = slot.state.lock();
        if !state.is_live(handle) {
            return false;
        }
        state.value += count;
        true
    }

    /// Record one finished job.
    pub fn release(&self, handle: JobHandle) -> Release {
        let Some(slot) = self.slot(handle) else {
            return Release::Pending;
        };
        let mut state = slot.state.lock();
        debug_assert!(state.is_live(handle), "released a dead counter: {handle:?}");
        if !state.is_live(handle) {
            log::warn!("Job counter {:?} released more often than submitted", handle);
            return Release::Pending;
        }

        state.value -= 1;
        if state.value > 0 {
            return Release::Pending;
        }

        state.generation = state.generation.wrapping_add(1);
        let waiters = std::mem::take(&mut state.waiters);
        let continuations = std::mem::take(&mut state.continuations);
        drop(state);

        slot.released.notify_all();
        self.free.lock().push(handle.index);
        Release::Completed {
            waiters,
            continuations,
        }
    }

    /// Check whether the batch behind `handle` has finished.
    pub fn is_complete(&self, handle: JobHandle) -> bool {
        self.slot(handle)
            .map_or(true, |slot| !slot.state.lock().is_live(handle))
    }

    /// Block the calling OS thread until the counter reaches zero.
    pub fn wait_blocking(&self, handle: JobHandle) {
        let Some(slot) = self.slot(handle) else {
            return;
        };
        let mut state = slot.state.lock();
        while state.is_live(handle) {
            slot.released.wait(&mut state);
        }
    }

    /// Park a fiber on a live counter.
    ///
    /// `parked` is incremented while the counter is locked, so it can never
    /// be observed after the matching wake-up. Returns `false` if the counter
    /// already reached zero, in which case the fiber must be resumed by the
    /// caller.
    pub fn register_waiter(
        &self,
        handle: JobHandle,
        waiter: FiberWaiter,
        parked: &AtomicUsize,
    ) -> bool {
        let Some(slot) = self.slot(handle) else {
            return false;
        };
        let mut state = slot.state.lock();
        if !state.is_live(handle) {
            return false;
        }
        parked.fetch_add(1, Ordering::SeqCst);
        state.waiters.push(waiter);
        true
    }

    /// Queue `job` to be scheduled when the counter reaches zero.
    ///
    /// Hands the job back if the counter is already complete.
    pub fn add_continuation(&self, handle: JobHandle, job: Job) -> Result<(), Job> {
        let Some(slot) = self.slot(handle) else {
            return Err(job);
        };
        let mut state = slot.state.lock();
        if !state.is_live(handle) {
            return Err(job);
        }
        state.continuations.push(job);
        Ok(())
    }

    /// Number of counters currently live.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.lock().len()
    }
}
