//! Job system ownership, submission and waiting.

use std::any::Any;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;

use crossbeam_utils::CachePadded;
use crossbeam_utils::sync::{Parker, Unparker};
use parking_lot::{Condvar, Mutex};

use super::config::JobSystemConfig;
use super::context::{JobContext, JobGroupArgs};
use super::counter::{CounterPool, FiberWaiter, JobHandle, Release};
use super::error::{JobError, JobResult};
use super::fiber::{self, FiberYield};
use super::priority::Priority;
use super::queue::{Job, JobFn, JobQueue};
use super::worker::Worker;

static NEXT_SYSTEM_ID: AtomicUsize = AtomicUsize::new(1);

/// Description of a job to submit.
///
/// # Example
///
/// ```
/// use fibra_core::jobs::{JobInfo, Priority};
///
/// let info = JobInfo::new("cull", |ctx| {
///     let _batch = ctx.param();
/// })
/// .with_priority(Priority::High)
/// .with_param(3);
/// ```
pub struct JobInfo {
    name: Cow<'static, str>,
    priority: Priority,
    param: u32,
    func: JobFn,
}

impl JobInfo {
    /// Create a job description with normal priority and parameter 0.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: FnOnce(&JobContext<'_>) + Send + 'static,
    {
        Self {
            name: name.into(),
            priority: Priority::Normal,
            param: 0,
            func: Box::new(func),
        }
    }

    /// Set the priority the job is queued with.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the job index reported by [`JobContext::param`].
    pub fn with_param(mut self, param: u32) -> Self {
        self.param = param;
        self
    }

    /// Name of the job.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn into_job(self, counter: JobHandle) -> Job {
        Job {
            name: self.name,
            priority: self.priority,
            param: self.param,
            func: self.func,
            counter,
        }
    }
}

impl std::fmt::Debug for JobInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobInfo")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("param", &self.param)
            .finish_non_exhaustive()
    }
}

/// Per-worker state reachable from other threads.
struct WorkerSlot {
    /// Fibers whose wait completed, per priority lane.
    ready: Mutex<[VecDeque<usize>; Priority::COUNT]>,
    unparker: Unparker,
}

/// State shared by the owner, every `Jobs` handle and every worker.
pub(crate) struct Shared {
    id: usize,
    config: JobSystemConfig,
    counters: CounterPool,
    /// Jobs submitted from threads that are not workers.
    injector: JobQueue,
    /// Jobs submitted from inside jobs, one queue per worker.
    local_queues: Box<[JobQueue]>,
    workers: Box<[WorkerSlot]>,
    /// Jobs sitting in a queue.
    queued: CachePadded<AtomicUsize>,
    /// Jobs submitted and not yet finished, parked continuations included.
    outstanding: CachePadded<AtomicUsize>,
    /// Fibers parked on a counter.
    waiting_fibers: AtomicUsize,
    idle: Mutex<()>,
    idle_signal: Condvar,
    shutdown: AtomicBool,
}

impl Shared {
    fn new(config: JobSystemConfig, unparkers: Vec<Unparker>) -> Self {
        let workers = unparkers
            .into_iter()
            .map(|unparker| WorkerSlot {
                ready: Mutex::default(),
                unparker,
            })
            .collect();
        Self {
            id: NEXT_SYSTEM_ID.fetch_add(1, Ordering::Relaxed),
            counters: CounterPool::new(config.counter_capacity),
            injector: JobQueue::default(),
            local_queues: (0..config.worker_count)
                .map(|_| JobQueue::default())
                .collect(),
            workers,
            queued: CachePadded::new(AtomicUsize::new(0)),
            outstanding: CachePadded::new(AtomicUsize::new(0)),
            waiting_fibers: AtomicUsize::new(0),
            idle: Mutex::new(()),
            idle_signal: Condvar::new(),
            shutdown: AtomicBool::new(false),
            config,
        }
    }

    pub fn config(&self) -> &JobSystemConfig {
        &self.config
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    fn enqueue(&self, job: Job, local: Option<usize>) {
        self.queued.fetch_add(1, Ordering::SeqCst);
        match local {
            Some(worker) => self.local_queues[worker].push(job),
            None => self.injector.push(job),
        }
    }

    fn wake_workers(&self) {
        for worker in self.workers.iter() {
            worker.unparker.unpark();
        }
    }

    /// Take the next job of `priority` for `worker`: its own queue first,
    /// then the injector, then the other workers' queues.
    pub fn take_job(&self, worker: usize, priority: Priority) -> Option<Job> {
        if self.queued() == 0 {
            return None;
        }
        let count = self.local_queues.len();
        let job = self.local_queues[worker]
            .pop(priority)
            .or_else(|| self.injector.pop(priority))
            .or_else(|| {
                (1..count)
                    .map(|offset| (worker + offset) % count)
                    .find_map(|victim| self.local_queues[victim].steal(priority))
            })?;
        self.queued.fetch_sub(1, Ordering::SeqCst);
        Some(job)
    }

    pub fn pop_ready(&self, worker: usize, priority: Priority) -> Option<usize> {
        self.workers[worker].ready.lock()[priority.lane()].pop_front()
    }

    pub fn push_ready(&self, waiter: FiberWaiter) {
        let slot = &self.workers[waiter.worker];
        slot.ready.lock()[waiter.priority.lane()].push_back(waiter.fiber);
        slot.unparker.unpark();
    }

    /// Park a suspended fiber on `handle`.
    ///
    /// Returns `false` if the counter already completed.
    pub fn park_fiber(&self, handle: JobHandle, waiter: FiberWaiter) -> bool {
        self.counters
            .register_waiter(handle, waiter, &self.waiting_fibers)
    }

    /// Abort if every fiber is parked while jobs are still queued.
    ///
    /// No running job is left to release a counter, so the process can never
    /// make progress again.
    pub fn check_starvation(&self) {
        let waiting = self.waiting_fibers.load(Ordering::SeqCst);
        let queued = self.queued();
        if waiting >= self.config.fiber_count && queued > 0 {
            log::error!(
                "All {} fibers are waiting while {} jobs are queued; raise fiber_count (max {})",
                waiting,
                queued,
                super::MAX_FIBER_COUNT
            );
            std::process::abort();
        }
    }

    /// Record a finished job on its counter and release whatever it unblocks.
    fn complete(&self, counter: JobHandle, worker: usize) {
        if let Release::Completed {
            waiters,
            continuations,
        } = self.counters.release(counter)
        {
            for waiter in waiters {
                self.waiting_fibers.fetch_sub(1, Ordering::SeqCst);
                self.push_ready(waiter);
            }
            if !continuations.is_empty() {
                for job in continuations {
                    self.enqueue(job, Some(worker));
                }
                self.wake_workers();
            }
        }

        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _idle = self.idle.lock();
            self.idle_signal.notify_all();
        }
    }
}

/// Cheap, cloneable handle to a running [`JobSystem`].
///
/// `Jobs` is what jobs receive through [`JobContext::jobs`] and what frame
/// code passes around to submit work and wait for it.
#[derive(Clone)]
pub struct Jobs {
    shared: Arc<Shared>,
}

impl Jobs {
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn system_id(&self) -> usize {
        self.shared.id
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.shared.config.worker_count
    }

    /// Number of jobs queued and not yet picked up by a fiber.
    pub fn pending_jobs(&self) -> usize {
        self.shared.queued()
    }

    /// Number of completion counters currently live.
    pub fn live_counters(&self) -> usize {
        self.shared.counters.live_count()
    }

    /// Submit a single job.
    pub fn run_job(&self, info: JobInfo) -> JobHandle {
        self.run_jobs(vec![info])
    }

    /// Submit a batch of jobs sharing one counter.
    ///
    /// The counter holds the full batch size before the first job is queued,
    /// so waiting on the returned handle always covers every job.
    pub fn run_jobs(&self, infos: Vec<JobInfo>) -> JobHandle {
        let mut handle = JobHandle::INVALID;
        self.run_jobs_on(&mut handle, infos);
        handle
    }

    /// Submit a batch of jobs on an existing handle.
    ///
    /// If `handle` refers to a batch still in flight the new jobs are added
    /// to its counter. Otherwise a fresh counter is written into `handle`.
    pub fn run_jobs_on(&self, handle: &mut JobHandle, infos: Vec<JobInfo>) {
        if infos.is_empty() {
            return;
        }
        assert!(infos.len() < u32::MAX as usize, "job batch too large");
        let count = infos.len() as u32;
        if !self.shared.counters.add(*handle, count) {
            *handle = self.acquire_counter(count);
        }

        let local = fiber::current_worker(self.shared.id);
        self.shared
            .outstanding
            .fetch_add(infos.len(), Ordering::SeqCst);
        for info in infos {
            self.shared.enqueue(info.into_job(*handle), local);
        }
        self.shared.wake_workers();
    }

    /// Submit a job that becomes runnable once `dependency` completes.
    ///
    /// The job is chained as a continuation on the dependency's counter
    /// rather than polling it. The returned handle is live immediately.
    pub fn run_job_after(&self, dependency: JobHandle, info: JobInfo) -> JobHandle {
        let counter = self.acquire_counter(1);
        self.shared.outstanding.fetch_add(1, Ordering::SeqCst);
        let job = info.into_job(counter);
        if let Err(job) = self.shared.counters.add_continuation(dependency, job) {
            self.shared
                .enqueue(job, fiber::current_worker(self.shared.id));
            self.shared.wake_workers();
        }
        counter
    }

    /// Submit `job_count` jobs split into groups of `group_size`.
    ///
    /// The jobs of one group run in order on the same fiber and share one
    /// `G`, created with `G::default()` before the first job of the group.
    /// [`JobContext::group`] reports each job's position and
    /// [`JobContext::param`] its index in the whole batch.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use fibra_core::jobs::{JobSystem, JobSystemConfig, Priority};
    ///
    /// let system = JobSystem::new(JobSystemConfig::default()).unwrap();
    /// let visible = Arc::new(AtomicU32::new(0));
    /// let total = Arc::clone(&visible);
    /// let handle = system.jobs().run_grouped::<u32, _>("cull", Priority::High, 1000, 64, move |ctx, count| {
    ///     if ctx.param() % 2 == 0 {
    ///         *count += 1;
    ///     }
    ///     if ctx.group().is_some_and(|g| g.is_last_job_in_group) {
    ///         total.fetch_add(*count, Ordering::Relaxed);
    ///     }
    /// });
    /// system.jobs().wait(handle);
    /// assert_eq!(visible.load(Ordering::Relaxed), 500);
    /// ```
    pub fn run_grouped<G, F>(
        &self,
        name: impl Into<Cow<'static, str>>,
        priority: Priority,
        job_count: u32,
        group_size: u32,
        func: F,
    ) -> JobHandle
    where
        G: Default + 'static,
        F: Fn(&JobContext<'_>, &mut G) + Send + Sync + 'static,
    {
        let name = name.into();
        let group_size = group_size.max(1);
        let func = Arc::new(func);
        let infos = (0..job_count.div_ceil(group_size))
            .map(|group_id| {
                let func = Arc::clone(&func);
                let start = group_id * group_size;
                let end = start.saturating_add(group_size).min(job_count);
                JobInfo::new(name.clone(), move |ctx: &JobContext<'_>| {
                    let mut shared = G::default();
                    for job_index in start..end {
                        let args = JobGroupArgs {
                            group_id,
                            group_index: job_index - start,
                            is_first_job_in_group: job_index == start,
                            is_last_job_in_group: job_index + 1 == end,
                        };
                        func(&ctx.for_group_job(job_index, args), &mut shared);
                    }
                })
                .with_priority(priority)
                .with_param(group_id)
            })
            .collect();
        self.run_jobs(infos)
    }

    /// Check whether every job behind `handle` has finished.
    pub fn is_complete(&self, handle: JobHandle) -> bool {
        self.shared.counters.is_complete(handle)
    }

    /// Wait until every job behind `handle` has finished.
    ///
    /// Inside a job of this system the calling fiber is suspended and the
    /// worker thread keeps running other work. Anywhere else the calling
    /// thread blocks. Invalid and already completed handles return at once.
    pub fn wait(&self, handle: JobHandle) {
        while !self.shared.counters.is_complete(handle) {
            if fiber::suspend_current(self.shared.id, FiberYield::Wait(handle)).is_none() {
                crate::profile_scope!("jobs: wait_blocking");
                self.shared.counters.wait_blocking(handle);
                return;
            }
        }
    }

    /// Wait until no job is queued or running.
    ///
    /// Must be called from outside the job system; a job would wait on
    /// itself.
    pub fn wait_all(&self) {
        if fiber::current_worker(self.shared.id).is_some() {
            log::warn!("Jobs::wait_all called from inside a job; ignoring");
            return;
        }
        let mut idle = self.shared.idle.lock();
        while self.shared.outstanding.load(Ordering::SeqCst) > 0 {
            self.shared.idle_signal.wait(&mut idle);
        }
    }

    /// Let other work run.
    ///
    /// Inside a job the fiber is requeued behind the worker's other ready
    /// work; elsewhere the OS thread yields.
    pub fn yield_now(&self) {
        if fiber::suspend_current(self.shared.id, FiberYield::Yield).is_none() {
            std::thread::yield_now();
        }
    }

    fn acquire_counter(&self, count: u32) -> JobHandle {
        let mut warned = false;
        loop {
            if let Some(handle) = self.shared.counters.try_acquire(count) {
                return handle;
            }
            if !warned {
                log::warn!(
                    "All {} job counters are live; waiting for one to free up",
                    self.shared.config.counter_capacity
                );
                warned = true;
            }
            self.yield_now();
        }
    }

    /// Run a dequeued job on the current fiber and settle its counter.
    pub(crate) fn execute(&self, worker: usize, job: Job) {
        let Job {
            name,
            param,
            func,
            counter,
            ..
        } = job;
        {
            crate::profile_scope_dynamic!(&*name);
            let ctx = JobContext::new(self, &name, worker, param);
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| func(&ctx))) {
                log::error!("Job '{}' panicked: {}", name, panic_message(payload.as_ref()));
            }
        }
        self.shared.complete(counter, worker);
    }
}

impl std::fmt::Debug for Jobs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jobs")
            .field("id", &self.shared.id)
            .field("workers", &self.shared.config.worker_count)
            .field("pending", &self.pending_jobs())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Owner of the worker threads and fibers.
///
/// Dropping the system waits for all outstanding jobs, stops the workers and
/// releases the fibers. It must not be dropped from inside one of its own
/// jobs.
///
/// # Example
///
/// ```no_run
/// use fibra_core::jobs::{JobInfo, JobSystem, JobSystemConfig};
///
/// let system = JobSystem::new(JobSystemConfig::default().with_worker_count(2)).unwrap();
/// let jobs = system.jobs();
///
/// let handle = jobs.run_job(JobInfo::new("parent", |ctx| {
///     let child = ctx.jobs().run_job(JobInfo::new("child", |_| {}));
///     // Suspends the fiber; the worker keeps running other jobs.
///     ctx.jobs().wait(child);
/// }));
/// jobs.wait(handle);
/// ```
pub struct JobSystem {
    jobs: Jobs,
    threads: Vec<JoinHandle<()>>,
}

impl JobSystem {
    /// Start the worker threads and allocate every fiber.
    pub fn new(config: JobSystemConfig) -> JobResult<Self> {
        config.validate()?;

        let worker_count = config.worker_count;
        let parkers: Vec<Parker> = (0..worker_count).map(|_| Parker::new()).collect();
        let unparkers = parkers.iter().map(|p| p.unparker().clone()).collect();
        let jobs = Jobs {
            shared: Arc::new(Shared::new(config, unparkers)),
        };

        let mut system = Self {
            jobs: jobs.clone(),
            threads: Vec::with_capacity(worker_count),
        };

        let (ready_tx, ready_rx) = mpsc::channel();
        for (index, parker) in parkers.into_iter().enumerate() {
            let jobs = jobs.clone();
            let ready_tx = ready_tx.clone();
            let thread = std::thread::Builder::new()
                .name(format!("fibra: worker {index}"))
                .spawn(move || Worker::start(jobs, index, parker, ready_tx))
                .map_err(JobError::WorkerSpawn)?;
            system.threads.push(thread);
        }
        drop(ready_tx);

        for _ in 0..worker_count {
            match ready_rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(err),
                Err(_) => return Err(JobError::WorkerLost),
            }
        }

        let config = jobs.shared.config();
        log::info!(
            "Job system started: {} workers, {} fibers, {} KiB stacks",
            config.worker_count,
            config.fiber_count,
            config.fiber_stack_size / 1024
        );
        Ok(system)
    }

    /// Handle used to submit and wait on jobs.
    pub fn jobs(&self) -> &Jobs {
        &self.jobs
    }

    /// Wait for outstanding jobs and stop the workers.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.jobs.wait_all();

        let shared = &self.jobs.shared;
        shared.shutdown.store(true, Ordering::Release);
        shared.wake_workers();
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                log::error!("Job system worker panicked during shutdown");
            }
        }
        log::debug!("Job system stopped");
    }
}

impl std::fmt::Debug for JobSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSystem")
            .field("jobs", &self.jobs)
            .field("threads", &self.threads.len())
            .finish()
    }
}
