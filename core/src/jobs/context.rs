use super::system::Jobs;

/// Position of a job inside a group submitted with
/// [`Jobs::run_grouped`](super::Jobs::run_grouped).
///
/// The first/last flags let a job set up or flush the value shared by its
/// group, for example accumulating culling results per group and merging
/// them into a global result on the last job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobGroupArgs {
    /// Index of the group.
    pub group_id: u32,
    /// Index of the job inside its group.
    pub group_index: u32,
    /// True for the first job of the group.
    pub is_first_job_in_group: bool,
    /// True for the last job of the group.
    pub is_last_job_in_group: bool,
}

/// Context handed to every running job.
#[derive(Clone, Copy)]
pub struct JobContext<'a> {
    jobs: &'a Jobs,
    name: &'a str,
    worker: usize,
    param: u32,
    group: Option<JobGroupArgs>,
}

impl<'a> JobContext<'a> {
    pub(crate) fn new(jobs: &'a Jobs, name: &'a str, worker: usize, param: u32) -> Self {
        Self {
            jobs,
            name,
            worker,
            param,
            group: None,
        }
    }

    pub(crate) fn for_group_job(&self, param: u32, group: JobGroupArgs) -> Self {
        Self {
            param,
            group: Some(group),
            ..*self
        }
    }

    /// Job system running this job, for spawning and waiting on sub-jobs.
    pub fn jobs(&self) -> &'a Jobs {
        self.jobs
    }

    /// Name the job was submitted with.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Index of the worker thread executing the job.
    pub fn worker_index(&self) -> usize {
        self.worker
    }

    /// Job index: the value given to [`JobInfo::with_param`](super::JobInfo::with_param),
    /// or the index inside the whole batch for grouped jobs.
    pub fn param(&self) -> u32 {
        self.param
    }

    /// Group position, for jobs submitted with `run_grouped`.
    pub fn group(&self) -> Option<JobGroupArgs> {
        self.group
    }
}

impl std::fmt::Debug for JobContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("name", &self.name)
            .field("worker", &self.worker)
            .field("param", &self.param)
            .field("group", &self.group)
            .finish()
    }
}
