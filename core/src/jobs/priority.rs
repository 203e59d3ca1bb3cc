/// Priority level for job execution.
///
/// Workers always serve the most urgent level that has work: fibers that
/// are ready to resume come first, then newly queued jobs, then the next
/// level down.
///
/// # Ordering
///
/// `High > Normal > Low`. Derives `Ord` so priorities can be compared
/// and sorted directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Background work that only runs when nothing else is queued.
    Low,
    /// Regular frame work.
    #[default]
    Normal,
    /// Work on the critical path of the current frame.
    High,
}

impl Priority {
    /// Number of priority levels.
    pub const COUNT: usize = 3;

    /// Priority levels from the most to the least urgent.
    pub const SERVING_ORDER: [Priority; Self::COUNT] =
        [Priority::High, Priority::Normal, Priority::Low];

    /// Queue lane used for this priority.
    pub(crate) fn lane(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}
