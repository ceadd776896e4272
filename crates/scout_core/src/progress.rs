use std::fmt;

pub type TaskId = u64;

/// Fraction-complete of a running download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// Percent in `[0, 100]`.
    Percent(f64),
    /// Work is happening but the total is unknown.
    Indeterminate,
}

impl Progress {
    /// Clamps into `[0, 100]`; non-finite values become `Indeterminate`.
    pub fn percent(value: f64) -> Self {
        if value.is_finite() {
            Progress::Percent(value.clamp(0.0, 100.0))
        } else {
            Progress::Indeterminate
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Progress::Indeterminate)
    }

    pub fn as_percent(&self) -> Option<f64> {
        match self {
            Progress::Percent(value) => Some(*value),
            Progress::Indeterminate => None,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Percent(value) => write!(f, "{value:.2}%"),
            Progress::Indeterminate => write!(f, "Downloading..."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub task_id: TaskId,
    pub progress: Progress,
}

/// Everything a download reports to its observer. `Finished` is always the
/// last event of a task.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Progress(ProgressEvent),
    Finished {
        task_id: TaskId,
        result: Result<String, String>,
    },
}

impl DownloadEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            DownloadEvent::Progress(event) => event.task_id,
            DownloadEvent::Finished { task_id, .. } => *task_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadEvent::Finished { .. })
    }
}
