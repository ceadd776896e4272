use std::path::{Path, PathBuf};

use crate::{Progress, ProgressEvent, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

/// One download request and its observable progress.
///
/// Invariant: the numeric percent never goes down while the task runs.
/// Readings below the high-water mark are dropped rather than reported.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    id: TaskId,
    source_url: String,
    destination: PathBuf,
    state: TaskState,
    progress: Progress,
    high_water: f64,
    last_emitted: Option<Progress>,
}

impl DownloadTask {
    pub fn new(id: TaskId, source_url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            id,
            source_url: source_url.into(),
            destination: destination.into(),
            state: TaskState::Pending,
            progress: Progress::Percent(0.0),
            high_water: 0.0,
            last_emitted: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// `Pending -> Running`. Returns `false` for any other starting state.
    pub fn start(&mut self) -> bool {
        if self.state != TaskState::Pending {
            return false;
        }
        self.state = TaskState::Running;
        true
    }

    /// Applies a progress reading and returns the event to publish, if any.
    pub fn record(&mut self, progress: Progress) -> Option<ProgressEvent> {
        if self.state != TaskState::Running {
            return None;
        }
        match progress {
            Progress::Percent(value) => {
                if value < self.high_water {
                    return None;
                }
                self.high_water = value;
            }
            Progress::Indeterminate => {}
        }
        self.progress = progress;
        self.last_emitted = Some(progress);
        Some(ProgressEvent {
            task_id: self.id,
            progress,
        })
    }

    /// `Running -> Succeeded`. Returns the closing 100% event when the last
    /// published reading was anything else.
    pub fn succeed(&mut self) -> Option<ProgressEvent> {
        if self.state != TaskState::Running {
            return None;
        }
        let full = Progress::Percent(100.0);
        let closing = if self.last_emitted == Some(full) {
            None
        } else {
            self.last_emitted = Some(full);
            Some(ProgressEvent {
                task_id: self.id,
                progress: full,
            })
        };
        self.high_water = 100.0;
        self.progress = full;
        self.state = TaskState::Succeeded;
        closing
    }

    /// Moves any non-terminal task to `Failed`; visible progress resets to 0.
    pub fn fail(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = TaskState::Failed;
        self.progress = Progress::Percent(0.0);
        true
    }

    /// Records where the file actually landed. Ignored once terminal.
    pub fn set_destination(&mut self, destination: impl Into<PathBuf>) {
        if !self.state.is_terminal() {
            self.destination = destination.into();
        }
    }
}
