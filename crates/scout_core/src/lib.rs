//! Scout core: pure data model for scan results and download tasks.
mod candidate;
mod progress;
mod task;

pub use candidate::{CandidateSet, MediaCandidate, SourceHint};
pub use progress::{DownloadEvent, Progress, ProgressEvent, TaskId};
pub use task::{DownloadTask, TaskState};
