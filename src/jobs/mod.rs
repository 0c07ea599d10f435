//! Jobs: progress reporting and cooperative cancellation.
//!
//! - [`Job`]: runs a task once, inline or on a worker
//! - [`Observer`]: created running, driven by external code
//! - [`Aggregator`]: sums the progress of child jobs
//!
//! ```text
//!   Waiting ──run──► Running ──finish──► Finished
//!      │                │
//!    cancel           cancel
//!      ▼                ▼
//!   Canceled ◄─finish─ Canceling      (observers skip Canceling)
//! ```

mod aggregator;
mod job;
mod progress;

use std::sync::Arc;

use crate::error::JobError;

pub use self::aggregator::Aggregator;
pub use self::progress::{CancelHook, ProgressHook, StateHook};
pub use self::job::{Job, Observer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Waiting,
    Running,
    Canceling,
    Canceled,
    Finished,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Canceled | JobState::Finished)
    }
}

/// Common view on jobs, observers and aggregators.
pub trait JobLike: Send + Sync {
    fn name(&self) -> &str;
    fn state(&self) -> JobState;
    fn done_work_units(&self) -> u64;
    fn total_work_units(&self) -> u64;
    /// Start a waiting job; no-op otherwise.
    fn start(&self);
    fn cancel(&self);
    /// Force a terminal state.
    fn finish(&self);
    /// Block until terminal; returns at once for a job never started.
    fn wait_terminal(&self);
    fn error(&self) -> Option<JobError>;
    fn add_progress_hook(&self, hook: ProgressHook);
}

/// Completion handle of a started job.
pub struct JobFuture {
    job: Arc<dyn JobLike>,
}

impl JobFuture {
    pub(crate) fn new(job: Arc<dyn JobLike>) -> Self {
        Self { job }
    }

    /// Whether the job reached a terminal state.
    pub fn is_ready(&self) -> bool {
        self.job.state().is_terminal()
    }

    /// Block until the job (every child, for an aggregator) is terminal.
    ///
    /// # Returns
    /// The first stage error stored, if any.
    pub fn get(self) -> Result<(), JobError> {
        self.job.wait_terminal();
        match self.job.error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for JobFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobFuture")
            .field("job", &self.job.name())
            .field("state", &self.job.state())
            .finish()
    }
}
