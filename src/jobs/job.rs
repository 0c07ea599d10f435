//! Tasks and observers.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::com::Worker;
use crate::error::JobError;

use super::progress::{CancelHook, JobCore, ProgressHook, StateHook};
use super::{JobFuture, JobLike, JobState};

type Task = Box<dyn FnOnce(&Job) -> Result<(), JobError> + Send + 'static>;

/// Progress, logging and cancellation API shared by [`Job`] and [`Observer`].
macro_rules! job_api {
    ($ty:ty) => {
        impl $ty {
            pub fn name(&self) -> &str {
                self.core.name()
            }

            pub fn state(&self) -> JobState {
                self.core.state()
            }

            /// Set the number of done work units.
            pub fn done_work(&self, units: u64) {
                self.core.done_work(units);
            }

            pub fn add_done_work(&self, units: u64) {
                self.core.add_done_work(units);
            }

            pub fn set_total_work_units(&self, units: u64) {
                self.core.set_total_work_units(units);
            }

            pub fn done_work_units(&self) -> u64 {
                self.core.done_work_units()
            }

            pub fn total_work_units(&self) -> u64 {
                self.core.total_work_units()
            }

            /// Mark every work unit as done.
            pub fn done(&self) {
                self.core.done();
            }

            pub fn finish(&self) {
                self.core.finish();
            }

            pub fn cancel(&self) {
                self.core.cancel();
            }

            pub fn cancel_requested(&self) -> bool {
                self.core.cancel_requested()
            }

            /// Callable polled by long-running code to detect cancellation.
            pub fn cancel_requested_callback(&self) -> impl Fn() -> bool + Send + Sync + 'static {
                let token: CancellationToken = self.core.cancel_token();
                move || token.is_cancelled()
            }

            /// Callable reporting done work units from other code.
            pub fn progress_callback(&self) -> impl Fn(u64) + Send + Sync + 'static {
                let core: Weak<JobCore> = Arc::downgrade(&self.core);
                move |units| {
                    if let Some(core) = core.upgrade() {
                        core.done_work(units);
                    }
                }
            }

            pub fn log(&self, message: impl Into<String>) {
                self.core.log(message.into());
            }

            pub fn logs(&self) -> Vec<String> {
                self.core.logs()
            }

            /// Record a stage error; the first one is kept.
            pub fn fail(&self, error: JobError) {
                self.core.fail(error);
            }

            pub fn error(&self) -> Option<JobError> {
                self.core.error()
            }

            /// Block until finished or canceled.
            pub fn wait(&self) -> Result<(), JobError> {
                self.core.wait()
            }

            pub fn add_progress_hook<F>(&self, hook: F)
            where
                F: Fn(u64, u64) + Send + Sync + 'static,
            {
                self.core.add_progress_hook(Arc::new(hook));
            }

            pub fn add_state_hook<F>(&self, hook: F)
            where
                F: Fn(JobState) + Send + Sync + 'static,
            {
                self.core.add_state_hook(Arc::new(hook) as StateHook);
            }

            pub fn add_cancel_hook<F>(&self, hook: F)
            where
                F: Fn() + Send + Sync + 'static,
            {
                self.core.add_cancel_hook(Arc::new(hook) as CancelHook);
            }
        }
    };
}

// =============================================================================
// Job
// =============================================================================

/// A task run once, inline or on a worker.
pub struct Job {
    core: Arc<JobCore>,
    task: Mutex<Option<Task>>,
    worker: Option<Arc<Worker>>,
    me: Weak<Job>,
}

job_api!(Job);

impl Job {
    /// Create a waiting job running `task` inline when started.
    pub fn new<F>(name: impl Into<String>, task: F) -> Arc<Self>
    where
        F: FnOnce(&Job) -> Result<(), JobError> + Send + 'static,
    {
        Self::build(name.into(), None, Box::new(task))
    }

    /// Create a waiting job running `task` on `worker` when started.
    pub fn with_worker<F>(name: impl Into<String>, worker: Arc<Worker>, task: F) -> Arc<Self>
    where
        F: FnOnce(&Job) -> Result<(), JobError> + Send + 'static,
    {
        Self::build(name.into(), Some(worker), Box::new(task))
    }

    fn build(name: String, worker: Option<Arc<Worker>>, task: Task) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            core: JobCore::new(name, JobState::Waiting, false),
            task: Mutex::new(Some(task)),
            worker,
            me: me.clone(),
        })
    }

    /// Start the job.
    ///
    /// Without worker the task runs before this returns. Starting a job that
    /// is not waiting only returns its future.
    pub fn run(self: &Arc<Self>) -> JobFuture {
        self.launch();
        JobFuture::new(Arc::clone(self) as Arc<dyn JobLike>)
    }

    fn launch(&self) {
        if !self.core.start_running() {
            return;
        }
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match (&self.worker, self.me.upgrade()) {
            (Some(worker), Some(job)) => {
                if let Err(e) = worker.post(move || job.execute(task)) {
                    self.core.fail(JobError::Failed {
                        name: self.core.name().to_string(),
                        message: e.to_string(),
                    });
                    self.core.finish();
                }
            }
            _ => self.execute(task),
        }
    }

    fn execute(&self, task: Option<Task>) {
        if let Some(task) = task {
            match std::panic::catch_unwind(AssertUnwindSafe(|| task(self))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.core.fail(e),
                Err(_) => {
                    warn!(job = %self.core.name(), "job task panicked");
                    self.core.fail(JobError::Failed {
                        name: self.core.name().to_string(),
                        message: "task panicked".to_string(),
                    });
                }
            }
        }
        self.core.finish();
    }
}

impl JobLike for Job {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn state(&self) -> JobState {
        self.core.state()
    }

    fn done_work_units(&self) -> u64 {
        self.core.done_work_units()
    }

    fn total_work_units(&self) -> u64 {
        self.core.total_work_units()
    }

    fn start(&self) {
        self.launch();
    }

    fn cancel(&self) {
        self.core.cancel();
    }

    fn finish(&self) {
        self.core.finish();
    }

    fn wait_terminal(&self) {
        self.core.wait_terminal();
    }

    fn error(&self) -> Option<JobError> {
        self.core.error()
    }

    fn add_progress_hook(&self, hook: ProgressHook) {
        self.core.add_progress_hook(hook);
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.core.name())
            .field("state", &self.core.state())
            .finish()
    }
}

// =============================================================================
// Observer
// =============================================================================

/// A job driven by external code: created running, finished explicitly.
pub struct Observer {
    core: Arc<JobCore>,
}

job_api!(Observer);

impl Observer {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            core: JobCore::new(name.into(), JobState::Running, true),
        })
    }

    /// Create an observer with a known amount of work.
    pub fn with_total(name: impl Into<String>, total: u64) -> Arc<Self> {
        let observer = Self::new(name);
        observer.set_total_work_units(total);
        observer
    }
}

impl JobLike for Observer {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn state(&self) -> JobState {
        self.core.state()
    }

    fn done_work_units(&self) -> u64 {
        self.core.done_work_units()
    }

    fn total_work_units(&self) -> u64 {
        self.core.total_work_units()
    }

    fn start(&self) {}

    fn cancel(&self) {
        self.core.cancel();
    }

    fn finish(&self) {
        self.core.finish();
    }

    fn wait_terminal(&self) {
        self.core.wait_terminal();
    }

    fn error(&self) -> Option<JobError> {
        self.core.error()
    }

    fn add_progress_hook(&self, hook: ProgressHook) {
        self.core.add_progress_hook(hook);
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("name", &self.core.name())
            .field("state", &self.core.state())
            .finish()
    }
}
