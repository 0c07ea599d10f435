//! State shared by tasks and observers.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::JobError;

use super::JobState;

pub type ProgressHook = Arc<dyn Fn(u64, u64) + Send + Sync>;
pub type StateHook = Arc<dyn Fn(JobState) + Send + Sync>;
pub type CancelHook = Arc<dyn Fn() + Send + Sync>;

struct CoreState {
    state: JobState,
    done: u64,
    total: u64,
    logs: Vec<String>,
    error: Option<JobError>,
    progress_hooks: Vec<ProgressHook>,
    state_hooks: Vec<StateHook>,
    cancel_hooks: Vec<CancelHook>,
}

/// Progress, state and cancellation of one job.
pub(crate) struct JobCore {
    name: String,
    inner: Mutex<CoreState>,
    terminal: Condvar,
    cancel: CancellationToken,
    /// Observers go straight to `Canceled`; tasks pass through `Canceling`.
    immediate_cancel: bool,
}

impl JobCore {
    pub(crate) fn new(name: String, state: JobState, immediate_cancel: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            inner: Mutex::new(CoreState {
                state,
                done: 0,
                total: 0,
                logs: Vec::new(),
                error: None,
                progress_hooks: Vec::new(),
                state_hooks: Vec::new(),
                cancel_hooks: Vec::new(),
            }),
            terminal: Condvar::new(),
            cancel: CancellationToken::new(),
            immediate_cancel,
        })
    }

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> JobState {
        self.lock().state
    }

    pub(crate) fn done_work_units(&self) -> u64 {
        self.lock().done
    }

    pub(crate) fn total_work_units(&self) -> u64 {
        self.lock().total
    }

    // -------------------------------------------------------------------------
    // Progress
    // -------------------------------------------------------------------------

    fn progress_changed(&self, guard: MutexGuard<'_, CoreState>) {
        let (done, total) = (guard.done, guard.total);
        let hooks = guard.progress_hooks.clone();
        drop(guard);
        for hook in hooks {
            hook(done, total);
        }
    }

    pub(crate) fn done_work(&self, units: u64) {
        let mut guard = self.lock();
        guard.done = units;
        self.progress_changed(guard);
    }

    pub(crate) fn add_done_work(&self, units: u64) {
        let mut guard = self.lock();
        guard.done = guard.done.saturating_add(units);
        self.progress_changed(guard);
    }

    pub(crate) fn set_total_work_units(&self, units: u64) {
        let mut guard = self.lock();
        guard.total = units;
        self.progress_changed(guard);
    }

    /// Mark all work as done.
    pub(crate) fn done(&self) {
        let mut guard = self.lock();
        guard.done = guard.total;
        self.progress_changed(guard);
    }

    pub(crate) fn log(&self, message: String) {
        debug!(job = %self.name, "{message}");
        self.lock().logs.push(message);
    }

    pub(crate) fn logs(&self) -> Vec<String> {
        self.lock().logs.clone()
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    fn state_changed(&self, guard: MutexGuard<'_, CoreState>) {
        let state = guard.state;
        let hooks = guard.state_hooks.clone();
        drop(guard);
        if state.is_terminal() {
            self.terminal.notify_all();
        }
        for hook in hooks {
            hook(state);
        }
    }

    /// `Waiting -> Running`. Returns whether the transition happened.
    pub(crate) fn start_running(&self) -> bool {
        let mut guard = self.lock();
        if guard.state != JobState::Waiting {
            return false;
        }
        guard.state = JobState::Running;
        self.state_changed(guard);
        true
    }

    /// Terminal transition: `Canceling -> Canceled`, otherwise `Finished`.
    /// No-op once terminal.
    pub(crate) fn finish(&self) {
        let mut guard = self.lock();
        guard.state = match guard.state {
            JobState::Canceling => JobState::Canceled,
            JobState::Waiting | JobState::Running => JobState::Finished,
            JobState::Canceled | JobState::Finished => return,
        };
        self.state_changed(guard);
    }

    pub(crate) fn cancel(&self) {
        let mut guard = self.lock();
        guard.state = match guard.state {
            JobState::Waiting => JobState::Canceled,
            JobState::Running if self.immediate_cancel => JobState::Canceled,
            JobState::Running => JobState::Canceling,
            JobState::Canceling | JobState::Canceled | JobState::Finished => return,
        };
        self.cancel.cancel();
        let cancel_hooks = guard.cancel_hooks.clone();
        self.state_changed(guard);
        for hook in cancel_hooks {
            hook();
        }
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Keep the first stage error.
    pub(crate) fn fail(&self, error: JobError) {
        let mut guard = self.lock();
        if guard.error.is_none() {
            guard.error = Some(error);
        }
    }

    pub(crate) fn error(&self) -> Option<JobError> {
        self.lock().error.clone()
    }

    /// Block until terminal.
    ///
    /// # Errors
    /// `NotStarted` for a waiting job, otherwise the stored stage error.
    pub(crate) fn wait(&self) -> Result<(), JobError> {
        let guard = self.lock();
        if guard.state == JobState::Waiting {
            return Err(JobError::NotStarted(self.name.clone()));
        }
        let guard = self
            .terminal
            .wait_while(guard, |s| !s.state.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        match &guard.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Block until terminal; returns at once for a waiting job.
    pub(crate) fn wait_terminal(&self) {
        let guard = self.lock();
        if guard.state == JobState::Waiting {
            return;
        }
        let _guard = self
            .terminal
            .wait_while(guard, |s| !s.state.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
    }

    // -------------------------------------------------------------------------
    // Hooks
    // -------------------------------------------------------------------------

    pub(crate) fn add_progress_hook(&self, hook: ProgressHook) {
        self.lock().progress_hooks.push(hook);
    }

    pub(crate) fn add_state_hook(&self, hook: StateHook) {
        self.lock().state_hooks.push(hook);
    }

    pub(crate) fn add_cancel_hook(&self, hook: CancelHook) {
        self.lock().cancel_hooks.push(hook);
    }
}
