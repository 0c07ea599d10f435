//! Composite jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tokio_util::sync::CancellationToken;

use crate::error::JobError;

use super::progress::ProgressHook;
use super::{JobFuture, JobLike, JobState};

/// A job made of child jobs.
///
/// Work units are the sums over the children. The aggregator is terminal
/// once every child is terminal.
pub struct Aggregator {
    name: String,
    children: RwLock<Vec<Arc<dyn JobLike>>>,
    started: AtomicBool,
    cancel: CancellationToken,
    progress_hooks: Mutex<Vec<ProgressHook>>,
    me: Weak<Aggregator>,
}

impl Aggregator {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            name: name.into(),
            children: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            progress_hooks: Mutex::new(Vec::new()),
            me: me.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a child.
    ///
    /// A child added to a running aggregator is started at once; one added
    /// to a canceled aggregator is canceled.
    pub fn add(&self, child: Arc<dyn JobLike>) {
        let me = self.me.clone();
        child.add_progress_hook(Arc::new(move |_: u64, _: u64| {
            if let Some(aggregator) = me.upgrade() {
                aggregator.progress_changed();
            }
        }));

        self.children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&child));

        if self.cancel.is_cancelled() {
            child.cancel();
        } else if self.started.load(Ordering::SeqCst) {
            child.start();
        }
    }

    pub fn children(&self) -> Vec<Arc<dyn JobLike>> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start every waiting child.
    pub fn run(self: &Arc<Self>) -> JobFuture {
        self.start_children();
        JobFuture::new(Arc::clone(self) as Arc<dyn JobLike>)
    }

    fn start_children(&self) {
        self.started.store(true, Ordering::SeqCst);
        for child in self.children() {
            child.start();
        }
    }

    pub fn state(&self) -> JobState {
        if !self.started.load(Ordering::SeqCst) && !self.cancel.is_cancelled() {
            return JobState::Waiting;
        }
        let all_terminal = self.children().iter().all(|c| c.state().is_terminal());
        match (all_terminal, self.cancel.is_cancelled()) {
            (true, true) => JobState::Canceled,
            (true, false) => JobState::Finished,
            (false, true) => JobState::Canceling,
            (false, false) => JobState::Running,
        }
    }

    pub fn done_work_units(&self) -> u64 {
        self.children().iter().map(|c| c.done_work_units()).sum()
    }

    pub fn total_work_units(&self) -> u64 {
        self.children().iter().map(|c| c.total_work_units()).sum()
    }

    /// Cancel every child.
    pub fn cancel(&self) {
        self.cancel.cancel();
        for child in self.children() {
            child.cancel();
        }
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Force every child to a terminal state.
    pub fn finish(&self) {
        for child in self.children() {
            child.finish();
        }
    }

    /// First error stored by a child.
    pub fn error(&self) -> Option<JobError> {
        self.children().iter().find_map(|c| c.error())
    }

    pub fn add_progress_hook<F>(&self, hook: F)
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.progress_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    fn progress_changed(&self) {
        let hooks = self
            .progress_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if hooks.is_empty() {
            return;
        }
        let (done, total) = (self.done_work_units(), self.total_work_units());
        for hook in hooks {
            hook(done, total);
        }
    }
}

impl JobLike for Aggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> JobState {
        Aggregator::state(self)
    }

    fn done_work_units(&self) -> u64 {
        Aggregator::done_work_units(self)
    }

    fn total_work_units(&self) -> u64 {
        Aggregator::total_work_units(self)
    }

    fn start(&self) {
        self.start_children();
    }

    fn cancel(&self) {
        Aggregator::cancel(self);
    }

    fn finish(&self) {
        Aggregator::finish(self);
    }

    fn wait_terminal(&self) {
        for child in self.children() {
            child.wait_terminal();
        }
    }

    fn error(&self) -> Option<JobError> {
        Aggregator::error(self)
    }

    fn add_progress_hook(&self, hook: ProgressHook) {
        self.progress_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("name", &self.name)
            .field("children", &self.children().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{Job, Observer};

    #[test]
    fn test_sums_over_children() {
        let aggregator = Aggregator::new("sum");
        let a = Observer::with_total("a", 10);
        let b = Observer::with_total("b", 30);
        aggregator.add(a.clone());
        aggregator.add(b.clone());

        a.done_work(5);
        b.done_work(15);
        assert_eq!(aggregator.done_work_units(), 20);
        assert_eq!(aggregator.total_work_units(), 40);
    }

    #[test]
    fn test_completes_when_every_child_finished() {
        let aggregator = Aggregator::new("three");
        let first = Observer::with_total("first", 10);
        let second = Observer::with_total("second", 10);
        let third = Job::new("third", |job| {
            job.set_total_work_units(10);
            job.done_work(10);
            Ok(())
        });
        aggregator.add(first.clone());
        aggregator.add(second.clone());
        aggregator.add(third.clone());

        let future = aggregator.run();
        assert_eq!(aggregator.state(), JobState::Running);

        first.done();
        first.finish();
        // Never reaches its total.
        second.done_work(3);
        second.finish();

        future.get().unwrap();
        assert_eq!(aggregator.state(), JobState::Finished);
        assert_eq!(aggregator.done_work_units(), 23);
        assert_eq!(aggregator.total_work_units(), 30);
    }

    #[test]
    fn test_cancel_propagates() {
        let aggregator = Aggregator::new("cancel");
        let observer = Observer::new("observer");
        let waiting = Job::new("waiting", |_| Ok(()));
        aggregator.add(observer.clone());
        aggregator.add(waiting.clone());

        aggregator.cancel();
        assert_eq!(observer.state(), JobState::Canceled);
        assert_eq!(waiting.state(), JobState::Canceled);
        assert_eq!(aggregator.state(), JobState::Canceled);

        let late = Observer::new("late");
        aggregator.add(late.clone());
        assert!(late.cancel_requested());
    }

    #[test]
    fn test_nested_aggregators() {
        let outer = Aggregator::new("outer");
        let inner = Aggregator::new("inner");
        let leaf = Observer::with_total("leaf", 8);
        inner.add(leaf.clone());
        outer.add(inner.clone());

        let future = outer.run();
        leaf.done();
        leaf.finish();
        future.get().unwrap();
        assert_eq!(outer.done_work_units(), 8);
        assert_eq!(outer.state(), JobState::Finished);
    }

    #[test]
    fn test_first_error_is_reported() {
        let aggregator = Aggregator::new("errors");
        aggregator.add(Job::new("ok", |_| Ok(())));
        aggregator.add(Job::new("bad", |job| {
            Err(JobError::Failed {
                name: job.name().to_string(),
                message: "stage failed".into(),
            })
        }));

        let err = aggregator.run().get().unwrap_err();
        assert!(matches!(err, JobError::Failed { name, .. } if name == "bad"));
    }

    #[test]
    fn test_aggregated_progress_hook() {
        let aggregator = Aggregator::new("hooked");
        let child = Observer::with_total("child", 5);
        aggregator.add(child.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::clone(&seen);
        aggregator.add_progress_hook(move |done, total| target.lock().unwrap().push((done, total)));

        child.done_work(2);
        assert_eq!(seen.lock().unwrap().last(), Some(&(2, 5)));
    }
}
