//! Slots: named callables optionally bound to a worker.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ComError;

use super::worker::{TaskHandle, Worker};

type SlotFn<A> = Box<dyn Fn(A) + Send + Sync + 'static>;

/// A named callable receiving `A`.
///
/// `run` executes on the caller thread; `async_run` schedules the call on the
/// bound worker.
pub struct Slot<A> {
    name: String,
    func: SlotFn<A>,
    worker: RwLock<Option<Arc<Worker>>>,
}

impl<A: Send + 'static> Slot<A> {
    /// Create an unbound slot.
    pub fn new<F>(name: impl Into<String>, func: F) -> Arc<Self>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.into(),
            func: Box::new(func),
            worker: RwLock::new(None),
        })
    }

    /// Create a slot bound to `worker`.
    pub fn with_worker<F>(name: impl Into<String>, worker: Arc<Worker>, func: F) -> Arc<Self>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let slot = Self::new(name, func);
        slot.set_worker(Some(worker));
        slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind or unbind the worker used by `async_run`.
    pub fn set_worker(&self, worker: Option<Arc<Worker>>) {
        *self.worker.write().unwrap_or_else(PoisonError::into_inner) = worker;
    }

    pub fn worker(&self) -> Option<Arc<Worker>> {
        self.worker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Call the slot synchronously.
    pub fn run(&self, args: A) {
        (self.func)(args)
    }

    /// Schedule one call on the bound worker and return immediately.
    pub fn async_run(self: &Arc<Self>, args: A) -> Result<TaskHandle<()>, ComError> {
        let worker = self
            .worker()
            .ok_or_else(|| ComError::NoWorker(self.name.clone()))?;
        let slot = Arc::clone(self);
        worker.post(move || slot.run(args))
    }
}

impl<A> std::fmt::Debug for Slot<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot").field("name", &self.name).finish()
    }
}

/// Type-erased view used by holders to rebind every slot at once.
pub(crate) trait SlotBase: Send + Sync {
    fn bind_worker(&self, worker: Option<Arc<Worker>>);
}

impl<A: Send + 'static> SlotBase for Slot<A> {
    fn bind_worker(&self, worker: Option<Arc<Worker>>) {
        self.set_worker(worker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_run_is_synchronous() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let slot = Slot::new("add", move |n: usize| {
            counter.fetch_add(n, Ordering::SeqCst);
        });

        slot.run(3);
        slot.run(4);
        assert_eq!(hits.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_async_run_without_worker_fails() {
        let slot = Slot::new("orphan", |_: ()| {});
        assert!(matches!(slot.async_run(()), Err(ComError::NoWorker(name)) if name == "orphan"));
    }

    #[test]
    fn test_async_run_uses_worker_thread() {
        let worker = Worker::new("slot-worker").unwrap();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let target = Arc::clone(&seen);
        let slot = Slot::with_worker("where", worker, move |_: ()| {
            *target.lock().unwrap() = std::thread::current().name().map(str::to_string);
        });

        slot.async_run(()).unwrap().wait().unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("slot-worker"));
    }
}
