//! Named worker threads consuming a FIFO task queue.
//!
//! A worker owns one OS thread. Closures posted to the worker are executed in
//! posting order; each post returns a [`TaskHandle`] that can be waited on
//! synchronously or awaited.
//!
//! ```text
//!   post(f) ──► [ mpsc queue ] ──► worker thread: f() ──► oneshot ──► TaskHandle
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::thread::{JoinHandle, ThreadId};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::ComError;

type Task = Box<dyn FnOnce() + Send + 'static>;

// =============================================================================
// Worker
// =============================================================================

/// A named thread executing posted closures in FIFO order.
pub struct Worker {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl Worker {
    /// Spawn a new worker thread.
    ///
    /// # Arguments
    /// * `name` - Thread name, also used in log records
    ///
    /// # Returns
    /// The shared worker, or the OS error if the thread could not be spawned.
    pub fn new(name: impl Into<String>) -> std::io::Result<Arc<Self>> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();

        let thread_name = name.clone();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Some(task) = receiver.blocking_recv() {
                    if std::panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        warn!(worker = %thread_name, "task panicked");
                    }
                }
                debug!(worker = %thread_name, "worker queue closed");
            })?;

        debug!(worker = %name, "worker started");

        Ok(Arc::new(Self {
            name,
            thread_id: thread.thread().id(),
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
        }))
    }

    /// Worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the calling thread is this worker's thread.
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Enqueue a closure.
    ///
    /// # Returns
    /// A handle resolving to the closure's return value, or
    /// `ComError::WorkerStopped` if the worker no longer accepts tasks.
    pub fn post<F, R>(&self, f: F) -> Result<TaskHandle<R>, ComError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task: Task = Box::new(move || {
            let _ = tx.send(f());
        });

        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard
            .as_ref()
            .ok_or_else(|| ComError::WorkerStopped(self.name.clone()))?;
        sender
            .send(task)
            .map_err(|_| ComError::WorkerStopped(self.name.clone()))?;

        trace!(worker = %self.name, "task posted");
        Ok(TaskHandle { receiver: rx })
    }

    /// Close the queue, let pending tasks drain, then join the thread.
    ///
    /// Calling `stop` from the worker's own thread closes the queue without
    /// joining.
    pub fn stop(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        if self.is_current() {
            return;
        }

        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!(worker = %self.name, "worker thread panicked");
            }
        }
        debug!(worker = %self.name, "worker stopped");
    }

    /// Whether the worker still accepts tasks.
    pub fn is_running(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

// =============================================================================
// TaskHandle
// =============================================================================

/// Result of a posted task.
///
/// Use [`TaskHandle::wait`] from plain threads, or `.await` it from async code.
#[derive(Debug)]
pub struct TaskHandle<R> {
    receiver: oneshot::Receiver<R>,
}

impl<R> TaskHandle<R> {
    /// A handle that is already resolved.
    pub fn ready(value: R) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(value);
        Self { receiver: rx }
    }

    /// Block the current thread until the task completed.
    ///
    /// Must not be called from within an async runtime; `.await` the handle
    /// there instead.
    pub fn wait(self) -> Result<R, ComError> {
        self.receiver
            .blocking_recv()
            .map_err(|_| ComError::TaskDropped)
    }
}

impl<R> Future for TaskHandle<R> {
    type Output = Result<R, ComError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| ComError::TaskDropped))
    }
}
