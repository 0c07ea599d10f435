//! Service instances and their lifecycle.
//!
//! ```text
//!   created ──configure──► configured ──start──► started ──stop──► stopped
//!                                                  │  ▲
//!                                          update/swap
//! ```
//!
//! A [`ServiceHandle`] wraps user behavior (a [`Service`] implementation)
//! with the state machine, the data-pointer container, the standard signals
//! and slots, and the optional worker the slots run on.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};

use tracing::{debug, info, warn};

use crate::com::{
    connect_by_name, Blocker, Connections, Signal, Signals, Slot, Slots, TaskHandle, Worker,
};
use crate::data::{Access, HasData, MODIFIED_SIGNAL};
use crate::error::ServiceError;

use super::config::ServiceConfig;

pub const STARTED_SIGNAL: &str = "started";
pub const UPDATED_SIGNAL: &str = "updated";
pub const STOPPED_SIGNAL: &str = "stopped";
pub const INFO_NOTIFIED_SIGNAL: &str = "info_notified";
pub const SUCCESS_NOTIFIED_SIGNAL: &str = "success_notified";
pub const FAILURE_NOTIFIED_SIGNAL: &str = "failure_notified";

pub const START_SLOT: &str = "start";
pub const STOP_SLOT: &str = "stop";
pub const UPDATE_SLOT: &str = "update";
pub const SWAP_SLOT: &str = "swap";

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalStatus {
    Stopped,
    Starting,
    Started,
    Stopping,
}

impl GlobalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalStatus::Stopped => "stopped",
            GlobalStatus::Starting => "starting",
            GlobalStatus::Started => "started",
            GlobalStatus::Stopping => "stopping",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationStatus {
    Unconfigured,
    Configuring,
    Configured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatingStatus {
    NotUpdating,
    Updating,
}

#[derive(Debug, Clone, Copy)]
struct Status {
    global: GlobalStatus,
    configuration: ConfigurationStatus,
    updating: UpdatingStatus,
}

/// Lifecycle slot call that arrived while the service's own hook was
/// running on the same thread. Queued and run once the hook returns.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LifecycleCall {
    Start,
    Stop,
    Update,
    Swap(String),
}

#[derive(Debug, Default)]
struct DeferredCalls {
    queue: VecDeque<LifecycleCall>,
    draining: bool,
}

/// Clears the hook owner when the hook returns or unwinds.
struct HookGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for HookGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Kind of user notification emitted by a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Info,
    Success,
    Failure,
}

// =============================================================================
// Service trait
// =============================================================================

/// Connection made when the service starts: the signal `signal` of the
/// object bound to `key` is connected to the service slot `slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoConnection {
    pub key: String,
    pub signal: String,
    pub slot: String,
}

impl AutoConnection {
    pub fn new(key: &str, signal: &str, slot: &str) -> Self {
        Self {
            key: key.to_string(),
            signal: signal.to_string(),
            slot: slot.to_string(),
        }
    }
}

/// Behavior of a service.
///
/// Hooks are called by the owning [`ServiceHandle`] with the lifecycle state
/// already checked.
pub trait Service: Send {
    fn configuring(
        &mut self,
        _ctx: &ServiceContext<'_>,
        _config: &ServiceConfig,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    fn starting(&mut self, ctx: &ServiceContext<'_>) -> Result<(), ServiceError>;

    fn updating(&mut self, ctx: &ServiceContext<'_>) -> Result<(), ServiceError>;

    fn stopping(&mut self, _ctx: &ServiceContext<'_>) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Called when the object bound to `key` was replaced.
    fn swapping(&mut self, ctx: &ServiceContext<'_>, _key: &str) -> Result<(), ServiceError> {
        self.updating(ctx)
    }

    fn info(&self) -> String {
        String::new()
    }

    /// Connections made for auto-connected keys. Keys without an entry get
    /// `modified -> update`.
    fn auto_connections(&self) -> Vec<AutoConnection> {
        Vec::new()
    }
}

/// View on the owning handle passed to the hooks.
pub struct ServiceContext<'a> {
    handle: &'a ServiceHandle,
}

impl ServiceContext<'_> {
    pub fn id(&self) -> &str {
        &self.handle.id
    }

    pub fn type_name(&self) -> &str {
        &self.handle.type_name
    }

    pub fn data(&self) -> &HasData {
        &self.handle.data
    }

    pub fn signals(&self) -> &Signals {
        &self.handle.signals
    }

    pub fn notify(&self, kind: NotificationType, message: impl Into<String>) {
        self.handle.notify(kind, message);
    }

    /// Block every auto-connection until the blockers are dropped.
    pub fn block_auto_connections(&self) -> Vec<Blocker> {
        self.handle
            .auto_connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .block()
    }
}

// =============================================================================
// ServiceHandle
// =============================================================================

/// A service instance.
pub struct ServiceHandle {
    id: String,
    type_name: String,
    data: HasData,
    signals: Signals,
    slots: Slots,
    status: RwLock<Status>,
    config: RwLock<Option<ServiceConfig>>,
    behavior: Mutex<Box<dyn Service>>,
    hook_thread: Mutex<Option<ThreadId>>,
    deferred: Mutex<DeferredCalls>,
    worker: RwLock<Option<Arc<Worker>>>,
    auto_connections: Mutex<Connections>,
    started: Arc<Signal<()>>,
    updated: Arc<Signal<()>>,
    stopped: Arc<Signal<()>>,
    info_notified: Arc<Signal<String>>,
    success_notified: Arc<Signal<String>>,
    failure_notified: Arc<Signal<String>>,
}

fn standard_signal<A: Clone + Send + 'static>(signals: &Signals, key: &str) -> Arc<Signal<A>> {
    let signal = Signal::<A>::new(key);
    if let Err(e) = signals.insert(key, Arc::clone(&signal)) {
        warn!(signal = key, error = %e, "standard signal not registered");
    }
    signal
}

fn lifecycle_slot(slots: &Slots, key: &str, weak: Weak<ServiceHandle>, call: LifecycleCall) {
    let slot = Slot::new(key, move |()| {
        if let Some(service) = weak.upgrade() {
            service.dispatch(call.clone());
        }
    });
    if let Err(e) = slots.insert(key, slot) {
        warn!(slot = key, error = %e, "standard slot not registered");
    }
}

impl ServiceHandle {
    /// Build a service.
    ///
    /// # Arguments
    /// * `id` - Unique service id
    /// * `type_name` - Implementation name
    /// * `build` - Creates the behavior; receives the data container (to
    ///   declare pointers) and the signal holder (to declare extra signals)
    pub fn new<F>(id: impl Into<String>, type_name: impl Into<String>, build: F) -> Arc<Self>
    where
        F: FnOnce(&HasData, &Signals) -> Box<dyn Service>,
    {
        let id = id.into();
        let type_name = type_name.into();

        Arc::new_cyclic(|weak: &Weak<ServiceHandle>| {
            let data = HasData::new();
            let signals = Signals::new();
            let slots = Slots::new();

            let started = standard_signal::<()>(&signals, STARTED_SIGNAL);
            let updated = standard_signal::<()>(&signals, UPDATED_SIGNAL);
            let stopped = standard_signal::<()>(&signals, STOPPED_SIGNAL);
            let info_notified = standard_signal::<String>(&signals, INFO_NOTIFIED_SIGNAL);
            let success_notified = standard_signal::<String>(&signals, SUCCESS_NOTIFIED_SIGNAL);
            let failure_notified = standard_signal::<String>(&signals, FAILURE_NOTIFIED_SIGNAL);

            lifecycle_slot(&slots, START_SLOT, weak.clone(), LifecycleCall::Start);
            lifecycle_slot(&slots, STOP_SLOT, weak.clone(), LifecycleCall::Stop);
            lifecycle_slot(&slots, UPDATE_SLOT, weak.clone(), LifecycleCall::Update);

            let swap_weak = weak.clone();
            let swap = Slot::new(SWAP_SLOT, move |key: String| {
                if let Some(service) = swap_weak.upgrade() {
                    service.dispatch(LifecycleCall::Swap(key));
                }
            });
            if let Err(e) = slots.insert(SWAP_SLOT, swap) {
                warn!(error = %e, "swap slot not registered");
            }

            let behavior = build(&data, &signals);

            Self {
                id,
                type_name,
                data,
                signals,
                slots,
                status: RwLock::new(Status {
                    global: GlobalStatus::Stopped,
                    configuration: ConfigurationStatus::Unconfigured,
                    updating: UpdatingStatus::NotUpdating,
                }),
                config: RwLock::new(None),
                behavior: Mutex::new(behavior),
                hook_thread: Mutex::new(None),
                deferred: Mutex::new(DeferredCalls::default()),
                worker: RwLock::new(None),
                auto_connections: Mutex::new(Connections::new()),
                started,
                updated,
                stopped,
                info_notified,
                success_notified,
                failure_notified,
            }
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn data(&self) -> &HasData {
        &self.data
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    pub fn config(&self) -> Option<ServiceConfig> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn global_status(&self) -> GlobalStatus {
        self.status().global
    }

    pub fn configuration_status(&self) -> ConfigurationStatus {
        self.status().configuration
    }

    pub fn updating_status(&self) -> UpdatingStatus {
        self.status().updating
    }

    pub fn is_started(&self) -> bool {
        self.global_status() == GlobalStatus::Started
    }

    pub fn is_stopped(&self) -> bool {
        self.global_status() == GlobalStatus::Stopped
    }

    pub fn is_configured(&self) -> bool {
        self.configuration_status() == ConfigurationStatus::Configured
    }

    pub fn info(&self) -> String {
        self.behavior().info()
    }

    /// Bind every slot of the service to `worker`.
    pub fn set_worker(&self, worker: Option<Arc<Worker>>) {
        self.slots.set_worker(worker.clone());
        *self.worker.write().unwrap_or_else(PoisonError::into_inner) = worker;
    }

    pub fn worker(&self) -> Option<Arc<Worker>> {
        self.worker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn status(&self) -> Status {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_global(&self, global: GlobalStatus) {
        self.status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .global = global;
    }

    fn behavior(&self) -> MutexGuard<'_, Box<dyn Service>> {
        self.behavior.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self) -> ServiceContext<'_> {
        ServiceContext { handle: self }
    }

    /// Run a behavior hook, recording the calling thread as the hook owner.
    fn run_hook<R>(
        &self,
        hook: impl FnOnce(&mut Box<dyn Service>, &ServiceContext<'_>) -> R,
    ) -> R {
        let mut behavior = self.behavior();
        *self
            .hook_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        let _guard = HookGuard(&self.hook_thread);
        hook(&mut *behavior, &self.context())
    }

    fn in_own_hook(&self) -> bool {
        *self
            .hook_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == Some(thread::current().id())
    }

    // -------------------------------------------------------------------------
    // Slot dispatch
    // -------------------------------------------------------------------------

    /// Entry point of the lifecycle slots.
    ///
    /// A call made from inside one of this service's hooks on the same thread
    /// (a worker-less slot reached through `async_emit`) is queued and runs
    /// after the hook returns. Every other call runs now.
    fn dispatch(&self, call: LifecycleCall) {
        if self.in_own_hook() {
            debug!(service = %self.id, call = ?call, "lifecycle call deferred");
            self.deferred
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .queue
                .push_back(call);
            return;
        }
        self.perform(&call);
        self.drain_deferred();
    }

    fn perform(&self, call: &LifecycleCall) {
        let result = match call {
            LifecycleCall::Start => self.start_now(),
            LifecycleCall::Stop => self.stop_now(),
            LifecycleCall::Update => self.update_now(),
            LifecycleCall::Swap(key) => self.swap_now(key),
        };
        if let Err(e) = result {
            warn!(service = %self.id, call = ?call, error = %e, "slot call failed");
        }
    }

    /// Run queued calls in arrival order. Only one thread drains at a time;
    /// calls queued meanwhile are picked up by the draining thread.
    fn drain_deferred(&self) {
        {
            let mut calls = self.deferred.lock().unwrap_or_else(PoisonError::into_inner);
            if calls.draining || calls.queue.is_empty() {
                return;
            }
            calls.draining = true;
        }
        loop {
            let call = {
                let mut calls = self.deferred.lock().unwrap_or_else(PoisonError::into_inner);
                match calls.queue.pop_front() {
                    Some(call) => call,
                    None => {
                        calls.draining = false;
                        return;
                    }
                }
            };
            self.perform(&call);
        }
    }

    fn require(&self, operation: &'static str, expected: GlobalStatus) -> Result<(), ServiceError> {
        let global = self.global_status();
        if global != expected {
            return Err(ServiceError::InvalidState {
                service: self.id.clone(),
                operation,
                state: global.as_str(),
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Apply a configuration. Only allowed while stopped.
    pub fn configure(&self, config: ServiceConfig) -> Result<(), ServiceError> {
        self.require("configure", GlobalStatus::Stopped)?;
        self.status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .configuration = ConfigurationStatus::Configuring;

        let result = self
            .apply_bindings(&config)
            .and_then(|()| self.run_hook(|behavior, ctx| behavior.configuring(ctx, &config)));

        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(()) => {
                status.configuration = ConfigurationStatus::Configured;
                drop(status);
                *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
                debug!(service = %self.id, "configured");
                Ok(())
            }
            Err(e) => {
                status.configuration = ConfigurationStatus::Unconfigured;
                Err(e)
            }
        }
    }

    fn apply_bindings(&self, config: &ServiceConfig) -> Result<(), ServiceError> {
        for object in &config.objects {
            let declared = self.data.access(&object.key, object.index).ok_or_else(|| {
                ServiceError::Configuration(format!(
                    "service '{}' has no data key '{}'",
                    self.id, object.key
                ))
            })?;
            if declared != object.access {
                return Err(ServiceError::Configuration(format!(
                    "service '{}': key '{}' is declared as {declared}, configured as {}",
                    self.id, object.key, object.access
                )));
            }
            self.data.set_flags(
                &object.key,
                object.index,
                object.auto_connect || config.auto_connect,
                object.optional,
            )?;
            if object.access == Access::Out {
                self.data
                    .set_deferred_id(&object.key, object.index, object.uid.clone())?;
            }
        }
        Ok(())
    }

    /// Start the service.
    ///
    /// # Errors
    /// `InvalidState` unless configured and stopped, `MissingObject` when a
    /// required pointer is unbound, or the error of the `starting` hook.
    pub fn start(&self) -> Result<(), ServiceError> {
        let result = self.start_now();
        self.drain_deferred();
        result
    }

    fn start_now(&self) -> Result<(), ServiceError> {
        self.require("start", GlobalStatus::Stopped)?;
        if !self.is_configured() {
            return Err(ServiceError::InvalidState {
                service: self.id.clone(),
                operation: "start",
                state: "unconfigured",
            });
        }
        if let Some(key) = self.data.missing_required() {
            return Err(ServiceError::MissingObject {
                service: self.id.clone(),
                key,
            });
        }

        self.set_global(GlobalStatus::Starting);
        let result = self.run_hook(|behavior, ctx| behavior.starting(ctx));
        if let Err(e) = result {
            self.set_global(GlobalStatus::Stopped);
            return Err(e);
        }

        self.set_global(GlobalStatus::Started);
        self.connect_auto();
        info!(service = %self.id, kind = %self.type_name, "service started");
        self.started.async_emit(());
        Ok(())
    }

    /// Run the `updating` hook.
    ///
    /// Lifecycle slots of this service reached from inside the hook without a
    /// worker run after the hook returns, before this call returns.
    pub fn update(&self) -> Result<(), ServiceError> {
        let result = self.update_now();
        self.drain_deferred();
        result
    }

    fn update_now(&self) -> Result<(), ServiceError> {
        self.require("update", GlobalStatus::Started)?;
        self.status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .updating = UpdatingStatus::Updating;

        let result = self.run_hook(|behavior, ctx| behavior.updating(ctx));

        self.status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .updating = UpdatingStatus::NotUpdating;
        result?;
        self.updated.async_emit(());
        Ok(())
    }

    /// Stop the service. The service ends stopped even when the hook fails.
    pub fn stop(&self) -> Result<(), ServiceError> {
        let result = self.stop_now();
        self.drain_deferred();
        result
    }

    fn stop_now(&self) -> Result<(), ServiceError> {
        self.require("stop", GlobalStatus::Started)?;
        self.set_global(GlobalStatus::Stopping);
        self.auto_connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .disconnect();

        let result = self.run_hook(|behavior, ctx| behavior.stopping(ctx));
        self.set_global(GlobalStatus::Stopped);
        result?;

        info!(service = %self.id, "service stopped");
        self.stopped.async_emit(());
        Ok(())
    }

    /// Tell a started service that the object bound to `key` changed.
    pub fn swap(&self, key: &str) -> Result<(), ServiceError> {
        let result = self.swap_now(key);
        self.drain_deferred();
        result
    }

    fn swap_now(&self, key: &str) -> Result<(), ServiceError> {
        self.require("swap", GlobalStatus::Started)?;
        {
            let mut connections = self
                .auto_connections
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            connections.disconnect();
        }
        let result = self.run_hook(|behavior, ctx| behavior.swapping(ctx, key));
        self.connect_auto();
        result
    }

    /// `start` on the service worker, inline without worker.
    pub fn async_start(self: &Arc<Self>) -> TaskHandle<Result<(), ServiceError>> {
        self.run_async(ServiceHandle::start)
    }

    /// `update` on the service worker, inline without worker.
    pub fn async_update(self: &Arc<Self>) -> TaskHandle<Result<(), ServiceError>> {
        self.run_async(ServiceHandle::update)
    }

    /// `stop` on the service worker, inline without worker.
    pub fn async_stop(self: &Arc<Self>) -> TaskHandle<Result<(), ServiceError>> {
        self.run_async(ServiceHandle::stop)
    }

    fn run_async(
        self: &Arc<Self>,
        call: fn(&ServiceHandle) -> Result<(), ServiceError>,
    ) -> TaskHandle<Result<(), ServiceError>> {
        let Some(worker) = self.worker() else {
            return TaskHandle::ready(call(self));
        };
        let service = Arc::clone(self);
        worker
            .post(move || call(&service))
            .unwrap_or_else(|e| TaskHandle::ready(Err(e.into())))
    }

    /// Emit the notification signal matching `kind`.
    pub fn notify(&self, kind: NotificationType, message: impl Into<String>) {
        let message = message.into();
        let signal = match kind {
            NotificationType::Info => &self.info_notified,
            NotificationType::Success => &self.success_notified,
            NotificationType::Failure => &self.failure_notified,
        };
        debug!(service = %self.id, kind = ?kind, message = %message, "notify");
        signal.async_emit(message);
    }

    fn connect_auto(&self) {
        let declared = self.behavior().auto_connections();
        let mut connections = Connections::new();

        for binding in self.data.bindings() {
            if !binding.auto_connect || binding.access == Access::Out {
                continue;
            }
            let Some(object) = binding.object else {
                continue;
            };

            let mut pairs: Vec<(String, String)> = declared
                .iter()
                .filter(|c| c.key == binding.key)
                .map(|c| (c.signal.clone(), c.slot.clone()))
                .collect();
            if pairs.is_empty() {
                pairs.push((MODIFIED_SIGNAL.to_string(), UPDATE_SLOT.to_string()));
            }

            for (signal, slot) in pairs {
                match connect_by_name::<()>(object.signals(), &signal, &self.slots, &slot) {
                    Ok(connection) => connections.add(connection),
                    Err(e) => warn!(
                        service = %self.id,
                        key = %binding.key,
                        error = %e,
                        "auto-connection failed"
                    ),
                }
            }
        }

        *self
            .auto_connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = connections;
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("id", &self.id)
            .field("type", &self.type_name)
            .field("status", &self.global_status())
            .finish()
    }
}
