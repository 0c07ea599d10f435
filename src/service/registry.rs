//! Object-Service Registry (OSR).
//!
//! The registry records, for every registered service, the objects bound to
//! its data pointers:
//!
//! ```text
//!   service id ──► ServiceEntry
//!                    ├── inputs  : key ──► Weak<Object>
//!                    ├── inouts  : key ──► Weak<Object>
//!                    └── outputs : key ──► Arc<Object>   (kept alive here)
//! ```
//!
//! Outputs declared with a deferred id are announced through the `registered`
//! and `unregistered` signals, carrying `(object, deferred id)`. Emission
//! always happens after the registry lock has been released.
//!
//! The registry is an explicit value shared through `Arc`; there is no
//! process-wide instance.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::{debug, info, warn};

use crate::com::{Signal, Signals};
use crate::data::{Access, Object, OutputSink};
use crate::error::RegistryError;

use super::handle::ServiceHandle;

pub const REGISTERED_SIGNAL: &str = "registered";
pub const UNREGISTERED_SIGNAL: &str = "unregistered";

/// Payload of the registry signals: the object and its deferred id.
pub type RegisteredObject = (Arc<Object>, String);

// =============================================================================
// State
// =============================================================================

struct ServiceEntry {
    service: Arc<ServiceHandle>,
    inputs: BTreeMap<String, Weak<Object>>,
    inouts: BTreeMap<String, Weak<Object>>,
    outputs: BTreeMap<String, Arc<Object>>,
}

impl ServiceEntry {
    fn references(&self, object: &Arc<Object>) -> bool {
        let weak = Arc::downgrade(object);
        self.inputs.values().any(|w| Weak::ptr_eq(w, &weak))
            || self.inouts.values().any(|w| Weak::ptr_eq(w, &weak))
            || self.outputs.values().any(|o| Arc::ptr_eq(o, object))
    }
}

#[derive(Default)]
struct RegistryState {
    services: BTreeMap<String, ServiceEntry>,
}

// =============================================================================
// ObjectServiceRegistry
// =============================================================================

/// Maps services to the objects they use and produce.
pub struct ObjectServiceRegistry {
    state: RwLock<RegistryState>,
    signals: Signals,
    registered: Arc<Signal<RegisteredObject>>,
    unregistered: Arc<Signal<RegisteredObject>>,
    me: Weak<ObjectServiceRegistry>,
}

impl ObjectServiceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| {
            let signals = Signals::new();
            let registered = Signal::new(REGISTERED_SIGNAL);
            let unregistered = Signal::new(UNREGISTERED_SIGNAL);
            for (key, signal) in [
                (REGISTERED_SIGNAL, &registered),
                (UNREGISTERED_SIGNAL, &unregistered),
            ] {
                if let Err(e) = signals.insert(key, Arc::clone(signal)) {
                    warn!(signal = key, error = %e, "registry signal not registered");
                }
            }
            Self {
                state: RwLock::new(RegistryState::default()),
                signals,
                registered,
                unregistered,
                me: me.clone(),
            }
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// Emitted with `(object, deferred id)` when an output is registered.
    pub fn registered_signal(&self) -> &Arc<Signal<RegisteredObject>> {
        &self.registered
    }

    /// Emitted with `(object, deferred id)` before an output is unregistered.
    pub fn unregistered_signal(&self) -> &Arc<Signal<RegisteredObject>> {
        &self.unregistered
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a service with the objects currently bound to it, and route
    /// its output publications to this registry.
    pub fn register_service(&self, service: &Arc<ServiceHandle>) -> Result<(), RegistryError> {
        let mut entry = ServiceEntry {
            service: Arc::clone(service),
            inputs: BTreeMap::new(),
            inouts: BTreeMap::new(),
            outputs: BTreeMap::new(),
        };
        for binding in service.data().bindings() {
            let Some(object) = &binding.object else {
                continue;
            };
            let key = binding.flat_key();
            match binding.access {
                Access::In => {
                    entry.inputs.insert(key, Arc::downgrade(object));
                }
                Access::InOut => {
                    entry.inouts.insert(key, Arc::downgrade(object));
                }
                Access::Out => {
                    entry.outputs.insert(key, Arc::clone(object));
                }
            }
        }

        {
            let mut state = self.write();
            if state.services.contains_key(service.id()) {
                return Err(RegistryError::AlreadyRegistered(service.id().to_string()));
            }
            state.services.insert(service.id().to_string(), entry);
        }

        service
            .data()
            .set_output_sink(Some(Arc::new(RegistryOutputSink {
                registry: self.me.clone(),
                service: Arc::downgrade(service),
            })));
        debug!(service = %service.id(), "service registered");
        Ok(())
    }

    /// Record `object` as the input `key` of `service`.
    pub fn register_service_input(
        &self,
        service: &ServiceHandle,
        key: &str,
        object: &Arc<Object>,
    ) -> Result<(), RegistryError> {
        let mut state = self.write();
        let entry = state
            .services
            .get_mut(service.id())
            .ok_or_else(|| RegistryError::ServiceNotRegistered(service.id().to_string()))?;
        entry.inputs.insert(key.to_string(), Arc::downgrade(object));
        Ok(())
    }

    /// Record `object` as the inout `key` of `service`.
    pub fn register_service_inout(
        &self,
        service: &ServiceHandle,
        key: &str,
        object: &Arc<Object>,
    ) -> Result<(), RegistryError> {
        let mut state = self.write();
        let entry = state
            .services
            .get_mut(service.id())
            .ok_or_else(|| RegistryError::ServiceNotRegistered(service.id().to_string()))?;
        entry.inouts.insert(key.to_string(), Arc::downgrade(object));
        Ok(())
    }

    /// Record and keep alive `object` as the output `key` of `service`.
    ///
    /// When the service declared a deferred id for `key`, `registered` is
    /// emitted with `(object, id)`.
    pub fn register_service_output(
        &self,
        service: &ServiceHandle,
        key: &str,
        object: &Arc<Object>,
    ) -> Result<(), RegistryError> {
        let deferred_id = service.data().deferred_id_for(key);
        {
            let mut state = self.write();
            let entry = state
                .services
                .get_mut(service.id())
                .ok_or_else(|| RegistryError::ServiceNotRegistered(service.id().to_string()))?;
            entry.outputs.insert(key.to_string(), Arc::clone(object));
        }

        debug!(service = %service.id(), key, object = %object.id(), "output registered");
        if let Some(id) = deferred_id {
            self.registered.async_emit((Arc::clone(object), id));
        }
        Ok(())
    }

    /// Forget the output `key` of `service`.
    ///
    /// `unregistered` is emitted before the binding is erased.
    pub fn unregister_service_output(
        &self,
        service: &ServiceHandle,
        key: &str,
    ) -> Result<(), RegistryError> {
        let object = self
            .read()
            .services
            .get(service.id())
            .ok_or_else(|| RegistryError::ServiceNotRegistered(service.id().to_string()))?
            .outputs
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownBinding {
                service: service.id().to_string(),
                key: key.to_string(),
                access: Access::Out,
            })?;

        if let Some(id) = service.data().deferred_id_for(key) {
            self.unregistered.async_emit((object, id));
        }

        if let Some(entry) = self.write().services.get_mut(service.id()) {
            entry.outputs.remove(key);
        }
        debug!(service = %service.id(), key, "output unregistered");
        Ok(())
    }

    /// Forget one binding of `service`.
    pub fn unregister_binding(
        &self,
        service: &ServiceHandle,
        key: &str,
        access: Access,
    ) -> Result<(), RegistryError> {
        if access == Access::Out {
            return self.unregister_service_output(service, key);
        }

        let mut state = self.write();
        let entry = state
            .services
            .get_mut(service.id())
            .ok_or_else(|| RegistryError::ServiceNotRegistered(service.id().to_string()))?;
        let map = match access {
            Access::In => &mut entry.inputs,
            _ => &mut entry.inouts,
        };
        map.remove(key)
            .map(|_| ())
            .ok_or_else(|| RegistryError::UnknownBinding {
                service: service.id().to_string(),
                key: key.to_string(),
                access,
            })
    }

    /// Remove a stopped service and all its bindings.
    ///
    /// # Returns
    /// Keys of the outputs that are still referenced elsewhere. They are no
    /// longer maintained by the registry; each one is logged as a warning.
    ///
    /// # Errors
    /// `ServiceNotStopped` (nothing changes) or `ServiceNotRegistered`.
    pub fn unregister_service(&self, service: &ServiceHandle) -> Result<Vec<String>, RegistryError> {
        if !service.is_stopped() {
            return Err(RegistryError::ServiceNotStopped(service.id().to_string()));
        }

        let entry = self
            .write()
            .services
            .remove(service.id())
            .ok_or_else(|| RegistryError::ServiceNotRegistered(service.id().to_string()))?;
        service.data().set_output_sink(None);

        let mut dangling = Vec::new();
        for (key, object) in entry.outputs {
            // Neither this map entry nor the service's own pointers count.
            let own = 1 + service.data().strong_holds(&object);
            let holders = Arc::strong_count(&object).saturating_sub(own);
            if holders > 0 {
                warn!(
                    service = %service.id(),
                    key = %key,
                    object = %object.id(),
                    holders,
                    "output is still referenced after its service was unregistered; it is no longer maintained"
                );
                dangling.push(key);
            }
        }

        info!(service = %service.id(), "service unregistered");
        Ok(dangling)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn is_registered(&self, service_id: &str) -> bool {
        self.read().services.contains_key(service_id)
    }

    pub fn service(&self, service_id: &str) -> Option<Arc<ServiceHandle>> {
        self.read()
            .services
            .get(service_id)
            .map(|entry| Arc::clone(&entry.service))
    }

    pub fn services_of_type(&self, type_name: &str) -> Vec<Arc<ServiceHandle>> {
        self.read()
            .services
            .values()
            .filter(|entry| entry.service.type_name() == type_name)
            .map(|entry| Arc::clone(&entry.service))
            .collect()
    }

    /// Services with any binding to `object`.
    pub fn services_for_object(&self, object: &Arc<Object>) -> Vec<Arc<ServiceHandle>> {
        self.read()
            .services
            .values()
            .filter(|entry| entry.references(object))
            .map(|entry| Arc::clone(&entry.service))
            .collect()
    }

    pub fn input(&self, service_id: &str, key: &str) -> Option<Arc<Object>> {
        self.read()
            .services
            .get(service_id)
            .and_then(|entry| entry.inputs.get(key))
            .and_then(Weak::upgrade)
    }

    pub fn inout(&self, service_id: &str, key: &str) -> Option<Arc<Object>> {
        self.read()
            .services
            .get(service_id)
            .and_then(|entry| entry.inouts.get(key))
            .and_then(Weak::upgrade)
    }

    pub fn output(&self, service_id: &str, key: &str) -> Option<Arc<Object>> {
        self.read()
            .services
            .get(service_id)
            .and_then(|entry| entry.outputs.get(key))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read().services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().services.is_empty()
    }

    /// Human-readable dump of every service and its bindings.
    pub fn registry_information(&self) -> String {
        let state = self.read();
        let mut out = String::new();
        for (id, entry) in &state.services {
            let _ = writeln!(
                out,
                "Service {id} ({}) [{}]",
                entry.service.type_name(),
                entry.service.global_status().as_str()
            );
            for (key, weak) in &entry.inputs {
                let target = weak
                    .upgrade()
                    .map_or_else(|| "<expired>".to_string(), |o| o.id().to_string());
                let _ = writeln!(out, "    in    {key} -> {target}");
            }
            for (key, weak) in &entry.inouts {
                let target = weak
                    .upgrade()
                    .map_or_else(|| "<expired>".to_string(), |o| o.id().to_string());
                let _ = writeln!(out, "    inout {key} -> {target}");
            }
            for (key, object) in &entry.outputs {
                let _ = writeln!(out, "    out   {key} -> {}", object.id());
            }
        }
        out
    }
}

impl std::fmt::Debug for ObjectServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectServiceRegistry")
            .field("services", &self.len())
            .finish()
    }
}

// =============================================================================
// Output sink
// =============================================================================

/// Routes output publications of one service to the registry.
pub struct RegistryOutputSink {
    registry: Weak<ObjectServiceRegistry>,
    service: Weak<ServiceHandle>,
}

impl OutputSink for RegistryOutputSink {
    fn output_set(&self, key: &str, object: &Arc<Object>) {
        let (Some(registry), Some(service)) = (self.registry.upgrade(), self.service.upgrade())
        else {
            return;
        };
        if let Err(e) = registry.register_service_output(&service, key, object) {
            warn!(service = %service.id(), key, error = %e, "output not registered");
        }
    }

    fn output_reset(&self, key: &str) {
        let (Some(registry), Some(service)) = (self.registry.upgrade(), self.service.upgrade())
        else {
            return;
        };
        if let Err(e) = registry.unregister_service_output(&service, key) {
            debug!(service = %service.id(), key, error = %e, "no output to unregister");
        }
    }
}
