//! Application configuration manager.
//!
//! Builds a set of objects and services from an [`AppConfig`], binds them
//! through the registry and drives their lifecycle. Services depending on a
//! deferred object (an output of another service) are started once that
//! object is published, and stopped when it is withdrawn.
//!
//! ```text
//!   AppConfig ──create──► objects + services (configured, registered)
//!                 start──► services with every required object
//!   registry "registered"(obj, id)   ──► bind id, start waiting services
//!   registry "unregistered"(obj, id) ──► stop dependants, unbind id
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::com::{connect_by_name, Connections, Signals, Slot, Worker};
use crate::data::{
    group_key, Access, Boolean, Composite, Float, Image, Integer, Matrix4, Object, Series,
    SeriesSet, StringValue, Vector,
};
use crate::error::ServiceError;

use super::config::{ObjectServiceConfig, ServiceConfig};
use super::factory::ServiceFactory;
use super::handle::ServiceHandle;
use super::registry::{ObjectServiceRegistry, RegisteredObject};

// =============================================================================
// Configuration
// =============================================================================

/// Payload kind of a configured object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Image,
    Series,
    SeriesSet,
    Matrix,
    Vector,
    Composite,
    String,
    Integer,
    Float,
    Boolean,
}

impl ObjectKind {
    fn create(self, uid: &str) -> Arc<Object> {
        match self {
            ObjectKind::Image => Object::with_id(uid, Image::default()),
            ObjectKind::Series => Object::with_id(uid, Series::default()),
            ObjectKind::SeriesSet => Object::with_id(uid, SeriesSet::default()),
            ObjectKind::Matrix => Object::with_id(uid, Matrix4::default()),
            ObjectKind::Vector => Object::with_id(uid, Vector::default()),
            ObjectKind::Composite => Object::with_id(uid, Composite::default()),
            ObjectKind::String => Object::with_id(uid, StringValue::default()),
            ObjectKind::Integer => Object::with_id(uid, Integer::default()),
            ObjectKind::Float => Object::with_id(uid, Float::default()),
            ObjectKind::Boolean => Object::with_id(uid, Boolean::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub uid: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    /// Published later by a service output instead of being created here.
    #[serde(default)]
    pub deferred: bool,
}

/// `signal` and `slots` are `"<uid>/<key>"` references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub signal: String,
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(json).map_err(|e| ServiceError::Configuration(e.to_string()))
    }

    /// Check uid uniqueness and object references.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut uids = BTreeSet::new();
        for uid in self
            .objects
            .iter()
            .map(|o| &o.uid)
            .chain(self.services.iter().map(|s| &s.uid))
        {
            if !uids.insert(uid.as_str()) {
                return Err(ServiceError::Configuration(format!("duplicate uid '{uid}'")));
            }
        }

        for service in &self.services {
            for binding in &service.objects {
                let object = self
                    .objects
                    .iter()
                    .find(|o| o.uid == binding.uid)
                    .ok_or_else(|| {
                        ServiceError::Configuration(format!(
                            "service '{}' references unknown object '{}'",
                            service.uid, binding.uid
                        ))
                    })?;
                if binding.access == Access::Out && !object.deferred {
                    return Err(ServiceError::Configuration(format!(
                        "output '{}' of service '{}' must reference a deferred object",
                        binding.key, service.uid
                    )));
                }
            }
        }
        Ok(())
    }
}

fn split_reference(reference: &str) -> Result<(&str, &str), ServiceError> {
    reference
        .split_once('/')
        .filter(|(uid, key)| !uid.is_empty() && !key.is_empty())
        .ok_or_else(|| {
            ServiceError::Configuration(format!("invalid reference '{reference}', expected uid/key"))
        })
}

// =============================================================================
// AppConfigManager
// =============================================================================

#[derive(Default)]
struct ManagerState {
    config: AppConfig,
    objects: BTreeMap<String, Arc<Object>>,
    services: Vec<Arc<ServiceHandle>>,
    workers: BTreeMap<String, Arc<Worker>>,
    connections: Connections,
    started: bool,
}

/// Instantiates and drives one application configuration.
pub struct AppConfigManager {
    registry: Arc<ObjectServiceRegistry>,
    factory: Arc<ServiceFactory>,
    state: Mutex<ManagerState>,
    registry_connections: Mutex<Connections>,
    me: Weak<AppConfigManager>,
}

impl AppConfigManager {
    pub fn new(registry: Arc<ObjectServiceRegistry>, factory: Arc<ServiceFactory>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            registry,
            factory,
            state: Mutex::new(ManagerState::default()),
            registry_connections: Mutex::new(Connections::new()),
            me: me.clone(),
        })
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn object(&self, uid: &str) -> Option<Arc<Object>> {
        self.state().objects.get(uid).cloned()
    }

    pub fn service(&self, uid: &str) -> Option<Arc<ServiceHandle>> {
        self.state()
            .services
            .iter()
            .find(|s| s.id() == uid)
            .cloned()
    }

    pub fn is_started(&self) -> bool {
        self.state().started
    }

    /// Instantiate objects and services, bind and register them.
    ///
    /// On failure every service registered so far is unregistered, the
    /// connections made are removed and the spawned workers are stopped.
    pub fn create(&self, config: AppConfig) -> Result<(), ServiceError> {
        config.validate()?;

        let mut objects = BTreeMap::new();
        for object in config.objects.iter().filter(|o| !o.deferred) {
            objects.insert(object.uid.clone(), object.kind.create(&object.uid));
        }

        let mut workers: BTreeMap<String, Arc<Worker>> = BTreeMap::new();
        let mut services = Vec::with_capacity(config.services.len());
        let mut connections = Connections::new();
        if let Err(e) = self.build(
            &config,
            &objects,
            &mut services,
            &mut workers,
            &mut connections,
        ) {
            self.rollback(&services, &workers, &mut connections);
            return Err(e);
        }

        self.connect_registry();

        info!(
            objects = objects.len(),
            services = services.len(),
            "application configuration created"
        );
        let mut state = self.state();
        state.config = config;
        state.objects = objects;
        state.services = services;
        state.workers = workers;
        state.connections = connections;
        Ok(())
    }

    /// Create, configure, register and bind every service, then wire the
    /// configured connections. Registered services are pushed to `services`
    /// as soon as the registry holds them.
    fn build(
        &self,
        config: &AppConfig,
        objects: &BTreeMap<String, Arc<Object>>,
        services: &mut Vec<Arc<ServiceHandle>>,
        workers: &mut BTreeMap<String, Arc<Worker>>,
        connections: &mut Connections,
    ) -> Result<(), ServiceError> {
        for service_config in &config.services {
            let service = self
                .factory
                .create(&service_config.type_name, Some(&service_config.uid))?;

            if let Some(name) = &service_config.worker {
                if !workers.contains_key(name) {
                    let worker = Worker::new(name.clone()).map_err(|e| {
                        ServiceError::Configuration(format!("cannot spawn worker '{name}': {e}"))
                    })?;
                    workers.insert(name.clone(), worker);
                }
                service.set_worker(workers.get(name).cloned());
            }

            service.configure(service_config.clone())?;
            self.registry.register_service(&service)?;
            services.push(Arc::clone(&service));
            for binding in &service_config.objects {
                if let Some(object) = objects.get(&binding.uid) {
                    self.bind(&service, binding, object)?;
                }
            }
        }

        for connection in &config.connections {
            let (signal_uid, signal_key) = split_reference(&connection.signal)?;
            let signals: Signals = match objects.get(signal_uid) {
                Some(object) => object.signals().clone(),
                None => services
                    .iter()
                    .find(|s| s.id() == signal_uid)
                    .map(|s| s.signals().clone())
                    .ok_or_else(|| {
                        ServiceError::Configuration(format!("unknown signal owner '{signal_uid}'"))
                    })?,
            };
            for slot_ref in &connection.slots {
                let (slot_uid, slot_key) = split_reference(slot_ref)?;
                let service = services.iter().find(|s| s.id() == slot_uid).ok_or_else(|| {
                    ServiceError::Configuration(format!("unknown slot owner '{slot_uid}'"))
                })?;
                connections.add(connect_by_name::<()>(
                    &signals,
                    signal_key,
                    service.slots(),
                    slot_key,
                )?);
            }
        }
        Ok(())
    }

    /// Undo a partial [`create`](Self::create). The services are still stopped.
    fn rollback(
        &self,
        services: &[Arc<ServiceHandle>],
        workers: &BTreeMap<String, Arc<Worker>>,
        connections: &mut Connections,
    ) {
        connections.disconnect();
        for service in services.iter().rev() {
            if let Err(e) = self.registry.unregister_service(service) {
                warn!(
                    service = %service.id(),
                    error = %e,
                    "rollback could not unregister service"
                );
            }
            service.set_worker(None);
        }
        for worker in workers.values() {
            worker.stop();
        }
        debug!(services = services.len(), "application configuration rolled back");
    }

    fn connect_registry(&self) {
        let on_registered = {
            let me = self.me.clone();
            Slot::new("app_output_registered", move |(object, id): RegisteredObject| {
                if let Some(manager) = me.upgrade() {
                    manager.on_output_registered(&object, &id);
                }
            })
        };
        let on_unregistered = {
            let me = self.me.clone();
            Slot::new("app_output_unregistered", move |(object, id): RegisteredObject| {
                if let Some(manager) = me.upgrade() {
                    manager.on_output_unregistered(&object, &id);
                }
            })
        };

        let mut connections = self
            .registry_connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        connections.add(self.registry.registered_signal().connect(&on_registered));
        connections.add(self.registry.unregistered_signal().connect(&on_unregistered));
    }

    fn bind(
        &self,
        service: &ServiceHandle,
        binding: &ObjectServiceConfig,
        object: &Arc<Object>,
    ) -> Result<(), ServiceError> {
        let flat_key = group_key(&binding.key, binding.index);
        match binding.access {
            Access::In => {
                service
                    .data()
                    .set_input(&binding.key, binding.index, Some(Arc::clone(object)))?;
                self.registry
                    .register_service_input(service, &flat_key, object)?;
            }
            Access::InOut => {
                service
                    .data()
                    .set_inout(&binding.key, binding.index, Some(Arc::clone(object)))?;
                self.registry
                    .register_service_inout(service, &flat_key, object)?;
            }
            Access::Out => {}
        }
        Ok(())
    }

    fn unbind(&self, service: &ServiceHandle, binding: &ObjectServiceConfig) {
        let flat_key = group_key(&binding.key, binding.index);
        let result = match binding.access {
            Access::In => service.data().set_input(&binding.key, binding.index, None),
            Access::InOut => service.data().set_inout(&binding.key, binding.index, None),
            Access::Out => return,
        };
        if let Err(e) = result {
            warn!(service = %service.id(), key = %flat_key, error = %e, "unbind failed");
        }
        if let Err(e) = self
            .registry
            .unregister_binding(service, &flat_key, binding.access)
        {
            debug!(service = %service.id(), key = %flat_key, error = %e, "binding already gone");
        }
    }

    /// Services whose configuration binds `uid` as input or inout.
    fn dependants(&self, uid: &str) -> Vec<(Arc<ServiceHandle>, ObjectServiceConfig)> {
        let state = self.state();
        state
            .config
            .services
            .iter()
            .flat_map(|config| {
                config
                    .objects
                    .iter()
                    .filter(|binding| binding.uid == uid && binding.access != Access::Out)
                    .map(move |binding| (config.uid.clone(), binding.clone()))
            })
            .filter_map(|(service_uid, binding)| {
                state
                    .services
                    .iter()
                    .find(|s| s.id() == service_uid)
                    .map(|s| (Arc::clone(s), binding))
            })
            .collect()
    }

    fn on_output_registered(&self, object: &Arc<Object>, id: &str) {
        let started = {
            let mut state = self.state();
            let known = state
                .config
                .objects
                .iter()
                .any(|o| o.deferred && o.uid == id);
            if !known {
                return;
            }
            state.objects.insert(id.to_string(), Arc::clone(object));
            state.started
        };
        debug!(object = %id, "deferred object available");

        for (service, binding) in self.dependants(id) {
            if let Err(e) = self.bind(&service, &binding, object) {
                warn!(service = %service.id(), object = %id, error = %e, "cannot bind deferred object");
                continue;
            }
            let result = if service.is_started() {
                service.swap(&binding.key)
            } else if started && service.data().has_all_required() {
                service.start()
            } else {
                Ok(())
            };
            if let Err(e) = result {
                warn!(service = %service.id(), error = %e, "service not refreshed");
            }
        }
    }

    fn on_output_unregistered(&self, _object: &Arc<Object>, id: &str) {
        if self.state().objects.remove(id).is_none() {
            return;
        }
        debug!(object = %id, "deferred object withdrawn");

        for (service, binding) in self.dependants(id) {
            if service.is_started() && !binding.optional {
                if let Err(e) = service.stop() {
                    warn!(service = %service.id(), error = %e, "service not stopped");
                }
            }
            self.unbind(&service, &binding);
            if service.is_started() {
                if let Err(e) = service.swap(&binding.key) {
                    warn!(service = %service.id(), error = %e, "swap failed");
                }
            }
        }
    }

    /// Start every service whose required objects are available.
    pub fn start(&self) -> Result<(), ServiceError> {
        let services = {
            let mut state = self.state();
            state.started = true;
            state.services.clone()
        };
        for service in services {
            if !service.is_stopped() {
                continue;
            }
            if let Some(key) = service.data().missing_required() {
                debug!(service = %service.id(), key = %key, "waiting for deferred object");
                continue;
            }
            service.start()?;
        }
        Ok(())
    }

    /// Update every started service, in configuration order.
    pub fn update(&self) -> Result<(), ServiceError> {
        let services = self.state().services.clone();
        for service in services.iter().filter(|s| s.is_started()) {
            service.update()?;
        }
        Ok(())
    }

    /// Stop every started service, in reverse order.
    pub fn stop(&self) {
        let services = {
            let mut state = self.state();
            state.started = false;
            state.services.clone()
        };
        for service in services.iter().rev() {
            if service.is_started() {
                if let Err(e) = service.stop() {
                    warn!(service = %service.id(), error = %e, "service stop failed");
                }
            }
        }
    }

    /// Stop, unregister and release everything.
    pub fn destroy(&self) {
        self.stop();
        self.registry_connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .disconnect();

        let (services, workers) = {
            let mut state = self.state();
            state.connections.disconnect();
            state.objects.clear();
            (
                std::mem::take(&mut state.services),
                std::mem::take(&mut state.workers),
            )
        };

        for service in services.iter().rev() {
            match self.registry.unregister_service(service) {
                Ok(dangling) if !dangling.is_empty() => {
                    debug!(service = %service.id(), ?dangling, "outputs left to their holders")
                }
                Ok(_) => {}
                Err(e) => warn!(service = %service.id(), error = %e, "unregister failed"),
            }
            service.set_worker(None);
        }
        for worker in workers.values() {
            worker.stop();
        }
        info!("application configuration destroyed");
    }
}

impl std::fmt::Debug for AppConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("AppConfigManager")
            .field("objects", &state.objects.keys().collect::<Vec<_>>())
            .field("services", &state.services.len())
            .field("started", &state.started)
            .finish()
    }
}
