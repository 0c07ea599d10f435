//! Services and the object-service registry.
//!
//! ```text
//!   AppConfig ──► AppConfigManager ──create──► ServiceFactory
//!                      │                            │
//!                      │ register                   ▼
//!                      ▼                      ServiceHandle ──► dyn Service
//!              ObjectServiceRegistry ◄──outputs── (HasData sink)
//! ```
//!
//! A [`ServiceHandle`] owns the lifecycle state machine; the
//! [`Service`] trait only carries the behaviour of one implementation.

mod app;
mod config;
mod factory;
mod handle;
mod registry;

pub use self::app::{AppConfig, AppConfigManager, ConnectionConfig, ObjectConfig, ObjectKind};
pub use self::config::{ObjectServiceConfig, ServiceConfig};
pub use self::factory::{ServiceConstructor, ServiceFactory};
pub use self::handle::{
    AutoConnection, ConfigurationStatus, GlobalStatus, NotificationType, Service, ServiceContext,
    ServiceHandle, UpdatingStatus, FAILURE_NOTIFIED_SIGNAL, INFO_NOTIFIED_SIGNAL, START_SLOT,
    STARTED_SIGNAL, STOPPED_SIGNAL, STOP_SLOT, SUCCESS_NOTIFIED_SIGNAL, SWAP_SLOT, UPDATED_SIGNAL,
    UPDATE_SLOT,
};
pub use self::registry::{
    ObjectServiceRegistry, RegisteredObject, RegistryOutputSink, REGISTERED_SIGNAL,
    UNREGISTERED_SIGNAL,
};
