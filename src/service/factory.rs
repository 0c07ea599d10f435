//! Registry of service implementations.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::com::Signals;
use crate::data::HasData;
use crate::error::ServiceError;

use super::handle::{Service, ServiceHandle};

/// Builds the behavior of one service instance.
pub type ServiceConstructor = Arc<dyn Fn(&HasData, &Signals) -> Box<dyn Service> + Send + Sync>;

static NEXT_SERVICE_ID: AtomicU64 = AtomicU64::new(1);

/// Constructors keyed by implementation name.
#[derive(Default)]
pub struct ServiceFactory {
    constructors: RwLock<BTreeMap<String, ServiceConstructor>>,
}

impl ServiceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor of `type_name`.
    pub fn register<F>(&self, type_name: &str, constructor: F)
    where
        F: Fn(&HasData, &Signals) -> Box<dyn Service> + Send + Sync + 'static,
    {
        debug!(implementation = type_name, "service implementation registered");
        self.constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_name.to_string(), Arc::new(constructor));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(type_name)
    }

    /// Registered implementation names, sorted.
    pub fn implementations(&self) -> Vec<String> {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Instantiate `type_name`.
    ///
    /// # Arguments
    /// * `type_name` - Registered implementation name
    /// * `id` - Service id; generated as `<type>-<n>` when `None`
    pub fn create(
        &self,
        type_name: &str,
        id: Option<&str>,
    ) -> Result<Arc<ServiceHandle>, ServiceError> {
        let constructor = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_name)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownImplementation(type_name.to_string()))?;

        let id = match id {
            Some(id) => id.to_string(),
            None => format!(
                "{type_name}-{}",
                NEXT_SERVICE_ID.fetch_add(1, Ordering::Relaxed)
            ),
        };

        Ok(ServiceHandle::new(id, type_name, |data, signals| {
            constructor(data, signals)
        }))
    }
}

impl std::fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.implementations()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceContext;

    struct Noop;

    impl Service for Noop {
        fn starting(&mut self, _ctx: &ServiceContext<'_>) -> Result<(), ServiceError> {
            Ok(())
        }

        fn updating(&mut self, _ctx: &ServiceContext<'_>) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    #[test]
    fn test_create_registered() {
        let factory = ServiceFactory::new();
        factory.register("test::noop", |_, _| Box::new(Noop));

        let named = factory.create("test::noop", Some("noop")).unwrap();
        assert_eq!(named.id(), "noop");
        assert_eq!(named.type_name(), "test::noop");

        let generated = factory.create("test::noop", None).unwrap();
        assert!(generated.id().starts_with("test::noop-"));
        assert_eq!(factory.implementations(), vec!["test::noop".to_string()]);
    }

    #[test]
    fn test_unknown_implementation() {
        let factory = ServiceFactory::new();
        assert!(matches!(
            factory.create("missing", None),
            Err(ServiceError::UnknownImplementation(name)) if name == "missing"
        ));
    }
}
