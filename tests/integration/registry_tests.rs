//! Object-service registry and app configuration integration tests.
//!
//! Tests verify:
//! - The DICOM reader publishes its series set as a deferred object
//! - Services waiting on that object start once it is published
//! - A new read swaps the object into running dependants

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sight_core::data::{access, Ptr, SeriesSet};
use sight_core::dicom::{self, SERIES_SET_READER};
use sight_core::error::ServiceError;
use sight_core::service::{
    AppConfig, AppConfigManager, ObjectServiceRegistry, Service, ServiceContext, ServiceFactory,
};

use super::test_utils::{TestInstance, CT_IMAGE, MR_IMAGE};

const COUNTER: &str = "test::series_counter";

/// Records the size of its input series set.
struct SeriesCounter {
    input: Ptr<SeriesSet, access::In>,
    seen: Arc<AtomicUsize>,
}

impl SeriesCounter {
    fn record(&self) -> Result<(), ServiceError> {
        let len = self.input.read(SeriesSet::len)?;
        self.seen.store(len, Ordering::SeqCst);
        Ok(())
    }
}

impl Service for SeriesCounter {
    fn starting(&mut self, _ctx: &ServiceContext<'_>) -> Result<(), ServiceError> {
        self.record()
    }

    fn updating(&mut self, _ctx: &ServiceContext<'_>) -> Result<(), ServiceError> {
        self.record()
    }
}

fn app_config(folder: &std::path::Path) -> AppConfig {
    let json = serde_json::json!({
        "objects": [
            { "uid": "seriesSet", "type": "series_set", "deferred": true }
        ],
        "services": [
            { "uid": "reader", "type": SERIES_SET_READER,
              "objects": [ { "uid": "seriesSet", "key": "data", "access": "out" } ],
              "params": { "folder": folder.to_string_lossy() } },
            { "uid": "counter", "type": COUNTER,
              "objects": [ { "uid": "seriesSet", "key": "series_set", "access": "in" } ] }
        ]
    });
    AppConfig::from_json(&json.to_string()).unwrap()
}

fn manager(seen: Arc<AtomicUsize>) -> (Arc<AppConfigManager>, Arc<ObjectServiceRegistry>) {
    let factory = Arc::new(ServiceFactory::new());
    dicom::register(&factory);
    factory.register(COUNTER, move |data, _| {
        Box::new(SeriesCounter {
            input: Ptr::new(data, "series_set", false),
            seen: Arc::clone(&seen),
        })
    });
    let registry = ObjectServiceRegistry::new();
    (AppConfigManager::new(Arc::clone(&registry), factory), registry)
}

#[test]
fn test_reader_output_starts_waiting_service() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "IM1");

    let seen = Arc::new(AtomicUsize::new(0));
    let (manager, registry) = manager(Arc::clone(&seen));
    manager.create(app_config(dir.path())).unwrap();
    manager.start().unwrap();

    let reader = manager.service("reader").unwrap();
    let counter = manager.service("counter").unwrap();
    assert!(reader.is_started());
    assert!(counter.is_stopped());
    assert!(manager.object("seriesSet").is_none());

    manager.update().unwrap();

    assert!(counter.is_started());
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    let published = manager.object("seriesSet").unwrap();
    let output = registry.output("reader", "data").unwrap();
    assert!(Arc::ptr_eq(&published, &output));
    assert_eq!(registry.services_for_object(&published).len(), 2);

    manager.destroy();
    assert!(!registry.is_registered("reader"));
    assert!(!registry.is_registered("counter"));
}

#[test]
fn test_new_read_is_swapped_into_dependant() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "IM1");

    let seen = Arc::new(AtomicUsize::new(0));
    let (manager, _registry) = manager(Arc::clone(&seen));
    manager.create(app_config(dir.path())).unwrap();
    manager.start().unwrap();
    manager.update().unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    let first = manager.object("seriesSet").unwrap();

    TestInstance::new("1.2.3.2", MR_IMAGE, "1.2.3.2.1").write(dir.path(), "IM2");
    manager.service("reader").unwrap().update().unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    let second = manager.object("seriesSet").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    manager.destroy();
}

#[test]
fn test_reader_requires_existing_folder() {
    let dir = tempfile::tempdir().unwrap();
    let seen = Arc::new(AtomicUsize::new(0));
    let (manager, _registry) = manager(Arc::clone(&seen));
    manager
        .create(app_config(&dir.path().join("absent")))
        .unwrap();
    manager.start().unwrap();

    assert!(matches!(manager.update(), Err(ServiceError::Failed { .. })));
    assert!(manager.object("seriesSet").is_none());
    assert!(manager.service("counter").unwrap().is_stopped());
    manager.destroy();
}
