//! Signal/slot integration tests.
//!
//! Tests verify:
//! - Slots bound to a worker run on it, in posting order
//! - Task handles can be awaited from async code
//! - Name-based connections check argument types
//! - Blocked connections skip delivery

use std::sync::{Arc, Mutex};

use sight_core::com::{connect_by_name, Signal, Signals, Slot, Slots, Worker};
use sight_core::error::ComError;

#[tokio::test]
async fn test_worker_tasks_can_be_awaited() {
    let worker = Worker::new("io").unwrap();
    let handle = worker.post(|| 6 * 7).unwrap();
    assert_eq!(handle.await.unwrap(), 42);

    let w = Arc::clone(&worker);
    let on_worker = worker.post(move || w.is_current()).unwrap().await.unwrap();
    assert!(on_worker);
    assert!(!worker.is_current());

    worker.stop();
    assert!(matches!(worker.post(|| ()), Err(ComError::WorkerStopped(_))));
}

#[tokio::test]
async fn test_async_emit_keeps_posting_order() {
    let worker = Worker::new("ordered").unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let slot = Slot::with_worker("record", Arc::clone(&worker), move |value: u32| {
        sink.lock().unwrap().push(value);
    });

    let signal = Signal::<u32>::new("value_changed");
    signal.connect(&slot);
    for value in 0..20 {
        signal.async_emit(value);
    }

    // The queue is FIFO: once this task ran, every emission before it did.
    worker.post(|| ()).unwrap().await.unwrap();
    assert_eq!(*received.lock().unwrap(), (0..20).collect::<Vec<_>>());
    worker.stop();
}

#[test]
fn test_connect_by_name_between_holders() {
    let signals = Signals::new();
    let slots = Slots::new();
    let signal = signals.new_signal::<String>("modified").unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    slots
        .new_slot("update", move |name: String| sink.lock().unwrap().push(name))
        .unwrap();

    assert!(matches!(
        connect_by_name::<u64>(&signals, "modified", &slots, "update"),
        Err(ComError::SignatureMismatch { .. })
    ));
    assert!(matches!(
        connect_by_name::<String>(&signals, "missing", &slots, "update"),
        Err(ComError::UnknownSignal(_))
    ));

    let connection = connect_by_name::<String>(&signals, "modified", &slots, "update").unwrap();
    signal.emit("image".to_string());
    {
        let _blocker = connection.block();
        signal.emit("ignored".to_string());
    }
    connection.disconnect();
    signal.emit("after".to_string());

    assert_eq!(*seen.lock().unwrap(), vec!["image".to_string()]);
    assert!(!connection.is_connected());
}

#[test]
fn test_holder_worker_rebinds_every_slot() {
    let worker = Worker::new("service").unwrap();
    let slots = Slots::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let w = Arc::clone(&worker);
    let slot = slots
        .new_slot("probe", move |_: ()| sink.lock().unwrap().push(w.is_current()))
        .unwrap();

    slots.set_worker(Some(Arc::clone(&worker)));
    slot.async_run(()).unwrap().wait().unwrap();

    slots.set_worker(None);
    assert!(matches!(slot.async_run(()), Err(ComError::NoWorker(_))));
    slot.run(());

    assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    worker.stop();
}
