//! Job and aggregator integration tests.
//!
//! Tests verify:
//! - Jobs running on workers complete an aggregator
//! - Completion does not require every child to reach its total
//! - Cancellation reaches running tasks

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sight_core::com::Worker;
use sight_core::jobs::{Aggregator, Job, JobLike, JobState, Observer};

#[test]
fn test_aggregator_of_worker_jobs() {
    let worker = Worker::new("jobs").unwrap();
    let aggregator = Aggregator::new("import");

    let first = Job::with_worker("first", Arc::clone(&worker), |job| {
        job.set_total_work_units(4);
        for _ in 0..4 {
            job.add_done_work(1);
        }
        Ok(())
    });
    let second = Job::with_worker("second", Arc::clone(&worker), |job| {
        job.set_total_work_units(10);
        // Stops short of its total.
        job.done_work(6);
        Ok(())
    });
    let observer = Observer::with_total("external", 2);
    aggregator.add(first.clone());
    aggregator.add(second.clone());
    aggregator.add(observer.clone());

    let progress = Arc::new(AtomicU64::new(0));
    let sink = Arc::clone(&progress);
    aggregator.add_progress_hook(move |done, _| {
        sink.fetch_max(done, Ordering::SeqCst);
    });

    let future = aggregator.run();
    let external = Arc::clone(&observer);
    let thread = std::thread::spawn(move || {
        external.done();
        external.finish();
    });

    future.get().unwrap();
    thread.join().unwrap();

    assert_eq!(aggregator.state(), JobState::Finished);
    assert_eq!(first.state(), JobState::Finished);
    assert_eq!(second.state(), JobState::Finished);
    assert_eq!(aggregator.done_work_units(), 12);
    assert_eq!(aggregator.total_work_units(), 16);
    assert_eq!(progress.load(Ordering::SeqCst), 12);
    worker.stop();
}

#[test]
fn test_cancel_reaches_running_task() {
    let worker = Worker::new("cancel").unwrap();
    let aggregator = Aggregator::new("long");
    let (started_tx, started_rx) = std::sync::mpsc::channel();

    let job = Job::with_worker("loop", Arc::clone(&worker), move |job| {
        job.set_total_work_units(1_000);
        let _ = started_tx.send(());
        for _ in 0..1_000 {
            if job.cancel_requested() {
                job.log("stopped early");
                return Ok(());
            }
            job.add_done_work(1);
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    });
    aggregator.add(job.clone());

    let future = aggregator.run();
    started_rx.recv().unwrap();
    aggregator.cancel();
    future.get().unwrap();

    assert_eq!(aggregator.state(), JobState::Canceled);
    assert!(job.done_work_units() < 1_000);
    assert_eq!(job.logs(), vec!["stopped early".to_string()]);
    worker.stop();
}

#[test]
fn test_failed_job_reports_error() {
    let aggregator = Aggregator::new("failing");
    aggregator.add(Job::new("panics", |_| panic!("boom")));
    aggregator.add(Observer::new("idle"));

    let future = aggregator.run();
    for child in aggregator.children() {
        child.finish();
    }
    let err = future.get().unwrap_err();
    assert!(err.to_string().contains("panics"));
}
