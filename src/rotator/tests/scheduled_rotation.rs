//! Scheduled rotation running in real time against a simulated server.

mod support;

use std::sync::Arc;
use std::time::Duration;

use common::testing::TestConfigBuilder;
use rotator::{ARCHIVE_SUFFIX, LogRotator, Scheduler};
use support::{RecordingObserver, SimulatedServer, init_tracing};

const EVERY_SECOND: &str = "* * * * * *";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_each_scheduled_cycle_archives_the_rotated_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("mongod.log");
    let server = Arc::new(SimulatedServer::new(&log_path));
    let observer = Arc::new(RecordingObserver::default());

    let config = TestConfigBuilder::new()
        .with_schedule(EVERY_SECOND)
        .with_log_path(&log_path)
        .with_archive()
        .with_auto_start()
        .build();

    let rotator = Arc::new(
        LogRotator::builder(config.rotation, server.clone())
            .with_observer(observer.clone())
            .build(),
    );
    let scheduler = Scheduler::build(&config.schedule, rotator).unwrap();
    assert!(scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(3500)).await;
    scheduler.stop();
    // Let a cycle triggered right before stop finish
    tokio::time::sleep(Duration::from_millis(300)).await;

    let rotations = observer.rotations();
    assert!(
        rotations.len() >= 2,
        "expected at least two cycles, got {}",
        rotations.len()
    );
    assert!(observer.errors().is_empty());
    assert_eq!(rotations.len(), server.rotations());

    for (index, result) in rotations.iter().enumerate() {
        let artifact = result.artifact.as_ref().expect("every cycle finds a file");
        assert!(
            artifact.to_string_lossy().ends_with(ARCHIVE_SUFFIX),
            "{} should be an archive",
            artifact.display()
        );
        assert!(artifact.exists());
        assert!(!server.rotated_path(index + 1).exists());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_trigger_is_skipped() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("mongod.log");
    let server = Arc::new(SimulatedServer::new(&log_path).with_delay(Duration::from_secs(4)));
    let observer = Arc::new(RecordingObserver::default());

    let config = TestConfigBuilder::new()
        .with_log_path(&log_path)
        .build();

    let rotator = Arc::new(
        LogRotator::builder(config.rotation, server.clone())
            .with_observer(observer.clone())
            .build(),
    );
    let scheduler = Scheduler::new(EVERY_SECOND, rotator).unwrap();
    scheduler.start().unwrap();

    // The first trigger fires within 1s and holds the cycle for 4s, so every later trigger is skipped
    tokio::time::sleep(Duration::from_millis(3200)).await;
    scheduler.stop();

    // Wait for the slow cycle to complete
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(server.rotations(), 1);
    assert_eq!(observer.rotations().len(), 1);
    assert!(observer.errors().is_empty());
    assert!(
        observer
            .debug_messages()
            .iter()
            .any(|m| m.contains("already in progress"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stopped_scheduler_starts_no_new_cycles() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("mongod.log");
    let server = Arc::new(SimulatedServer::new(&log_path));

    let config = TestConfigBuilder::new().build();
    let rotator = Arc::new(LogRotator::builder(config.rotation, server.clone()).build());
    let scheduler = Scheduler::new(EVERY_SECOND, rotator).unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    scheduler.stop();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let after_stop = server.rotations();
    assert!(after_stop >= 1);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(server.rotations(), after_stop);
    assert!(!scheduler.is_running());
}
