//! Shared fixtures for rotator integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rotator::{AdminGateway, AdminResponse, ErrorKind, RotateError, RotationObserver, RotationResult};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Stands in for a database server that rotates its own log file.
///
/// Each rotate request appends a line to the live log, renames it with a
/// sequence suffix and opens a fresh live log, like mongod does.
pub struct SimulatedServer {
    log_path: PathBuf,
    rotations: AtomicUsize,
    delay: Option<Duration>,
    reject: bool,
}

impl SimulatedServer {
    pub fn new(log_path: &Path) -> Self {
        std::fs::write(log_path, b"server started\n").unwrap();
        Self {
            log_path: log_path.to_path_buf(),
            rotations: AtomicUsize::new(0),
            delay: None,
            reject: false,
        }
    }

    /// Every rotate request takes `delay` before it completes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every rotate request is rejected by the server.
    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    pub fn rotations(&self) -> usize {
        self.rotations.load(Ordering::SeqCst)
    }

    pub fn rotated_path(&self, sequence: usize) -> PathBuf {
        let mut name = self.log_path.clone().into_os_string();
        name.push(format!(".{sequence:04}"));
        PathBuf::from(name)
    }

    fn rotate_files(&self, sequence: usize) -> std::io::Result<()> {
        let mut live = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.log_path)?;
        writeln!(live, "log rotation initiated, sequence {sequence}")?;
        live.sync_all()?;
        drop(live);

        std::fs::rename(&self.log_path, self.rotated_path(sequence))?;
        std::fs::write(&self.log_path, b"log file reopened\n")
    }
}

#[async_trait]
impl AdminGateway for SimulatedServer {
    async fn rotate(&self, _uri: &str) -> rotator::error::Result<AdminResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.reject {
            return Err(RotateError::Command(
                "Unauthorized (13): not authorized on admin to execute command".to_string(),
            ));
        }

        let sequence = self.rotations.fetch_add(1, Ordering::SeqCst) + 1;
        self.rotate_files(sequence)
            .map_err(|e| RotateError::Command(e.to_string()))?;

        Ok(AdminResponse {
            server_version: "7.0.4".to_string(),
            command_result: serde_json::json!({ "ok": 1.0 }),
        })
    }
}

/// Observer that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    pub debug: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<ErrorKind>>,
    pub rotations: Mutex<Vec<RotationResult>>,
}

impl RecordingObserver {
    pub fn debug_messages(&self) -> Vec<String> {
        self.debug.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<ErrorKind> {
        self.errors.lock().unwrap().clone()
    }

    pub fn rotations(&self) -> Vec<RotationResult> {
        self.rotations.lock().unwrap().clone()
    }
}

impl RotationObserver for RecordingObserver {
    fn debug(&self, message: &str) {
        self.debug.lock().unwrap().push(message.to_string());
    }

    fn error(&self, error: &RotateError) {
        self.errors.lock().unwrap().push(error.kind());
    }

    fn rotated(&self, result: &RotationResult) {
        self.rotations.lock().unwrap().push(result.clone());
    }
}
