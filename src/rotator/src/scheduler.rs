//! Cron-driven trigger for rotation cycles.

use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Result, RotateError};
use crate::orchestrator::LogRotator;

struct Running {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Fires [`LogRotator::try_rotate`] on a cron schedule.
///
/// Each trigger runs its cycle on a separate task, so stopping the scheduler
/// never interrupts a cycle that has already started, and a trigger that
/// fires while a cycle is still running is skipped.
pub struct Scheduler {
    expression: String,
    schedule: Schedule,
    rotator: Arc<LogRotator>,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    /// Parse `expression` (six fields, seconds first; an optional seventh
    /// field is the year). The scheduler starts stopped.
    pub fn new(expression: &str, rotator: Arc<LogRotator>) -> Result<Self> {
        let schedule =
            Schedule::from_str(expression).map_err(|e| RotateError::Configuration {
                expression: expression.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
            rotator,
            running: Mutex::new(None),
        })
    }

    /// Like [`Scheduler::new`], then starts right away when the rotator's
    /// configuration has `auto_start` set.
    pub fn build(expression: &str, rotator: Arc<LogRotator>) -> Result<Self> {
        let auto_start = rotator.config().auto_start;
        let scheduler = Self::new(expression, rotator)?;
        if auto_start {
            scheduler.start()?;
        }
        Ok(scheduler)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next time the schedule fires after now.
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.schedule.upcoming(Utc).next()
    }

    /// Start firing. Returns `Ok(false)` if already running.
    ///
    /// Fails with a configuration error outside a Tokio runtime.
    pub fn start(&self) -> Result<bool> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Ok(false);
        }

        let runtime = Handle::try_current().map_err(|e| RotateError::Configuration {
            expression: self.expression.clone(),
            message: format!("cannot start schedule: {e}"),
        })?;

        let (stop, stop_rx) = watch::channel(false);
        let handle = runtime.spawn(run_schedule(
            self.schedule.clone(),
            self.rotator.clone(),
            stop_rx,
        ));

        tracing::info!(schedule = %self.expression, "Log rotation schedule started");
        *running = Some(Running { stop, handle });
        Ok(true)
    }

    /// Stop firing. Cycles already in progress run to completion.
    /// Returns false if the scheduler was not running.
    pub fn stop(&self) -> bool {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match running {
            Some(running) => {
                // The loop may already have exited if the schedule ran out
                let _ = running.stop.send(true);
                tracing::info!(schedule = %self.expression, "Log rotation schedule stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_schedule(
    schedule: Schedule,
    rotator: Arc<LogRotator>,
    mut stop: watch::Receiver<bool>,
) {
    let mut cursor = Utc::now();

    loop {
        let Some(next) = schedule.after(&cursor).next() else {
            rotator.observer().debug("Schedule has no further fire times.");
            break;
        };

        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = stop.changed() => break,
        }

        // Missed fire times (e.g. after a suspend) are skipped, not replayed
        cursor = next.max(Utc::now());

        tracing::debug!(scheduled_for = %next, "Rotation triggered");
        let rotator = rotator.clone();
        tokio::spawn(async move {
            // Lifecycle events already went to the observer
            let _ = rotator.try_rotate().await;
        });
    }
}
