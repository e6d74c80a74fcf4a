//! Lifecycle notifications for rotation cycles.

use crate::error::RotateError;
use crate::orchestrator::RotationResult;

/// Receives the lifecycle events of every cycle.
///
/// `debug` may fire any number of times and carries no control-flow meaning.
/// Each cycle ends with exactly one of `error` or `rotated`, unless it was
/// skipped because another cycle was still running.
pub trait RotationObserver: Send + Sync {
    fn debug(&self, message: &str);

    fn error(&self, error: &RotateError);

    fn rotated(&self, result: &RotationResult);
}

/// Forwards lifecycle events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RotationObserver for TracingObserver {
    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn error(&self, error: &RotateError) {
        tracing::error!(error = %error, kind = ?error.kind(), "Log rotation failed");
    }

    fn rotated(&self, result: &RotationResult) {
        tracing::info!(
            server_version = %result.server_version,
            artifact = ?result.artifact,
            "Log rotation complete"
        );
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RotationObserver for NoopObserver {
    fn debug(&self, _message: &str) {}

    fn error(&self, _error: &RotateError) {}

    fn rotated(&self, _result: &RotationResult) {}
}
