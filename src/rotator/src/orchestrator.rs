//! Rotation cycle orchestration.
//!
//! A cycle issues the rotate command, locates the file the server rotated
//! out, then runs the enabled stages over it in a fixed order:
//!
//! ```text
//! gateway -> locator -> [archive] -> [upload] -> [remove]
//! ```
//!
//! The first failing step ends the cycle; later stages never run. Cycles are
//! serialized: at most one runs at a time per rotator.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use common::RotationConfig;
use tokio::sync::Mutex;

use crate::error::RotateError;
use crate::gateway::AdminGateway;
use crate::locator::{FileSystem, LogLocator};
use crate::naming::{ArchiveNaming, BaseNameKey, RemoteKeyNaming, SuffixArchiveName};
use crate::observer::{RotationObserver, TracingObserver};
use crate::stages::upload::RemoteStorage;
use crate::stages::{ArchiveStage, RemoveStage, Stage, UploadStage};

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationResult {
    pub server_version: String,
    /// The file the pipeline ended with, if any.
    pub artifact: Option<PathBuf>,
}

/// A failed cycle together with whatever it had produced before failing.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RotationFailure {
    #[source]
    pub error: RotateError,
    pub partial: RotationResult,
}

pub type RotationOutcome = Result<RotationResult, RotationFailure>;

pub struct LogRotator {
    config: RwLock<RotationConfig>,
    gateway: Arc<dyn AdminGateway>,
    locator: LogLocator,
    archive: ArchiveStage,
    upload: UploadStage,
    remove: RemoveStage,
    observer: Arc<dyn RotationObserver>,
    cycle: Mutex<()>,
}

impl LogRotator {
    pub fn builder(config: RotationConfig, gateway: Arc<dyn AdminGateway>) -> LogRotatorBuilder {
        LogRotatorBuilder::new(config, gateway)
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> RotationConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the configuration used by subsequent cycles.
    ///
    /// A cycle that is already running keeps the snapshot it started with.
    pub fn update_config(&self, update: impl FnOnce(&mut RotationConfig)) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut config);
    }

    pub fn observer(&self) -> &dyn RotationObserver {
        self.observer.as_ref()
    }

    /// Run one cycle, waiting for an in-flight cycle to finish first.
    pub async fn rotate(&self) -> RotationOutcome {
        let _cycle = self.cycle.lock().await;
        self.run_cycle().await
    }

    /// Run one cycle unless another one is in progress.
    ///
    /// Returns `None` when the call was skipped. Used by the scheduler so an
    /// overlapping trigger is dropped rather than queued.
    pub async fn try_rotate(&self) -> Option<RotationOutcome> {
        let Ok(_cycle) = self.cycle.try_lock() else {
            self.observer
                .debug("Rotation already in progress. Skipping this trigger.");
            return None;
        };
        Some(self.run_cycle().await)
    }

    /// Run one cycle and report it to `done` as `(error, result)`.
    ///
    /// On failure `result` is the partial result built before the error.
    pub async fn rotate_with<F>(&self, done: F) -> RotationOutcome
    where
        F: FnOnce(Option<&RotateError>, &RotationResult),
    {
        let outcome = self.rotate().await;
        match &outcome {
            Ok(result) => done(None, result),
            Err(failure) => done(Some(&failure.error), &failure.partial),
        }
        outcome
    }

    /// Enabled stages in execution order.
    fn pipeline(&self, config: &RotationConfig) -> Vec<&dyn Stage> {
        let mut stages: Vec<&dyn Stage> = Vec::with_capacity(3);
        if config.archive {
            stages.push(&self.archive);
        }
        if config.upload {
            stages.push(&self.upload);
        }
        if config.auto_delete {
            stages.push(&self.remove);
        }
        stages
    }

    async fn run_cycle(&self) -> RotationOutcome {
        let config = self.config();
        let observer = self.observer.as_ref();
        let mut result = RotationResult::default();

        observer.debug("Rotating log.");

        let response = match self.gateway.rotate(&config.connection_uri).await {
            Ok(response) => response,
            Err(error) => return self.fail(error, result),
        };
        observer.debug(&format!(
            "Rotate command accepted by server version {}",
            response.server_version
        ));
        tracing::debug!(command_result = %response.command_result, "logRotate response");
        result.server_version = response.server_version;

        let mut artifact = match self.locator.find(config.log_path(), observer).await {
            Ok(artifact) => artifact,
            Err(error) => return self.fail(error, result),
        };
        result.artifact = artifact.clone();

        for stage in self.pipeline(&config) {
            tracing::debug!(stage = stage.name(), artifact = ?artifact, "Running stage");
            match stage.apply(artifact.take(), observer).await {
                Ok(next) => {
                    artifact = next;
                    result.artifact = artifact.clone();
                }
                Err(error) => {
                    tracing::debug!(stage = stage.name(), "Stage failed, aborting cycle");
                    return self.fail(error, result);
                }
            }
        }

        observer.rotated(&result);
        Ok(result)
    }

    fn fail(&self, error: RotateError, partial: RotationResult) -> RotationOutcome {
        self.observer.error(&error);
        Err(RotationFailure { error, partial })
    }
}

pub struct LogRotatorBuilder {
    config: RotationConfig,
    gateway: Arc<dyn AdminGateway>,
    storage: Option<RemoteStorage>,
    observer: Arc<dyn RotationObserver>,
    fs: Option<Arc<dyn FileSystem>>,
    archive_naming: Arc<dyn ArchiveNaming>,
    key_naming: Option<Arc<dyn RemoteKeyNaming>>,
}

impl LogRotatorBuilder {
    fn new(config: RotationConfig, gateway: Arc<dyn AdminGateway>) -> Self {
        Self {
            config,
            gateway,
            storage: None,
            observer: Arc::new(TracingObserver),
            fs: None,
            archive_naming: Arc::new(SuffixArchiveName::default()),
            key_naming: None,
        }
    }

    /// Remote store used by the upload stage. Without one, upload is a no-op.
    pub fn with_remote_storage(mut self, storage: Option<RemoteStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RotationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn with_archive_naming(mut self, naming: Arc<dyn ArchiveNaming>) -> Self {
        self.archive_naming = naming;
        self
    }

    /// Replaces the default key naming, which uses the base file name under
    /// the configured key prefix.
    pub fn with_key_naming(mut self, naming: Arc<dyn RemoteKeyNaming>) -> Self {
        self.key_naming = Some(naming);
        self
    }

    pub fn build(self) -> LogRotator {
        let key_naming: Arc<dyn RemoteKeyNaming> = match self.key_naming {
            Some(naming) => naming,
            None => Arc::new(BaseNameKey::new(self.config.storage.key_prefix.clone())),
        };
        let locator = match self.fs {
            Some(fs) => LogLocator::new(fs),
            None => LogLocator::default(),
        };

        LogRotator {
            config: RwLock::new(self.config),
            gateway: self.gateway,
            locator,
            archive: ArchiveStage::new(self.archive_naming),
            upload: UploadStage::new(self.storage, key_naming),
            remove: RemoveStage,
            observer: self.observer,
            cycle: Mutex::new(()),
        }
    }
}
