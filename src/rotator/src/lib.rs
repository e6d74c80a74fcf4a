//! Scheduled database log rotation.
//!
//! On every trigger the rotator tells the database server to start a new log
//! file, finds the file that was rotated out and optionally archives it,
//! uploads it to object storage and deletes the local copy.
//!
//! - `gateway`: the administrative rotate command
//! - `locator`: discovery of the rotated file on local disk
//! - `stages`: archive, upload and remove steps
//! - `orchestrator`: sequencing of one cycle
//! - `scheduler`: cron trigger with start/stop control

pub mod error;
pub mod gateway;
pub mod locator;
pub mod naming;
pub mod observer;
pub mod orchestrator;
pub mod scheduler;
pub mod stages;

// Re-export commonly used types
pub use error::{ErrorKind, RotateError};
pub use gateway::{AdminGateway, AdminResponse};
#[cfg(feature = "mongodb")]
pub use gateway::MongoGateway;
pub use locator::{FileSystem, LogLocator, TokioFileSystem};
pub use naming::{ARCHIVE_SUFFIX, ArchiveNaming, BaseNameKey, RemoteKeyNaming, SuffixArchiveName};
pub use observer::{NoopObserver, RotationObserver, TracingObserver};
pub use orchestrator::{
    LogRotator, LogRotatorBuilder, RotationFailure, RotationOutcome, RotationResult,
};
pub use scheduler::Scheduler;
pub use stages::upload::RemoteStorage;
pub use stages::{ArchiveStage, RemoveStage, Stage, UploadStage};
