//! Pipeline stages applied to the rotated file.
//!
//! Every stage takes the artifact produced by the previous one and returns
//! the artifact for the next. A stage whose input is missing does nothing
//! and passes `None` along.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::observer::RotationObserver;

pub mod archive;
pub mod remove;
pub mod upload;

pub use archive::ArchiveStage;
pub use remove::RemoveStage;
pub use upload::UploadStage;

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(
        &self,
        artifact: Option<PathBuf>,
        observer: &dyn RotationObserver,
    ) -> Result<Option<PathBuf>>;
}
