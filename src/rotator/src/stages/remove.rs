use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::Stage;
use crate::error::{Result, RotateError};
use crate::observer::RotationObserver;

/// Deletes the local artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveStage;

impl RemoveStage {
    pub async fn remove(
        &self,
        file: Option<&Path>,
        observer: &dyn RotationObserver,
    ) -> Result<Option<PathBuf>> {
        let Some(file) = file else {
            observer.debug("File not specified. Cannot delete.");
            return Ok(None);
        };

        tokio::fs::remove_file(file)
            .await
            .map_err(|e| RotateError::filesystem(file, e))?;

        observer.debug(&format!("File deleted: {}", file.display()));
        Ok(Some(file.to_path_buf()))
    }
}

#[async_trait]
impl Stage for RemoveStage {
    fn name(&self) -> &'static str {
        "remove"
    }

    async fn apply(
        &self,
        artifact: Option<PathBuf>,
        observer: &dyn RotationObserver,
    ) -> Result<Option<PathBuf>> {
        self.remove(artifact.as_deref(), observer).await
    }
}
