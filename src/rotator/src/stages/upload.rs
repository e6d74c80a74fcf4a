use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, WriteMultipart};
use tokio::io::AsyncReadExt;

use super::Stage;
use crate::error::{Result, RotateError};
use crate::naming::{BaseNameKey, RemoteKeyNaming};
use crate::observer::RotationObserver;

/// Size of each read from the local file.
const READ_CHUNK_SIZE: usize = 1024 * 1024;

/// Maximum number of multipart parts in flight at once.
const MAX_IN_FLIGHT_PARTS: usize = 4;

/// Remote store bound to a single bucket.
#[derive(Clone)]
pub struct RemoteStorage {
    pub store: Arc<dyn ObjectStore>,
    pub bucket: String,
}

impl RemoteStorage {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }
}

/// Ships the artifact to remote storage, leaving the local file in place.
pub struct UploadStage {
    storage: Option<RemoteStorage>,
    naming: Arc<dyn RemoteKeyNaming>,
}

impl UploadStage {
    pub fn new(storage: Option<RemoteStorage>, naming: Arc<dyn RemoteKeyNaming>) -> Self {
        Self { storage, naming }
    }

    /// Stage without remote storage; every call is a no-op.
    pub fn disabled() -> Self {
        Self::new(None, Arc::new(BaseNameKey::default()))
    }

    pub fn is_configured(&self) -> bool {
        self.storage.is_some()
    }

    /// Upload `input` under `key` and return `input` unchanged.
    ///
    /// Without configured storage, or without an input or key, nothing is
    /// sent and `None` is returned.
    pub async fn upload(
        &self,
        input: Option<&Path>,
        key: Option<&str>,
        observer: &dyn RotationObserver,
    ) -> Result<Option<PathBuf>> {
        let Some(storage) = &self.storage else {
            observer.debug("Remote storage not configured. Skipping upload.");
            return Ok(None);
        };

        let (Some(input), Some(key)) = (input, key) else {
            observer.debug("Input or output file not specified. Cannot upload.");
            return Ok(None);
        };

        let bytes = put_file(storage.store.as_ref(), input, key).await?;

        observer.debug(&format!(
            "File uploaded: {}:{key} ({bytes} bytes)",
            storage.bucket
        ));
        Ok(Some(input.to_path_buf()))
    }
}

/// Streams a local file into the store as a multipart upload.
async fn put_file(store: &dyn ObjectStore, local: &Path, key: &str) -> Result<u64> {
    let transmission = |source| RotateError::Transmission {
        path: local.to_path_buf(),
        key: key.to_string(),
        source,
    };

    let mut file = tokio::fs::File::open(local)
        .await
        .map_err(|e| RotateError::filesystem(local, e))?;

    let location = ObjectPath::from(key);
    let upload = store.put_multipart(&location).await.map_err(transmission)?;
    let mut writer = WriteMultipart::new(upload);

    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = match file.read(&mut buf).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) => {
                abort(writer, key).await;
                return Err(RotateError::filesystem(local, e));
            }
        };

        if let Err(e) = writer.wait_for_capacity(MAX_IN_FLIGHT_PARTS).await {
            abort(writer, key).await;
            return Err(transmission(e));
        }

        writer.write(&buf[..read]);
        total += read as u64;
    }

    writer.finish().await.map_err(transmission)?;

    tracing::debug!(key = %key, bytes = total, "Multipart upload complete");
    Ok(total)
}

async fn abort(writer: WriteMultipart, key: &str) {
    if let Err(e) = writer.abort().await {
        tracing::warn!(key = %key, error = %e, "Failed to abort multipart upload");
    }
}

#[async_trait]
impl Stage for UploadStage {
    fn name(&self) -> &'static str {
        "upload"
    }

    async fn apply(
        &self,
        artifact: Option<PathBuf>,
        observer: &dyn RotationObserver,
    ) -> Result<Option<PathBuf>> {
        let key = artifact
            .as_deref()
            .and_then(|path| self.naming.remote_key(path));
        self.upload(artifact.as_deref(), key.as_deref(), observer)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::observer::NoopObserver;
    use object_store::memory::InMemory;

    fn stage_with_memory_store() -> (UploadStage, Arc<dyn ObjectStore>) {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let stage = UploadStage::new(
            Some(RemoteStorage::new(store.clone(), "mongo-logs")),
            Arc::new(BaseNameKey::new(Some("prod".to_string()))),
        );
        (stage, store)
    }

    #[tokio::test]
    async fn test_upload_stores_file_under_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mongod.log.1.tar.gz");
        std::fs::write(&file, b"compressed rotated log").unwrap();

        let (stage, store) = stage_with_memory_store();
        let result = stage.apply(Some(file.clone()), &NoopObserver).await.unwrap();

        assert_eq!(result, Some(file.clone()));
        assert!(file.exists(), "upload must leave the local file");

        let stored = store
            .get(&ObjectPath::from("prod/mongod.log.1.tar.gz"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), b"compressed rotated log");
    }

    #[tokio::test]
    async fn test_unconfigured_storage_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mongod.log.1");
        std::fs::write(&file, b"rotated").unwrap();

        let stage = UploadStage::disabled();
        assert!(!stage.is_configured());
        assert_eq!(stage.apply(Some(file), &NoopObserver).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_input_is_noop() {
        let (stage, _store) = stage_with_memory_store();
        assert_eq!(stage.apply(None, &NoopObserver).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_local_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (stage, _store) = stage_with_memory_store();

        let err = stage
            .upload(
                Some(&dir.path().join("gone.tar.gz")),
                Some("gone.tar.gz"),
                &NoopObserver,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Filesystem);
    }
}
