use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;

use super::Stage;
use crate::error::{Result, RotateError};
use crate::naming::{ArchiveNaming, SuffixArchiveName};
use crate::observer::RotationObserver;

/// Packs the artifact into a single-entry `.tar.gz` and removes the original.
pub struct ArchiveStage {
    naming: Arc<dyn ArchiveNaming>,
}

impl Default for ArchiveStage {
    fn default() -> Self {
        Self::new(Arc::new(SuffixArchiveName::default()))
    }
}

impl ArchiveStage {
    pub fn new(naming: Arc<dyn ArchiveNaming>) -> Self {
        Self { naming }
    }

    /// Archive `input` into `output`, then delete `input`.
    ///
    /// The input is only removed after the gzip stream is finished and the
    /// output file is synced to disk. If writing fails the partial output is
    /// discarded and the input is left untouched.
    pub async fn compress(
        &self,
        input: Option<&Path>,
        output: Option<&Path>,
        observer: &dyn RotationObserver,
    ) -> Result<Option<PathBuf>> {
        let (Some(input), Some(output)) = (input, output) else {
            observer.debug("Input or output file not specified. Cannot compress file.");
            return Ok(None);
        };

        observer.debug(&format!(
            "Compress. Input: {} Output: {}",
            input.display(),
            output.display()
        ));

        let written = {
            let input = input.to_path_buf();
            let output = output.to_path_buf();
            tokio::task::spawn_blocking(move || write_archive(&input, &output))
                .await
                .unwrap_or_else(|e| Err(io::Error::other(e)))
        };

        let written = match written {
            Ok(written) => written,
            Err(e) => {
                observer.debug(&format!("Archive error: {e}"));
                if let Err(cleanup) = tokio::fs::remove_file(output).await {
                    tracing::debug!(
                        output = %output.display(),
                        error = %cleanup,
                        "Could not remove partial archive"
                    );
                }
                return Err(RotateError::archive(input, e));
            }
        };

        observer.debug(&format!(
            "File compressed. {written} bytes. Saved to: {}",
            output.display()
        ));

        tokio::fs::remove_file(input)
            .await
            .map_err(|e| RotateError::filesystem(input, e))?;

        observer.debug(&format!("Removed archived source {}", input.display()));
        Ok(Some(output.to_path_buf()))
    }
}

/// Writes the archive and returns its size on disk.
fn write_archive(input: &Path, output: &Path) -> io::Result<u64> {
    let name = input.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "input path has no file name")
    })?;

    let file = File::create(output)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.append_path_with_name(input, name)?;

    let file = builder.into_inner()?.finish()?;
    file.sync_all()?;

    Ok(file.metadata()?.len())
}

#[async_trait]
impl Stage for ArchiveStage {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn apply(
        &self,
        artifact: Option<PathBuf>,
        observer: &dyn RotationObserver,
    ) -> Result<Option<PathBuf>> {
        let output = artifact.as_deref().map(|path| self.naming.archive_path(path));
        self.compress(artifact.as_deref(), output.as_deref(), observer)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::observer::NoopObserver;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn unpack_single(archive: &Path) -> (String, Vec<u8>) {
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(archive).unwrap()));
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        assert!(entries.next().is_none(), "archive must hold a single entry");
        (name, contents)
    }

    #[tokio::test]
    async fn test_archive_round_trip_removes_source() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mongod.log.2024-01-02T00-00-00");
        let contents: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        std::fs::write(&input, &contents).unwrap();

        let stage = ArchiveStage::default();
        let output = stage
            .apply(Some(input.clone()), &NoopObserver)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            output,
            dir.path().join("mongod.log.2024-01-02T00-00-00.tar.gz")
        );
        assert!(!input.exists(), "source must be removed after archiving");
        assert!(std::fs::metadata(&output).unwrap().len() > 0);

        let (name, unpacked) = unpack_single(&output);
        assert_eq!(name, "mongod.log.2024-01-02T00-00-00");
        assert_eq!(unpacked.len(), contents.len());
        assert_eq!(unpacked, contents);
    }

    #[tokio::test]
    async fn test_missing_input_or_output_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mongod.log.1");
        std::fs::write(&input, b"keep me").unwrap();

        let stage = ArchiveStage::default();
        assert_eq!(
            stage.compress(Some(&input), None, &NoopObserver).await.unwrap(),
            None
        );
        assert_eq!(
            stage
                .compress(None, Some(&dir.path().join("out.tar.gz")), &NoopObserver)
                .await
                .unwrap(),
            None
        );
        assert!(input.exists());
        assert_eq!(stage.apply(None, &NoopObserver).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_input_keeps_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mongod.log.missing");
        let output = dir.path().join("mongod.log.missing.tar.gz");

        let err = ArchiveStage::default()
            .compress(Some(&input), Some(&output), &NoopObserver)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Archive);
        assert!(!output.exists(), "partial archive must be discarded");
    }

    #[tokio::test]
    async fn test_unwritable_output_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mongod.log.1");
        std::fs::write(&input, b"rotated").unwrap();
        let output = dir.path().join("missing-dir").join("mongod.log.1.tar.gz");

        let err = ArchiveStage::default()
            .compress(Some(&input), Some(&output), &NoopObserver)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Archive);
        assert!(input.exists(), "source must survive a failed archive");
    }
}
