//! Discovery of the file the server just rotated out.
//!
//! On rotation the server renames its live log by appending a suffix (usually
//! a timestamp) to the original name. The newest sibling sharing the log's
//! name as a prefix is therefore the file that was just closed.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};

use crate::error::{Result, RotateError};
use crate::observer::RotationObserver;

/// Upper bound on concurrent metadata lookups during a scan.
const MAX_CONCURRENT_STATS: usize = 16;

/// Filesystem operations needed for discovery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// File names (not paths) of the entries in `dir`.
    async fn read_dir(&self, dir: &Path) -> std::io::Result<Vec<OsString>>;

    async fn modified(&self, path: &Path) -> std::io::Result<SystemTime>;
}

/// [`FileSystem`] backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn read_dir(&self, dir: &Path) -> std::io::Result<Vec<OsString>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name());
        }
        Ok(names)
    }

    async fn modified(&self, path: &Path) -> std::io::Result<SystemTime> {
        tokio::fs::metadata(path).await?.modified()
    }
}

/// A rotated-file candidate seen during one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileCandidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl LogFileCandidate {
    /// Newest wins; exact ties go to the greater path so the result does not
    /// depend on which lookup finished last.
    fn newer(self, other: Self) -> Self {
        if (other.modified, &other.path) > (self.modified, &self.path) {
            other
        } else {
            self
        }
    }
}

/// Returns true for siblings of the live log that carry a rotation suffix.
pub fn is_rotated_sibling(name: &OsStr, log_name: &OsStr) -> bool {
    let name = name.as_encoded_bytes();
    let log_name = log_name.as_encoded_bytes();
    name != log_name && name.starts_with(log_name)
}

pub struct LogLocator {
    fs: Arc<dyn FileSystem>,
}

impl Default for LogLocator {
    fn default() -> Self {
        Self::new(Arc::new(TokioFileSystem))
    }
}

impl LogLocator {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Find the most recently modified rotated sibling of `log_path`.
    ///
    /// Without a log path nothing is touched on disk and `None` is returned.
    /// A failed directory listing or a failed metadata lookup on any
    /// candidate fails the whole call; finding no candidate is not an error.
    ///
    /// Archives left by earlier cycles share the prefix too. The freshly
    /// rotated file only outranks them if the server wrote to it after the
    /// last archive was made; otherwise the newest archive is returned.
    pub async fn find(
        &self,
        log_path: Option<&Path>,
        observer: &dyn RotationObserver,
    ) -> Result<Option<PathBuf>> {
        let Some(log_path) = log_path.filter(|p| !p.as_os_str().is_empty()) else {
            observer.debug("Log file not specified. Cannot find rotated log file.");
            return Ok(None);
        };

        let Some(log_name) = log_path.file_name() else {
            observer.debug(&format!(
                "Log path {} has no file name. Cannot find rotated log file.",
                log_path.display()
            ));
            return Ok(None);
        };

        let directory = match log_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let entries = self.fs.read_dir(directory).await.map_err(|e| {
            observer.debug(&format!("Failed to list {}: {e}", directory.display()));
            RotateError::filesystem(directory, e)
        })?;

        let candidates: Vec<PathBuf> = entries
            .iter()
            .filter(|name| is_rotated_sibling(name, log_name))
            .map(|name| directory.join(name))
            .collect();

        tracing::debug!(
            directory = %directory.display(),
            entries = entries.len(),
            candidates = candidates.len(),
            "Scanned log directory"
        );

        let fs = &self.fs;
        let newest = stream::iter(candidates)
            .map(|path| async move {
                match fs.modified(&path).await {
                    Ok(modified) => Ok(LogFileCandidate { path, modified }),
                    Err(e) => {
                        observer.debug(&format!("Failed to stat {}: {e}", path.display()));
                        Err(RotateError::filesystem(path, e))
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_STATS)
            .try_fold(None, |best: Option<LogFileCandidate>, candidate| async move {
                Ok(Some(match best {
                    Some(best) => best.newer(candidate),
                    None => candidate,
                }))
            })
            .await?;

        match &newest {
            Some(candidate) => observer.debug(&format!(
                "New log file found: {}",
                candidate.path.display()
            )),
            None => observer.debug("New log file could not be located."),
        }

        Ok(newest.map(|candidate| candidate.path))
    }
}
