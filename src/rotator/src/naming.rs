//! Name derivation for archives and uploaded objects.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to rotated files when they are archived.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Where the archive of a rotated file is written.
pub trait ArchiveNaming: Send + Sync {
    fn archive_path(&self, artifact: &Path) -> PathBuf;
}

/// Remote key under which an artifact is uploaded.
pub trait RemoteKeyNaming: Send + Sync {
    /// `None` when no key can be derived, e.g. for a path without a file name.
    fn remote_key(&self, artifact: &Path) -> Option<String>;
}

/// Appends a fixed suffix to the artifact path: `mongod.log.1` becomes
/// `mongod.log.1.tar.gz` in the same directory.
#[derive(Debug, Clone)]
pub struct SuffixArchiveName {
    suffix: String,
}

impl SuffixArchiveName {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Default for SuffixArchiveName {
    fn default() -> Self {
        Self::new(ARCHIVE_SUFFIX)
    }
}

impl ArchiveNaming for SuffixArchiveName {
    fn archive_path(&self, artifact: &Path) -> PathBuf {
        let mut name = OsString::from(artifact.as_os_str());
        name.push(&self.suffix);
        PathBuf::from(name)
    }
}

/// Uses the artifact's base file name as the key, optionally under a prefix.
#[derive(Debug, Clone, Default)]
pub struct BaseNameKey {
    prefix: Option<String>,
}

impl BaseNameKey {
    pub fn new(prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self { prefix }
    }
}

impl RemoteKeyNaming for BaseNameKey {
    fn remote_key(&self, artifact: &Path) -> Option<String> {
        let name = artifact.file_name()?.to_string_lossy();
        Some(match &self.prefix {
            Some(prefix) => format!("{prefix}/{name}"),
            None => name.into_owned(),
        })
    }
}
