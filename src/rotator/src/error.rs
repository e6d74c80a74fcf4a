use std::path::PathBuf;

/// Failure categories for a rotation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Command,
    Filesystem,
    Archive,
    Transmission,
}

#[derive(Debug, thiserror::Error)]
pub enum RotateError {
    #[error("Invalid schedule '{expression}': {message}")]
    Configuration { expression: String, message: String },

    #[error("Failed to connect to {target}: {message}")]
    Connection { target: String, message: String },

    #[error("Log rotate command rejected: {0}")]
    Command(String),

    #[error("Filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to upload {} as {key}: {source}", path.display())]
    Transmission {
        path: PathBuf,
        key: String,
        #[source]
        source: object_store::Error,
    },
}

impl RotateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RotateError::Configuration { .. } => ErrorKind::Configuration,
            RotateError::Connection { .. } => ErrorKind::Connection,
            RotateError::Command(_) => ErrorKind::Command,
            RotateError::Filesystem { .. } => ErrorKind::Filesystem,
            RotateError::Archive { .. } => ErrorKind::Archive,
            RotateError::Transmission { .. } => ErrorKind::Transmission,
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RotateError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RotateError::Archive {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = RotateError> = std::result::Result<T, E>;
