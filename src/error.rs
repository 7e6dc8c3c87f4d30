use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("game {0} is not in the database (run a scan first)")]
    GameNotFound(u64),

    #[error("no DLL backup exists for app {0}")]
    BackupMissing(u64),

    #[error("DLL manifest unavailable: {0}")]
    ManifestUnavailable(String),

    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("scan superseded by a newer scan request")]
    ScanSuperseded,

    #[error("no DLLs to back up for app {0}")]
    NothingToBackUp(u64),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{context} ({path:?}): {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Cache(#[from] rusqlite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Wrap an `io::Error` with the operation and path that produced it.
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
