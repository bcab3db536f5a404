//! Error types for the pipeline and its collaborators.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a pipeline run.
///
/// Input errors surface immediately and are never retried. Store errors are
/// propagated unchanged from the document-store driver.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The corpus file or folder could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fan-out folder does not exist.
    #[error("folder not found: {}", .0.display())]
    MissingFolder(PathBuf),

    /// The fan-out path exists but is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Folder traversal failed.
    #[error("walking {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("export failed: {0}")]
    Export(String),
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Export(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Export(e.to_string())
    }
}

/// Errors raised by document-store drivers.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// The connection URI names a scheme no driver handles.
    #[error("unsupported store uri `{0}` (expected mem:// or file://<dir>)")]
    UnsupportedScheme(String),

    #[error("store i/o on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded as a document.
    #[error("cannot encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// Internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}
