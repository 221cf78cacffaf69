//! Errors surfaced by the filesystem adapter.
//!
//! End-of-stream is never an error here: reads report `Ok(0)` and directory
//! listing reports `Ok(None)`.

use crate::store::StoreError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    /// The path failed the grammar check; no backend call was made.
    #[error("invalid path `{0}`")]
    InvalidPath(String),

    /// The backend reported that the object or bucket does not exist.
    #[error("`{path}` not found")]
    NotFound {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("`{0}` is a directory")]
    IsDirectory(String),

    /// Read attempted on a handle that was already closed.
    #[error("`{0}` is closed")]
    Closed(String),

    /// Any other backend failure, passed through unchanged.
    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// Classify a backend error raised while serving `path`.
    pub(crate) fn from_store(path: &str, err: StoreError) -> Self {
        if err.is_not_found() {
            FsError::NotFound {
                path: path.to_string(),
                source: err,
            }
        } else {
            FsError::Store(err)
        }
    }

    /// The closest `std::io::ErrorKind` for this error.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::InvalidPath(_) => io::ErrorKind::InvalidInput,
            FsError::NotFound { .. } => io::ErrorKind::NotFound,
            FsError::IsDirectory(_) => io::ErrorKind::IsADirectory,
            FsError::Closed(_) => io::ErrorKind::BrokenPipe,
            FsError::Store(err) => err.kind(),
            FsError::Io(err) => err.kind(),
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        match err {
            FsError::Io(err) => err,
            other => io::Error::new(other.kind(), other),
        }
    }
}
