use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Every failure the engine can surface.
///
/// Per-file (`DocumentRead`) and per-source (`SourceUnreadable`) errors are
/// recovered by the builder; everything else ends the current operation.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("document source {path:?} is not readable: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read document {path}: {reason}")]
    DocumentRead { path: String, reason: String },

    #[error("index corruption: {0}")]
    IndexCorruption(String),

    #[error("term not found in field '{field}': {term}")]
    TermNotFound { field: String, term: String },

    #[error("indexing workers did not finish within {0:?}")]
    WorkerTimeout(Duration),

    #[error("indexing worker failed: {0}")]
    WorkerFailed(String),

    #[error("index store is closed")]
    AlreadyClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        IndexError::InvalidArgument(msg.into())
    }

    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        IndexError::IndexCorruption(msg.into())
    }

    pub fn document_read<P: Into<String>, S: ToString>(path: P, reason: S) -> Self {
        IndexError::DocumentRead { path: path.into(), reason: reason.to_string() }
    }

    /// Errors the builder swallows (logged and skipped) instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IndexError::DocumentRead { .. } | IndexError::SourceUnreadable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_per_file_and_per_source_errors_are_recoverable() {
        assert!(IndexError::document_read("a.txt", "denied").is_recoverable());
        let unreadable = IndexError::SourceUnreadable {
            path: PathBuf::from("/missing"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert!(unreadable.is_recoverable());
        assert!(!IndexError::corruption("bad").is_recoverable());
        assert!(!IndexError::AlreadyClosed.is_recoverable());
        assert!(!IndexError::WorkerTimeout(Duration::from_secs(1)).is_recoverable());
    }
}
