//! Error types for job store operations.

use std::path::PathBuf;

use thiserror::Error;

use super::job::UploadState;

/// Errors that can occur while reading or rewriting the job store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file could not be opened.
    #[error("failed to read job store {path}: {source}")]
    StoreRead {
        /// Store path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The store file is not valid CSV.
    #[error("malformed job store {path}: {source}")]
    Parse {
        /// Store path.
        path: PathBuf,
        /// Underlying CSV error (carries row/line position).
        #[source]
        source: csv::Error,
    },

    /// The rewritten table could not be persisted. The previously committed
    /// file is left in place.
    #[error(
        "failed to write job store {path}: {source}\n  Suggestion: Check permissions and free space in the store directory"
    )]
    StoreWrite {
        /// Store path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The position does not address a data row.
    #[error("job position {position} out of range (store has {len} rows)")]
    InvalidPosition {
        /// Requested position.
        position: usize,
        /// Number of data rows.
        len: usize,
    },

    /// The requested state change would reverse a terminal state.
    #[error("job {position} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Row position.
        position: usize,
        /// Current state.
        from: UploadState,
        /// Requested state.
        to: UploadState,
    },

    /// An empty id cannot serve as proof of publication.
    #[error("refusing to record an empty external id for job {position}")]
    EmptyExternalId {
        /// Row position.
        position: usize,
    },
}

impl StoreError {
    /// Creates a read error.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Creates a write error.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreWrite {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_position_display() {
        let error = StoreError::InvalidPosition {
            position: 7,
            len: 3,
        };
        let msg = error.to_string();
        assert!(msg.contains('7'), "Expected position in: {msg}");
        assert!(msg.contains("3 rows"), "Expected row count in: {msg}");
    }

    #[test]
    fn test_write_error_display_includes_path_and_suggestion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = StoreError::write("/data/uploads.csv", io);
        let msg = error.to_string();
        assert!(msg.contains("/data/uploads.csv"), "Expected path in: {msg}");
        assert!(msg.contains("Suggestion"), "Expected suggestion in: {msg}");
    }

    #[test]
    fn test_invalid_transition_display() {
        let error = StoreError::InvalidTransition {
            position: 2,
            from: UploadState::Done,
            to: UploadState::Failed,
        };
        assert_eq!(error.to_string(), "job 2 cannot move from done to failed");
    }
}
