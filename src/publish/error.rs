//! Error types for the publish module.

use std::path::PathBuf;

use thiserror::Error;

/// A failed call against the publishing API.
///
/// Whether a failure is worth retrying is decided once, when the error is
/// built ([`ApiError::from_status`], [`ApiError::network`]); callers only ask
/// [`ApiError::is_transient`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// Failure that may succeed if the same request is sent again.
    #[error("transient API failure{}: {message}", status_label(.status))]
    Transient {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// What went wrong.
        message: String,
    },

    /// Failure that will not succeed on retry.
    #[error("API request refused{}: {message}", status_label(.status))]
    Permanent {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// What went wrong.
        message: String,
    },

    /// The local payload could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// The payload path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |code| format!(" (HTTP {code})"))
}

impl ApiError {
    /// Builds an error from a non-success HTTP response.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if classify_status(status) {
            Self::Transient {
                status: Some(status),
                message,
            }
        } else {
            Self::Permanent {
                status: Some(status),
                message,
            }
        }
    }

    /// Builds an error from a transport failure. Only timeouts are transient.
    pub fn network(context: &str, source: &reqwest::Error) -> Self {
        let message = format!("{context}: {source}");
        if source.is_timeout() {
            Self::Transient {
                status: None,
                message,
            }
        } else {
            Self::Permanent {
                status: None,
                message,
            }
        }
    }

    /// A response that could not be understood.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::Permanent {
            status: None,
            message: message.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the request may be re-sent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// The HTTP status behind this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } | Self::Permanent { status, .. } => *status,
            Self::Io { .. } => None,
        }
    }
}

/// Returns true when an HTTP status denotes a transient server failure.
///
/// Explicit match arms are kept for each retryable code.
#[allow(clippy::match_same_arms)]
#[must_use]
pub fn classify_status(status: u16) -> bool {
    match status {
        500 => true, // Internal Server Error
        502 => true, // Bad Gateway
        503 => true, // Service Unavailable
        504 => true, // Gateway Timeout
        _ => false,
    }
}

/// Errors returned by an upload.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Transient failures kept happening until the retry budget ran out.
    #[error("upload gave up after {attempts} transient failures: {last}")]
    RetriesExhausted {
        /// Number of transient failures seen.
        attempts: u32,
        /// The final failure.
        #[source]
        last: ApiError,
    },

    /// The API refused the upload.
    #[error("upload rejected: {source}")]
    Rejected {
        /// The permanent failure.
        #[source]
        source: ApiError,
    },

    /// The API reported completion but returned no id.
    #[error("upload completed without an external id")]
    MissingExternalId,

    /// The payload has no bytes.
    #[error("refusing to upload empty payload {path}")]
    EmptyPayload {
        /// The payload path.
        path: PathBuf,
    },
}
