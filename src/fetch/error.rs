//! Error types for the fetch module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving a share link or fetching its payload.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The reference matches neither accepted link shape.
    #[error(
        "could not extract a file id from '{reference}'\n  Suggestion: Use a link of the form .../file/d/<id>/view or ...?id=<id>"
    )]
    UnresolvableReference {
        /// The rejected reference.
        reference: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The host answered with a web page instead of the payload.
    #[error(
        "expected a file but received an HTML page from {url}\n  Suggestion: Make sure the file is shared publicly (anyone with the link)"
    )]
    UnexpectedHtml {
        /// The URL that returned HTML.
        url: String,
    },

    /// File system error while writing the payload.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The destination path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Creates an unresolvable-reference error.
    pub fn unresolvable(reference: impl Into<String>) -> Self {
        Self::UnresolvableReference {
            reference: reference.into(),
        }
    }

    /// Creates a network error, promoting timeouts to [`FetchError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for failures of the transfer itself, as opposed to a bad
    /// reference.
    #[must_use]
    pub fn is_transfer_error(&self) -> bool {
        !matches!(self, Self::UnresolvableReference { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolvable_display_includes_reference() {
        let error = FetchError::unresolvable("https://example.com/video");
        let msg = error.to_string();
        assert!(msg.contains("https://example.com/video"), "Expected reference in: {msg}");
        assert!(!error.is_transfer_error());
    }

    #[test]
    fn test_http_status_display() {
        let error = FetchError::http_status("https://drive.google.com/uc?id=x", 403);
        let msg = error.to_string();
        assert!(msg.contains("403"), "Expected status in: {msg}");
        assert!(error.is_transfer_error());
    }

    #[test]
    fn test_io_display_includes_path() {
        let io = std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full");
        let error = FetchError::io("/tmp/videos/tmp_video.mp4", io);
        assert!(error.to_string().contains("/tmp/videos/tmp_video.mp4"));
    }
}
