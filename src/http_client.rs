//! Shared HTTP client construction policy.
//!
//! The fetcher, the publisher API and the token exchange all build their
//! `reqwest` clients here so timeouts, compression and User-Agent stay
//! consistent.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use tracing::debug;

/// Identifies the tool to content hosts and the publishing API.
const PROJECT_UA_URL: &str = "https://github.com/fierce/uploader";

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes without a single byte arriving).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Connect and read timeouts for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Connect timeout in seconds.
    pub connect_secs: u64,
    /// Longest wait for the next read, in seconds. Bounds stalls, not the
    /// total transfer time of a large payload.
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: CONNECT_TIMEOUT_SECS,
            read_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Client builder preloaded with the project defaults, for callers that
/// need to adjust more (e.g. redirect policy).
#[must_use]
pub fn client_builder(timeouts: HttpTimeouts) -> ClientBuilder {
    debug!(
        connect_secs = timeouts.connect_secs,
        read_secs = timeouts.read_secs,
        "building HTTP client"
    );
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .read_timeout(Duration::from_secs(timeouts.read_secs))
        .gzip(true)
        .user_agent(default_user_agent())
}

/// Builds a client with the project defaults.
///
/// # Errors
///
/// Returns the `reqwest` builder error when the TLS backend or system
/// configuration cannot be initialised.
pub fn build_http_client(timeouts: HttpTimeouts) -> Result<Client, reqwest::Error> {
    client_builder(timeouts).build()
}

fn default_user_agent() -> String {
    format!(
        "uploader/{} (+{PROJECT_UA_URL})",
        env!("CARGO_PKG_VERSION")
    )
}
