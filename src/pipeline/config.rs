//! Settings for one pipeline run.

use std::path::PathBuf;
use std::time::Duration;

use super::error::ConfigError;
use crate::auth::DEFAULT_TOKEN_URL;
use crate::fetch::DEFAULT_DRIVE_BASE_URL;
use crate::http_client::HttpTimeouts;
use crate::publish::{
    CHUNK_GRANULARITY, DEFAULT_API_BASE_URL, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES,
    PrivacyStatus,
};

/// Default job store location.
pub const DEFAULT_STORE_PATH: &str = "data/uploads.csv";

/// Default scratch payload location.
pub const DEFAULT_SCRATCH_PATH: &str = "videos/tmp_video.mp4";

/// Remote hosts the pipeline talks to. Overridden for mirrors and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Content host serving shared payloads.
    pub drive_base_url: String,
    /// Publishing API host.
    pub api_base_url: String,
    /// OAuth token endpoint.
    pub token_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            drive_base_url: DEFAULT_DRIVE_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

/// Everything a run needs besides credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// CSV job store.
    pub store_path: PathBuf,
    /// Where the payload is staged between fetch and upload.
    pub scratch_path: PathBuf,
    /// Visibility of published items.
    pub privacy: PrivacyStatus,
    /// Transient failures tolerated per upload.
    pub max_retries: u32,
    /// How long to poll for processing to settle; zero disables polling.
    pub processing_timeout: Duration,
    /// Upload chunk size in bytes.
    pub chunk_size: usize,
    /// HTTP timeouts for every client.
    pub timeouts: HttpTimeouts,
    /// Draw a download progress bar.
    pub show_progress: bool,
    /// Remote hosts.
    pub endpoints: Endpoints,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            scratch_path: PathBuf::from(DEFAULT_SCRATCH_PATH),
            privacy: PrivacyStatus::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            processing_timeout: Duration::ZERO,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeouts: HttpTimeouts::default(),
            show_progress: false,
            endpoints: Endpoints::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks values that the type system cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError {
                field: "max_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scratch_path.file_name().is_none() {
            return Err(ConfigError {
                field: "scratch_path",
                reason: format!("'{}' does not name a file", self.scratch_path.display()),
            });
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(ConfigError {
                field: "store_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.chunk_size < CHUNK_GRANULARITY {
            return Err(ConfigError {
                field: "chunk_size",
                reason: format!("must be at least {CHUNK_GRANULARITY} bytes"),
            });
        }
        if self.timeouts.connect_secs == 0 || self.timeouts.read_secs == 0 {
            return Err(ConfigError {
                field: "timeouts",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
