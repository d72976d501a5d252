//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use uploader_core::auth::{
    CLIENT_ID_ENV, CLIENT_SECRET_ENV, Credentials, CredentialsError, DEFAULT_TOKEN_URL,
    REFRESH_TOKEN_ENV,
};
use uploader_core::fetch::DEFAULT_DRIVE_BASE_URL;
use uploader_core::http_client::{CONNECT_TIMEOUT_SECS, HttpTimeouts, READ_TIMEOUT_SECS};
use uploader_core::pipeline::{DEFAULT_SCRATCH_PATH, DEFAULT_STORE_PATH, Endpoints};
use uploader_core::publish::{DEFAULT_API_BASE_URL, DEFAULT_MAX_RETRIES};
use uploader_core::{PipelineConfig, PrivacyStatus};

const MIB: usize = 1024 * 1024;

/// Publish the next pending video from a CSV work list.
///
/// Each run picks one row whose video has not been published yet, downloads
/// it from its shared drive link, uploads it and records the result back in
/// the CSV.
#[derive(Parser, Debug)]
#[command(name = "uploader")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// CSV work list (columns: gdrive_link, caption, uploaded, video_id)
    #[arg(long = "csv", env = "UPLOADER_CSV", default_value = DEFAULT_STORE_PATH)]
    pub store_path: PathBuf,

    /// Where the downloaded video is staged before upload
    #[arg(long = "scratch", default_value = DEFAULT_SCRATCH_PATH)]
    pub scratch_path: PathBuf,

    /// Visibility of the published video (public, unlisted, private)
    #[arg(short = 'p', long, default_value_t = PrivacyStatus::Public)]
    pub privacy: PrivacyStatus,

    /// Transient upload failures tolerated before giving up (1-30)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..=30))]
    pub max_retries: u32,

    /// Seconds to wait for processing to finish after upload (0 to skip, max 86400)
    #[arg(long, env = "YT_CHECK_PROCESS_SECONDS", default_value_t = 0, value_parser = clap::value_parser!(u64).range(0..=86_400))]
    pub processing_timeout: u64,

    /// Upload chunk size in MiB (1-1024)
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u16).range(1..=1024))]
    pub chunk_mib: u16,

    /// HTTP connect timeout in seconds (1-3600)
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: u64,

    /// Seconds to wait for the next bytes before a transfer is considered stalled (1-3600)
    #[arg(long, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: u64,

    /// Show a download progress bar
    #[arg(long)]
    pub progress: bool,

    /// OAuth client id
    #[arg(long, env = CLIENT_ID_ENV, hide_env_values = true)]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = CLIENT_SECRET_ENV, hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth refresh token with upload scope
    #[arg(long, env = REFRESH_TOKEN_ENV, hide_env_values = true)]
    pub refresh_token: Option<String>,

    #[arg(long, env = "UPLOADER_DRIVE_BASE_URL", default_value = DEFAULT_DRIVE_BASE_URL, hide = true)]
    pub drive_base_url: String,

    #[arg(long, env = "UPLOADER_API_BASE_URL", default_value = DEFAULT_API_BASE_URL, hide = true)]
    pub api_base_url: String,

    #[arg(long, env = "UPLOADER_TOKEN_URL", default_value = DEFAULT_TOKEN_URL, hide = true)]
    pub token_url: String,
}

impl Args {
    /// Collects the run settings.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            store_path: self.store_path.clone(),
            scratch_path: self.scratch_path.clone(),
            privacy: self.privacy,
            max_retries: self.max_retries,
            processing_timeout: Duration::from_secs(self.processing_timeout),
            chunk_size: usize::from(self.chunk_mib) * MIB,
            timeouts: HttpTimeouts {
                connect_secs: self.connect_timeout,
                read_secs: self.read_timeout,
            },
            show_progress: self.progress,
            endpoints: Endpoints {
                drive_base_url: self.drive_base_url.clone(),
                api_base_url: self.api_base_url.clone(),
                token_url: self.token_url.clone(),
            },
        }
    }

    /// Assembles credentials from flags or environment.
    pub fn credentials(&self) -> Result<Credentials, CredentialsError> {
        Credentials::from_values(
            self.client_id.clone(),
            self.client_secret.clone(),
            self.refresh_token.clone(),
        )
    }
}
