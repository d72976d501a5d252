//! Resumable publishing of local payloads.
//!
//! [`Publisher`] drives an upload session chunk by chunk through the
//! [`PublishApi`] seam, survives transient failures with bounded
//! exponential backoff ([`RetryPolicy`]) and can poll the platform until
//! asynchronous processing settles. [`YouTubeApi`] is the production
//! implementation of the seam.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use uploader_core::HttpTimeouts;
//! use uploader_core::auth::{Credentials, RefreshTokenProvider};
//! use uploader_core::clock::SystemClock;
//! use uploader_core::publish::{PrivacyStatus, Publisher, YouTubeApi};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::from_values(
//!     std::env::var("CLIENT_ID").ok(),
//!     std::env::var("CLIENT_SECRET").ok(),
//!     std::env::var("REFRESH_TOKEN").ok(),
//! )?;
//! let tokens = RefreshTokenProvider::new(reqwest::Client::new(), credentials);
//! let api = YouTubeApi::new(HttpTimeouts::default(), Arc::new(tokens))?;
//! let publisher = Publisher::new(Arc::new(api), Arc::new(SystemClock));
//!
//! let receipt = publisher
//!     .upload(Path::new("videos/tmp_video.mp4"), "My video", PrivacyStatus::Public)
//!     .await?;
//! println!("published as {}", receipt.external_id);
//! # Ok(())
//! # }
//! ```

mod api;
mod error;
mod retry;
mod uploader;
mod youtube;

pub use api::{
    ChunkOutcome, FALLBACK_TITLE, MAX_TITLE_CHARS, PrivacyStatus, PublishApi, StatusSnapshot,
    UploadSession, VideoMetadata,
};
pub use error::{ApiError, PublishError, classify_status};
pub use retry::{DEFAULT_MAX_RETRIES, RetryDecision, RetryPolicy, backoff_delay};
pub use uploader::{POLL_INTERVAL, PollOutcome, Publisher, SessionState, UploadReceipt};
pub use youtube::{
    CHUNK_GRANULARITY, DEFAULT_API_BASE_URL, DEFAULT_CHUNK_SIZE, MEDIA_TYPE, YouTubeApi,
    normalize_chunk_size,
};

#[cfg(test)]
pub(crate) use uploader::tests as scripted;
