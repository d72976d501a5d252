//! Retrieval of media payloads from public share links.
//!
//! A share link is reduced to a file id ([`resolve_identifier`]), turned
//! into a direct-download URL and streamed to local storage by
//! [`DriveFetcher`]. Hosts that interpose a large-file confirmation page
//! are handled by re-requesting once with the page's confirmation token.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use uploader_core::HttpTimeouts;
//! use uploader_core::fetch::DriveFetcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = DriveFetcher::new(HttpTimeouts::default())?;
//! fetcher
//!     .fetch(
//!         "https://drive.google.com/file/d/XYZ9/view?usp=sharing",
//!         Path::new("videos/tmp_video.mp4"),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod reference;

pub use client::{DriveFetcher, PayloadFetcher};
pub use error::FetchError;
pub use reference::{
    DEFAULT_DRIVE_BASE_URL, direct_download_url, direct_download_url_with_base,
    extract_confirm_token, resolve_identifier,
};
