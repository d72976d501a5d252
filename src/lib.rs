//! Uploader Core Library
//!
//! Moves media files from publicly shared drive links to a publishing
//! platform, one job per run, driven by a CSV work list.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`store`] - CSV job table with at-most-once selection and atomic updates
//! - [`fetch`] - Share-link resolution and streaming payload download
//! - [`publish`] - Resumable chunked upload with bounded backoff and status polling
//! - [`auth`] - OAuth credentials and lazy access-token exchange
//! - [`clock`] - Injectable time source for backoff and polling
//! - [`pipeline`] - Select, fetch, publish, reconcile and record, with scratch cleanup

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod clock;
pub mod fetch;
pub mod http_client;
pub mod pipeline;
pub mod publish;
pub mod store;
#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use auth::{Credentials, CredentialsError, RefreshTokenProvider};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fetch::{DriveFetcher, FetchError, PayloadFetcher, resolve_identifier};
pub use http_client::{HttpTimeouts, build_http_client};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, RunOutcome};
pub use publish::{
    ApiError, PrivacyStatus, PublishApi, PublishError, Publisher, StatusSnapshot, YouTubeApi,
};
pub use store::{CsvJobStore, Job, StoreError, UploadState};
