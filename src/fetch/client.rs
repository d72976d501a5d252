//! Streaming fetcher for publicly shared drive files.

use std::fmt;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::error::FetchError;
use super::reference::{
    DEFAULT_DRIVE_BASE_URL, direct_download_url_with_base, extract_confirm_token,
    resolve_identifier,
};
use crate::http_client::{HttpTimeouts, build_http_client};

/// Size of the write buffer between the network stream and the file.
const WRITE_BUFFER_BYTES: usize = 32 * 1024;

const PROGRESS_TEMPLATE: &str =
    "{msg} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Places the payload behind a source reference at a local path.
#[async_trait]
pub trait PayloadFetcher: Send + Sync + fmt::Debug {
    /// Fetches `source_reference` into `destination` and returns the path
    /// written.
    async fn fetch(&self, source_reference: &str, destination: &Path)
    -> Result<PathBuf, FetchError>;
}

/// Downloads share-link payloads into local scratch storage.
///
/// Created once per run and reused; the inner client pools connections.
/// There is no retry at this layer.
#[derive(Debug, Clone)]
pub struct DriveFetcher {
    client: Client,
    base_url: String,
    show_progress: bool,
}

impl DriveFetcher {
    /// Creates a fetcher for the default content host.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` builder error if the client cannot be built.
    pub fn new(timeouts: HttpTimeouts) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(timeouts)?))
    }

    /// Creates a fetcher around an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_DRIVE_BASE_URL.to_string(),
            show_progress: false,
        }
    }

    /// Overrides the content host (mirrors, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Enables a terminal progress bar for byte progress.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Resolves `source_reference`, downloads the payload and writes it to
    /// `destination`, replacing any existing file.
    ///
    /// A partially written destination is removed on error.
    ///
    /// # Errors
    ///
    /// - [`FetchError::UnresolvableReference`] for an unrecognised link
    /// - [`FetchError::HttpStatus`], [`FetchError::Network`],
    ///   [`FetchError::Timeout`] for transfer failures
    /// - [`FetchError::UnexpectedHtml`] when the host serves a page without
    ///   a usable confirmation token
    /// - [`FetchError::Io`] when the destination cannot be written
    #[instrument(skip(self), fields(destination = %destination.display()))]
    pub async fn fetch(
        &self,
        source_reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, FetchError> {
        let id = resolve_identifier(source_reference)?;
        let url = direct_download_url_with_base(&self.base_url, &id, None);
        debug!(id = %id, url = %url, "starting fetch");

        let mut response = self.send(&url).await?;
        let mut final_url = url;

        if is_html(&response) {
            let page = response
                .text()
                .await
                .map_err(|e| FetchError::network(final_url.clone(), e))?;
            let Some(token) = extract_confirm_token(&page) else {
                return Err(FetchError::UnexpectedHtml { url: final_url });
            };
            debug!("large-file interstitial detected, retrying with confirmation token");
            final_url = direct_download_url_with_base(&self.base_url, &id, Some(&token));
            response = self.send(&final_url).await?;
            if is_html(&response) {
                return Err(FetchError::UnexpectedHtml { url: final_url });
            }
        }

        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let progress = self.progress_bar(total);

        let file = File::create(destination)
            .await
            .map_err(|e| FetchError::io(destination, e))?;

        let result = stream_to_file(file, response, &final_url, destination, &progress).await;
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(error) => {
                progress.abandon();
                debug!(path = %destination.display(), "cleaning up partial file after error");
                if let Err(cleanup) = tokio::fs::remove_file(destination).await {
                    warn!(path = %destination.display(), error = %cleanup, "failed to remove partial file");
                }
                return Err(error);
            }
        };

        progress.finish_and_clear();
        info!(path = %destination.display(), bytes, "fetch complete");
        Ok(destination.to_path_buf())
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.show_progress || !std::io::stderr().is_terminal() {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total.unwrap_or(0));
        match ProgressStyle::with_template(PROGRESS_TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("=> ")),
            Err(error) => debug!(error = %error, "invalid progress template, using default style"),
        }
        bar.set_message("Downloading");
        bar
    }
}

#[async_trait]
impl PayloadFetcher for DriveFetcher {
    async fn fetch(
        &self,
        source_reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, FetchError> {
        DriveFetcher::fetch(self, source_reference, destination).await
    }
}

fn is_html(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("text/html"))
}

/// Streams the response body to `file`, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
    progress: &ProgressBar,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(path, e))?;
        bytes_written += chunk.len() as u64;
        progress.inc(chunk.len() as u64);
    }

    writer.flush().await.map_err(|e| FetchError::io(path, e))?;
    debug!(bytes_written, "payload flushed");
    Ok(bytes_written)
}
