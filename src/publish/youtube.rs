//! YouTube Data API v3 implementation of [`PublishApi`].
//!
//! Uploads use the resumable protocol: one POST opens a session and
//! returns its URI in `Location`, then the payload is PUT in chunks, each
//! carrying `Content-Range`. The server answers `308` with a `Range` header
//! while bytes remain and `200`/`201` with the video resource when done.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, instrument, trace};

use super::api::{ChunkOutcome, PublishApi, StatusSnapshot, UploadSession, VideoMetadata};
use super::error::ApiError;
use crate::auth::{AuthError, RefreshTokenProvider};
use crate::http_client::{HttpTimeouts, client_builder};

/// API host used when no override is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com";

/// Chunks must be a multiple of this many bytes (256 KiB).
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

/// Default chunk size (8 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Media type declared for every payload.
pub const MEDIA_TYPE: &str = "video/mp4";

const UPLOAD_PATH: &str = "/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";
const VIDEOS_PATH: &str = "/youtube/v3/videos";

/// Rounds `requested` down to a multiple of [`CHUNK_GRANULARITY`], with a
/// floor of one granule.
#[must_use]
pub fn normalize_chunk_size(requested: usize) -> usize {
    (requested / CHUNK_GRANULARITY).max(1) * CHUNK_GRANULARITY
}

/// Client for the YouTube Data API.
#[derive(Debug, Clone)]
pub struct YouTubeApi {
    client: Client,
    tokens: Arc<RefreshTokenProvider>,
    base_url: String,
    chunk_size: usize,
}

impl YouTubeApi {
    /// Creates a client against the default host.
    ///
    /// Redirects are disabled: the protocol uses `308` for progress.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` builder error if the client cannot be built.
    pub fn new(
        timeouts: HttpTimeouts,
        tokens: Arc<RefreshTokenProvider>,
    ) -> Result<Self, reqwest::Error> {
        let client = client_builder(timeouts)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            tokens,
            base_url: DEFAULT_API_BASE_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Overrides the API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the chunk size, rounded by [`normalize_chunk_size`].
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = normalize_chunk_size(chunk_size);
        self
    }

    /// Effective chunk size in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[async_trait]
impl PublishApi for YouTubeApi {
    #[instrument(skip(self, metadata), fields(path = %path.display()))]
    async fn create_upload(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<Box<dyn UploadSession>, ApiError> {
        let file = File::open(path).await.map_err(|e| ApiError::io(path, e))?;
        let total = file
            .metadata()
            .await
            .map_err(|e| ApiError::io(path, e))?
            .len();
        if total == 0 {
            return Err(ApiError::invalid_response(format!(
                "{} has no bytes to upload",
                path.display()
            )));
        }

        let body = json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "tags": metadata.tags,
            },
            "status": {
                "privacyStatus": metadata.privacy,
            },
        });

        debug!(total, chunk_size = self.chunk_size, "prepared resumable upload");
        Ok(Box::new(ResumableSession {
            client: self.client.clone(),
            tokens: Arc::clone(&self.tokens),
            init_url: format!("{}{UPLOAD_PATH}", self.base_url),
            init_body: body,
            path: path.to_path_buf(),
            file,
            total,
            chunk_size: self.chunk_size as u64,
            session_uri: None,
            offset: 0,
        }))
    }

    #[instrument(skip(self))]
    async fn fetch_status(&self, external_id: &str) -> Result<Option<StatusSnapshot>, ApiError> {
        let token = bearer(&self.tokens).await?;
        let id: String = url::form_urlencoded::byte_serialize(external_id.as_bytes()).collect();
        let url = format!(
            "{}{VIDEOS_PATH}?part=status,processingDetails&id={id}",
            self.base_url
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::network("status lookup", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), body));
        }

        let list: VideoListResponse = response
            .json()
            .await
            .map_err(|e| ApiError::invalid_response(format!("status lookup body: {e}")))?;
        Ok(list.items.into_iter().next().map(VideoResource::into_snapshot))
    }
}

/// One resumable upload against a session URI.
struct ResumableSession {
    client: Client,
    tokens: Arc<RefreshTokenProvider>,
    init_url: String,
    init_body: serde_json::Value,
    path: PathBuf,
    file: File,
    total: u64,
    chunk_size: u64,
    session_uri: Option<String>,
    /// First byte the server has not yet acknowledged.
    offset: u64,
}

impl ResumableSession {
    async fn initiate(&mut self) -> Result<String, ApiError> {
        let token = bearer(&self.tokens).await?;
        let response = self
            .client
            .post(&self.init_url)
            .bearer_auth(token)
            .header("X-Upload-Content-Type", MEDIA_TYPE)
            .header("X-Upload-Content-Length", self.total.to_string())
            .json(&self.init_body)
            .send()
            .await
            .map_err(|e| ApiError::network("upload initiation", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), body));
        }

        let uri = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ApiError::invalid_response("upload initiation returned no Location"))?;
        debug!("resumable session opened");
        Ok(uri)
    }

    async fn read_chunk(&mut self) -> Result<Vec<u8>, ApiError> {
        let end = self.offset.saturating_add(self.chunk_size).min(self.total);
        let len = usize::try_from(end.saturating_sub(self.offset))
            .map_err(|_| ApiError::invalid_response("chunk larger than addressable memory"))?;
        let mut buffer = vec![0u8; len];
        self.file
            .seek(SeekFrom::Start(self.offset))
            .await
            .map_err(|e| ApiError::io(&self.path, e))?;
        self.file
            .read_exact(&mut buffer)
            .await
            .map_err(|e| ApiError::io(&self.path, e))?;
        Ok(buffer)
    }

    #[allow(clippy::cast_precision_loss)]
    fn fraction_sent(&self) -> f64 {
        (self.offset as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl UploadSession for ResumableSession {
    async fn next_chunk(&mut self) -> Result<ChunkOutcome, ApiError> {
        let uri = match &self.session_uri {
            Some(uri) => uri.clone(),
            None => {
                let uri = self.initiate().await?;
                self.session_uri = Some(uri.clone());
                uri
            }
        };

        let chunk = self.read_chunk().await?;
        let content_range = if chunk.is_empty() {
            // Everything is committed; ask the server to finalise.
            format!("bytes */{}", self.total)
        } else {
            let last_byte = self.offset + chunk.len() as u64 - 1;
            format!("bytes {}-{last_byte}/{}", self.offset, self.total)
        };
        trace!(content_range = %content_range, "sending chunk");

        let token = bearer(&self.tokens).await?;
        let response = self
            .client
            .put(&uri)
            .bearer_auth(token)
            .header(CONTENT_TYPE, MEDIA_TYPE)
            .header(CONTENT_RANGE, content_range)
            .body(chunk)
            .send()
            .await
            .map_err(|e| ApiError::network("chunk upload", &e))?;

        match response.status() {
            StatusCode::PERMANENT_REDIRECT => {
                let committed = response
                    .headers()
                    .get(RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(committed_offset)
                    .unwrap_or(0);
                if committed > self.total {
                    return Err(ApiError::invalid_response(format!(
                        "server committed {committed} bytes of a {}-byte payload",
                        self.total
                    )));
                }
                self.offset = committed;
                Ok(ChunkOutcome::Progress(self.fraction_sent()))
            }
            StatusCode::OK | StatusCode::CREATED => {
                let resource: UploadedVideo = response.json().await.map_err(|e| {
                    ApiError::invalid_response(format!("upload completion body: {e}"))
                })?;
                self.offset = self.total;
                Ok(ChunkOutcome::Complete(
                    resource.id.filter(|id| !id.trim().is_empty()),
                ))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ApiError::from_status(status.as_u16(), body))
            }
        }
    }
}

/// Parses a `Range: bytes=0-N` header into the next offset (`N + 1`).
fn committed_offset(range: &str) -> Option<u64> {
    let (_, last) = range.trim().strip_prefix("bytes=")?.split_once('-')?;
    last.trim().parse::<u64>().ok().map(|n| n + 1)
}

async fn bearer(tokens: &RefreshTokenProvider) -> Result<String, ApiError> {
    tokens.access_token().await.map_err(|error| match error {
        AuthError::Network { source } => ApiError::network("token exchange", &source),
        AuthError::Status { status, body } => {
            ApiError::from_status(status, format!("token exchange: {body}"))
        }
        AuthError::InvalidResponse { message } => ApiError::invalid_response(message),
    })
}

#[derive(Deserialize)]
struct UploadedVideo {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    #[serde(default)]
    status: VideoStatus,
    #[serde(default)]
    processing_details: ProcessingDetails,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct VideoStatus {
    upload_status: Option<String>,
    privacy_status: Option<String>,
    failure_reason: Option<String>,
    rejection_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ProcessingDetails {
    processing_status: Option<String>,
}

impl VideoResource {
    fn into_snapshot(self) -> StatusSnapshot {
        StatusSnapshot {
            upload_status: self.status.upload_status,
            processing_status: self.processing_details.processing_status,
            privacy_status: self.status.privacy_status,
            failure_reason: self.status.failure_reason,
            rejection_reason: self.status.rejection_reason,
        }
    }
}
