//! Upload state machine, status polling and soft status lookup.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use super::api::{ChunkOutcome, PrivacyStatus, PublishApi, StatusSnapshot, VideoMetadata};
use super::error::{ApiError, PublishError};
use super::retry::{RetryDecision, RetryPolicy};
use crate::clock::Clock;

/// Interval between processing-status checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Where an upload session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no chunk sent yet.
    Init,
    /// At least one chunk sent, more remain.
    ChunkSending,
    /// The platform returned an id.
    Complete,
    /// Gave up.
    Failed,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Id assigned by the platform.
    pub external_id: String,
    /// Transient failures survived along the way.
    pub retries: u32,
    /// Chunks acknowledged, including the final one.
    pub chunks: u32,
}

/// How processing-status polling ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Processing reached a final state.
    Terminal(StatusSnapshot),
    /// Time ran out; the last snapshot seen, if any.
    TimedOut {
        /// Most recent snapshot.
        last: Option<StatusSnapshot>,
    },
}

/// Drives uploads through a [`PublishApi`].
#[derive(Debug, Clone)]
pub struct Publisher {
    api: Arc<dyn PublishApi>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
}

impl Publisher {
    /// Creates a publisher with the default retry budget.
    #[must_use]
    pub fn new(api: Arc<dyn PublishApi>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            clock,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Uploads the file at `path`, described by `caption`.
    ///
    /// Transient chunk failures are retried with backoff on the injected
    /// clock until the retry budget is spent. Permanent failures end the
    /// upload immediately.
    ///
    /// # Errors
    ///
    /// - [`PublishError::EmptyPayload`] for a zero-byte file
    /// - [`PublishError::RetriesExhausted`] once the budget is spent
    /// - [`PublishError::Rejected`] on a permanent failure
    /// - [`PublishError::MissingExternalId`] when completion carries no id
    #[instrument(skip(self, caption), fields(path = %path.display(), privacy = %privacy))]
    pub async fn upload(
        &self,
        path: &Path,
        caption: &str,
        privacy: PrivacyStatus,
    ) -> Result<UploadReceipt, PublishError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| PublishError::Rejected {
                source: ApiError::io(path, e),
            })?
            .len();
        if size == 0 {
            return Err(PublishError::EmptyPayload {
                path: path.to_path_buf(),
            });
        }

        let metadata = VideoMetadata::from_caption(caption, privacy);
        debug!(title = %metadata.title, size, "starting upload");
        let mut session = self
            .api
            .create_upload(path, &metadata)
            .await
            .map_err(|source| PublishError::Rejected { source })?;

        let mut state = SessionState::Init;
        let mut retries: u32 = 0;
        let mut chunks: u32 = 0;

        loop {
            match session.next_chunk().await {
                Ok(ChunkOutcome::Progress(fraction)) => {
                    chunks += 1;
                    state = SessionState::ChunkSending;
                    info!(chunks, "Upload progress: {:.0}%", fraction * 100.0);
                }
                Ok(ChunkOutcome::Complete(Some(external_id))) => {
                    chunks += 1;
                    state = SessionState::Complete;
                    info!(external_id = %external_id, chunks, retries, ?state, "upload finished");
                    return Ok(UploadReceipt {
                        external_id,
                        retries,
                        chunks,
                    });
                }
                Ok(ChunkOutcome::Complete(None)) => {
                    error!(?state, "upload completed without an id");
                    return Err(PublishError::MissingExternalId);
                }
                Err(api_error) => {
                    let failures = if api_error.is_transient() {
                        retries + 1
                    } else {
                        retries
                    };
                    match self.retry_policy.should_retry(&api_error, failures) {
                        RetryDecision::Retry { delay, attempt } => {
                            retries = attempt;
                            warn!(
                                error = %api_error,
                                attempt,
                                delay_ms = delay.as_millis(),
                                ?state,
                                "transient upload failure, retrying"
                            );
                            self.clock.sleep(delay).await;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            state = SessionState::Failed;
                            error!(error = %api_error, reason = %reason, ?state, "upload failed");
                            return Err(if api_error.is_transient() {
                                PublishError::RetriesExhausted {
                                    attempts: failures,
                                    last: api_error,
                                }
                            } else {
                                PublishError::Rejected { source: api_error }
                            });
                        }
                    }
                }
            }
        }
    }

    /// Polls processing status every [`POLL_INTERVAL`] until it becomes
    /// terminal or `timeout` has elapsed on the injected clock.
    ///
    /// Lookup errors are logged and polling continues.
    #[instrument(skip(self), fields(timeout_secs = timeout.as_secs()))]
    pub async fn poll_processing_status(&self, external_id: &str, timeout: Duration) -> PollOutcome {
        let start = self.clock.now();
        let mut last = None;

        while self.clock.now().duration_since(start) < timeout {
            match self.api.fetch_status(external_id).await {
                Ok(Some(snapshot)) => {
                    info!(
                        upload_status = ?snapshot.upload_status,
                        processing_status = ?snapshot.processing_status,
                        "processing status"
                    );
                    if snapshot.is_terminal() {
                        if snapshot.indicates_failure() {
                            error!(
                                failure_reason = ?snapshot.failure_reason,
                                rejection_reason = ?snapshot.rejection_reason,
                                "processing failed"
                            );
                        } else {
                            info!("processing completed successfully");
                        }
                        return PollOutcome::Terminal(snapshot);
                    }
                    last = Some(snapshot);
                }
                Ok(None) => debug!("item not visible yet"),
                Err(lookup_error) => {
                    warn!(error = %lookup_error, "status lookup failed while polling");
                }
            }
            self.clock.sleep(POLL_INTERVAL).await;
        }

        info!("processing status polling timed out");
        PollOutcome::TimedOut { last }
    }

    /// One status lookup. Failures are logged and reported as `None`.
    #[instrument(skip(self))]
    pub async fn get_status(&self, external_id: &str) -> Option<StatusSnapshot> {
        match self.api.fetch_status(external_id).await {
            Ok(snapshot) => {
                debug!(found = snapshot.is_some(), "status lookup complete");
                snapshot
            }
            Err(lookup_error) => {
                warn!(error = %lookup_error, "status lookup failed");
                None
            }
        }
    }
}
