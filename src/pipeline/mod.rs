//! One-job-per-run orchestration.
//!
//! A run selects the next eligible job, fetches its payload into scratch
//! storage, publishes it, reconciles the terminal state from the
//! publisher's status and writes the result back to the store.
//!
//! The external id is recorded as soon as the upload succeeds, before any
//! status lookup, so a job is never published twice. The scratch file is
//! removed on every exit path.

mod config;
mod error;
mod scratch;

pub use config::{DEFAULT_SCRATCH_PATH, DEFAULT_STORE_PATH, Endpoints, PipelineConfig};
pub use error::{ConfigError, PipelineError};
pub use scratch::ScratchFile;

use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use crate::auth::{Credentials, RefreshTokenProvider};
use crate::clock::Clock;
use crate::fetch::{DriveFetcher, FetchError, PayloadFetcher};
use crate::http_client::build_http_client;
use crate::publish::{PollOutcome, Publisher, RetryPolicy, StatusSnapshot, YouTubeApi};
use crate::store::{CsvJobStore, Job, UploadState};

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No eligible job was found.
    NothingToDo,
    /// A job was published and marked terminal.
    Published {
        /// Position of the job in the store.
        position: usize,
        /// Id assigned by the publisher.
        external_id: String,
        /// Terminal state written to the store.
        state: UploadState,
    },
}

/// Decides the terminal state from the latest status.
///
/// A missing snapshot counts as success.
#[must_use]
pub fn reconcile(snapshot: Option<&StatusSnapshot>) -> UploadState {
    match snapshot {
        Some(snapshot) if snapshot.indicates_failure() => UploadState::Failed,
        _ => UploadState::Done,
    }
}

/// Wires the store, fetcher and publisher together.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    store: CsvJobStore,
    fetcher: Arc<dyn PayloadFetcher>,
    publisher: Publisher,
}

impl Pipeline {
    /// Creates a pipeline from explicit parts.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn PayloadFetcher>,
        publisher: Publisher,
    ) -> Self {
        let store = CsvJobStore::new(config.store_path.clone());
        Self {
            config,
            store,
            fetcher,
            publisher,
        }
    }

    /// Creates the production pipeline: drive fetcher, YouTube API and the
    /// given clock.
    ///
    /// No network traffic happens here; the token exchange is deferred to
    /// the first publish call.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` builder error if an HTTP client cannot be built.
    pub fn with_credentials(
        config: PipelineConfig,
        credentials: Credentials,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, reqwest::Error> {
        let fetcher = DriveFetcher::new(config.timeouts)?
            .with_base_url(config.endpoints.drive_base_url.clone())
            .with_progress(config.show_progress);

        let tokens = RefreshTokenProvider::new(build_http_client(config.timeouts)?, credentials)
            .with_token_url(config.endpoints.token_url.clone());
        let api = YouTubeApi::new(config.timeouts, Arc::new(tokens))?
            .with_base_url(config.endpoints.api_base_url.clone())
            .with_chunk_size(config.chunk_size);

        let publisher = Publisher::new(Arc::new(api), clock)
            .with_retry_policy(RetryPolicy::new(config.max_retries));

        Ok(Self::new(config, Arc::new(fetcher), publisher))
    }

    /// The store this pipeline works on.
    #[must_use]
    pub fn store(&self) -> &CsvJobStore {
        &self.store
    }

    /// Processes at most one job.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Store`] if the store cannot be read or updated
    /// - [`PipelineError::Fetch`] if the payload cannot be fetched; the job
    ///   stays pending
    /// - [`PipelineError::Publish`] if the upload fails; the job stays
    ///   pending
    #[instrument(skip(self), fields(store = %self.store.path().display()))]
    pub async fn run_once(&self) -> Result<RunOutcome, PipelineError> {
        let next = self.store.select_next().map_err(|e| {
            error!(stage = "store", error = %e, "could not select next job");
            PipelineError::from(e)
        })?;
        let Some(job) = next else {
            info!("No pending jobs. Nothing to do.");
            return Ok(RunOutcome::NothingToDo);
        };

        info!(position = job.position, reference = %job.source_reference, "processing job");
        let result = self.process(&job).await;
        if let Err(e) = &result {
            error!(
                position = job.position,
                reference = %job.source_reference,
                stage = e.stage(),
                error = %e,
                "run failed"
            );
        }
        result
    }

    async fn process(&self, job: &Job) -> Result<RunOutcome, PipelineError> {
        let scratch = ScratchFile::arm(&self.config.scratch_path);
        let fetch_failed = |source: FetchError| PipelineError::Fetch {
            position: job.position,
            reference: job.source_reference.clone(),
            source,
        };

        if let Some(parent) = scratch.path().parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| fetch_failed(FetchError::io(parent, e)))?;
        }

        info!("Downloading...");
        self.fetcher
            .fetch(&job.source_reference, scratch.path())
            .await
            .map_err(fetch_failed)?;

        info!("Uploading...");
        let receipt = self
            .publisher
            .upload(scratch.path(), &job.caption, self.config.privacy)
            .await
            .map_err(|source| PipelineError::Publish {
                position: job.position,
                source,
            })?;
        let external_id = receipt.external_id;

        self.store
            .record_external_id(job.position, &external_id)
            .inspect_err(|e| {
                error!(external_id = %external_id, error = %e, "published but the id could not be recorded");
            })?;

        let mut polled = None;
        if !self.config.processing_timeout.is_zero() {
            let outcome = self
                .publisher
                .poll_processing_status(&external_id, self.config.processing_timeout)
                .await;
            debug!(?outcome, "processing poll finished");
            if let PollOutcome::Terminal(snapshot) = outcome {
                polled = Some(snapshot);
            }
        }

        // Fall back to the poll's terminal snapshot when the final lookup fails.
        let snapshot = self.publisher.get_status(&external_id).await.or(polled);
        let state = reconcile(snapshot.as_ref());
        if let Some(snapshot) = &snapshot {
            info!(
                upload_status = ?snapshot.upload_status,
                processing_status = ?snapshot.processing_status,
                "status before marking"
            );
        }

        self.store
            .mark_terminal(job.position, Some(&external_id), state)?;
        info!(position = job.position, external_id = %external_id, state = %state, "job complete");

        Ok(RunOutcome::Published {
            position: job.position,
            external_id,
            state,
        })
    }
}
