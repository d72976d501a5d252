//! Error types for the pipeline module.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::publish::PublishError;
use crate::store::StoreError;

/// Why a run stopped before reconciling its job.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The job store could not be read or updated.
    #[error("job store error: {0}")]
    Store(#[from] StoreError),

    /// The payload could not be fetched. The job is still pending.
    #[error("fetch failed for job {position} ({reference}): {source}")]
    Fetch {
        /// Position of the job in the store.
        position: usize,
        /// The job's source reference.
        reference: String,
        /// The underlying fetch error.
        #[source]
        source: FetchError,
    },

    /// The upload did not complete. The job is still pending.
    #[error("publish failed for job {position}: {source}")]
    Publish {
        /// Position of the job in the store.
        position: usize,
        /// The underlying publish error.
        #[source]
        source: PublishError,
    },
}

impl PipelineError {
    /// Name of the stage that failed, for logs.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Store(_) => "store",
            Self::Fetch { .. } => "fetch",
            Self::Publish { .. } => "publish",
        }
    }
}

/// A configuration value is out of range.
#[derive(Debug, Error)]
#[error("invalid configuration for {field}: {reason}")]
pub struct ConfigError {
    /// The offending setting.
    pub field: &'static str,
    /// Why it was rejected.
    pub reason: String,
}
