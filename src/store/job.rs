//! Job record types and upload-state definitions.

use std::fmt;

/// Column holding the share link of the source payload.
pub const SOURCE_COLUMN: &str = "gdrive_link";

/// Column holding the free-text caption.
pub const CAPTION_COLUMN: &str = "caption";

/// Column holding the upload state marker.
pub const STATE_COLUMN: &str = "uploaded";

/// Column holding the publisher-assigned id.
pub const EXTERNAL_ID_COLUMN: &str = "video_id";

/// Marker written for [`UploadState::Done`].
pub const DONE_MARKER: &str = "yes";

/// Marker written for [`UploadState::Failed`].
pub const FAILED_MARKER: &str = "failed";

/// Lifecycle state of a job record.
///
/// Only `Pending` rows are eligible for processing. Transitions go
/// `Pending -> Done` or `Pending -> Failed` and are never reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadState {
    /// Not yet published (also the reading of an absent or unknown marker).
    Pending,
    /// Published and accepted.
    Done,
    /// Published, but the platform rejected it or failed to process it.
    Failed,
}

impl UploadState {
    /// Parses a stored marker. Comparison is trimmed and case-insensitive;
    /// anything that is neither the done nor the failed marker is pending.
    #[must_use]
    pub fn from_marker(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            DONE_MARKER => Self::Done,
            FAILED_MARKER => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Returns the marker written to the store.
    #[must_use]
    pub fn as_marker(&self) -> &'static str {
        match self {
            Self::Pending => "",
            Self::Done => DONE_MARKER,
            Self::Failed => FAILED_MARKER,
        }
    }

    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// The unit of work handed to the pipeline by [`select_next`](super::CsvJobStore::select_next).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Zero-based data-row ordinal. Stable only between reads.
    pub position: usize,
    /// Opaque string locating the remote payload.
    pub source_reference: String,
    /// Free text used for the published title and description.
    pub caption: String,
}

/// Full view of one stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    /// Zero-based data-row ordinal.
    pub position: usize,
    /// Opaque string locating the remote payload.
    pub source_reference: String,
    /// Free-text caption.
    pub caption: String,
    /// Parsed upload state.
    pub upload_state: UploadState,
    /// Publisher-assigned id, `None` when empty.
    pub external_id: Option<String>,
}

impl JobRecord {
    /// A record is eligible when it is not done and carries no external id.
    ///
    /// The external-id check is what keeps a crash between publishing and
    /// marking the row from publishing the same payload twice.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.upload_state != UploadState::Done && self.external_id.is_none()
    }

    /// Drops the bookkeeping fields.
    #[must_use]
    pub fn into_job(self) -> Job {
        Job {
            position: self.position,
            source_reference: self.source_reference,
            caption: self.caption,
        }
    }
}
