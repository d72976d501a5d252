//! The publishing API seam and the values that cross it.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;

use super::error::ApiError;

/// Longest title the platform accepts, in characters.
pub const MAX_TITLE_CHARS: usize = 90;

/// Title used when the caption is blank.
pub const FALLBACK_TITLE: &str = "Uploaded with bot";

/// Visibility of a published item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    /// Listed and visible to everyone.
    #[default]
    Public,
    /// Reachable by link only.
    Unlisted,
    /// Visible to the owner only.
    Private,
}

impl PrivacyStatus {
    /// Wire value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "unlisted" => Ok(Self::Unlisted),
            "private" => Ok(Self::Private),
            other => Err(format!(
                "unknown privacy status '{other}' (expected public, unlisted or private)"
            )),
        }
    }
}

/// Descriptive fields sent with an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    /// Title, at most [`MAX_TITLE_CHARS`] characters.
    pub title: String,
    /// Full caption.
    pub description: String,
    /// Always empty today.
    pub tags: Vec<String>,
    /// Visibility.
    pub privacy: PrivacyStatus,
}

impl VideoMetadata {
    /// Derives metadata from a job caption.
    ///
    /// # Examples
    ///
    /// ```
    /// use uploader_core::publish::{PrivacyStatus, VideoMetadata};
    ///
    /// let metadata = VideoMetadata::from_caption("  ", PrivacyStatus::Public);
    /// assert_eq!(metadata.title, "Uploaded with bot");
    /// ```
    #[must_use]
    pub fn from_caption(caption: &str, privacy: PrivacyStatus) -> Self {
        let title = if caption.trim().is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            caption.chars().take(MAX_TITLE_CHARS).collect()
        };
        Self {
            title,
            description: caption.to_string(),
            tags: Vec::new(),
            privacy,
        }
    }
}

/// Result of sending one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// More bytes remain; the fraction sent so far, in `0.0..=1.0`.
    Progress(f64),
    /// The platform accepted the payload. `None` when the completion body
    /// carried no id.
    Complete(Option<String>),
}

/// Publisher-side state of an uploaded item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// e.g. `uploaded`, `processed`, `rejected`, `failed`.
    pub upload_status: Option<String>,
    /// e.g. `processing`, `succeeded`, `failed`, `terminated`.
    pub processing_status: Option<String>,
    /// Effective visibility.
    pub privacy_status: Option<String>,
    /// Reason given when upload status is `failed`.
    pub failure_reason: Option<String>,
    /// Reason given when upload status is `rejected`.
    pub rejection_reason: Option<String>,
}

impl StatusSnapshot {
    /// True when the upload was rejected or failed, or processing failed.
    #[must_use]
    pub fn indicates_failure(&self) -> bool {
        matches!(
            normalized(self.upload_status.as_deref()).as_deref(),
            Some("rejected" | "failed")
        ) || normalized(self.processing_status.as_deref()).as_deref() == Some("failed")
    }

    /// True once nothing more is expected to change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.indicates_failure()
            || normalized(self.processing_status.as_deref()).as_deref() == Some("succeeded")
    }
}

fn normalized(value: Option<&str>) -> Option<String> {
    value.map(|v| v.trim().to_ascii_lowercase())
}

/// Operations the publisher needs from a platform.
#[async_trait]
pub trait PublishApi: Send + Sync + fmt::Debug {
    /// Prepares a resumable upload of the file at `path`. No bytes are sent
    /// until the first [`UploadSession::next_chunk`].
    async fn create_upload(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<Box<dyn UploadSession>, ApiError>;

    /// Looks up an item's state. `Ok(None)` when the platform does not know
    /// the id.
    async fn fetch_status(&self, external_id: &str) -> Result<Option<StatusSnapshot>, ApiError>;
}

/// One in-progress resumable upload.
#[async_trait]
pub trait UploadSession: Send {
    /// Sends the next chunk, or re-sends the last one after a failure.
    async fn next_chunk(&mut self) -> Result<ChunkOutcome, ApiError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Metadata Tests ====================

    #[test]
    fn test_title_truncated_to_ninety_chars() {
        let caption = "a".repeat(150);
        let metadata = VideoMetadata::from_caption(&caption, PrivacyStatus::Public);
        assert_eq!(metadata.title.chars().count(), 90);
        assert_eq!(metadata.description, caption);
    }

    #[test]
    fn test_title_truncation_counts_chars_not_bytes() {
        let caption = "é".repeat(100);
        let metadata = VideoMetadata::from_caption(&caption, PrivacyStatus::Public);
        assert_eq!(metadata.title, "é".repeat(90));
    }

    #[test]
    fn test_blank_caption_uses_fallback_title() {
        let metadata = VideoMetadata::from_caption("", PrivacyStatus::Private);
        assert_eq!(metadata.title, FALLBACK_TITLE);
        assert_eq!(metadata.description, "");
        assert!(metadata.tags.is_empty());
        assert_eq!(metadata.privacy, PrivacyStatus::Private);
    }

    // ==================== PrivacyStatus Tests ====================

    #[test]
    fn test_privacy_status_parse() {
        assert_eq!("public".parse::<PrivacyStatus>().unwrap(), PrivacyStatus::Public);
        assert_eq!("Unlisted".parse::<PrivacyStatus>().unwrap(), PrivacyStatus::Unlisted);
        assert_eq!(" PRIVATE ".parse::<PrivacyStatus>().unwrap(), PrivacyStatus::Private);
        assert!("secret".parse::<PrivacyStatus>().is_err());
    }

    #[test]
    fn test_privacy_status_default_and_serde() {
        assert_eq!(PrivacyStatus::default(), PrivacyStatus::Public);
        assert_eq!(
            serde_json::to_string(&PrivacyStatus::Unlisted).unwrap(),
            "\"unlisted\""
        );
    }

    // ==================== StatusSnapshot Tests ====================

    fn snapshot(upload: Option<&str>, processing: Option<&str>) -> StatusSnapshot {
        StatusSnapshot {
            upload_status: upload.map(str::to_string),
            processing_status: processing.map(str::to_string),
            ..StatusSnapshot::default()
        }
    }

    #[test]
    fn test_snapshot_failure_conditions() {
        assert!(snapshot(Some("rejected"), None).indicates_failure());
        assert!(snapshot(Some("failed"), Some("processing")).indicates_failure());
        assert!(snapshot(Some("uploaded"), Some("failed")).indicates_failure());
        assert!(!snapshot(Some("uploaded"), Some("processing")).indicates_failure());
        assert!(!snapshot(None, None).indicates_failure());
    }

    #[test]
    fn test_snapshot_terminal_conditions() {
        assert!(snapshot(Some("processed"), Some("succeeded")).is_terminal());
        assert!(snapshot(Some("rejected"), None).is_terminal());
        assert!(!snapshot(Some("uploaded"), Some("processing")).is_terminal());
        assert!(!StatusSnapshot::default().is_terminal());
    }
}
