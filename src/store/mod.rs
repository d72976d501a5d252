//! CSV-backed job store.
//!
//! The store is a flat table read in full on every call and rewritten
//! wholesale on every mutation. Rewrites go to a temporary file in the same
//! directory which is then renamed over the original, so readers only ever
//! observe the previous or the new committed table.
//!
//! # Concurrency
//!
//! There is no locking. Selecting a job and later marking it is not a
//! transaction across processes, so two runs must never operate on the same
//! store at the same time. Serial invocation is a precondition of callers.
//!
//! # Example
//!
//! ```no_run
//! use uploader_core::store::{CsvJobStore, UploadState};
//!
//! # fn example() -> Result<(), uploader_core::store::StoreError> {
//! let store = CsvJobStore::new("data/uploads.csv");
//! if let Some(job) = store.select_next()? {
//!     // ... publish ...
//!     store.mark_terminal(job.position, Some("dQw4w9WgXcQ"), UploadState::Done)?;
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod job;

pub use error::StoreError;
pub use job::{
    CAPTION_COLUMN, DONE_MARKER, EXTERNAL_ID_COLUMN, FAILED_MARKER, Job, JobRecord, SOURCE_COLUMN,
    STATE_COLUMN, UploadState,
};

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Handle to a CSV job table on disk.
#[derive(Debug, Clone)]
pub struct CsvJobStore {
    path: PathBuf,
}

impl CsvJobStore {
    /// Creates a handle. The file is not touched until the first call.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreRead`] if the file cannot be opened and
    /// [`StoreError::Parse`] if it is not valid CSV.
    pub fn load(&self) -> Result<JobTable> {
        JobTable::read(&self.path)
    }

    /// Every record in store order.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`load`](Self::load).
    pub fn jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self.load()?.records())
    }

    /// Returns the first eligible job in store order.
    ///
    /// A row is eligible when its state is not done and its external id is
    /// empty. Rows with an id are skipped even when still pending.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`load`](Self::load).
    #[instrument(skip(self), fields(store = %self.path.display()))]
    pub fn select_next(&self) -> Result<Option<Job>> {
        let table = self.load()?;
        let selected = table.select_next();
        match &selected {
            Some(job) => debug!(position = job.position, "selected next job"),
            None => debug!(rows = table.len(), "no eligible job"),
        }
        Ok(selected)
    }

    /// Records the terminal state of a job, and its external id when given.
    ///
    /// Calling this twice with the same arguments is a no-op the second time.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidPosition`] if `position` is out of range
    /// - [`StoreError::InvalidTransition`] if `state` is pending or the row
    ///   is already done with a different state requested. A failed row
    ///   stays retryable and may be overwritten.
    /// - [`StoreError::StoreWrite`] if the table cannot be persisted
    #[instrument(skip(self), fields(store = %self.path.display()))]
    pub fn mark_terminal(
        &self,
        position: usize,
        external_id: Option<&str>,
        state: UploadState,
    ) -> Result<()> {
        let mut table = self.load()?;
        table.check_position(position)?;

        let current = table.upload_state(position);
        if !state.is_terminal() || (current == UploadState::Done && state != UploadState::Done) {
            return Err(StoreError::InvalidTransition {
                position,
                from: current,
                to: state,
            });
        }

        table.set_field(position, STATE_COLUMN, state.as_marker());
        let external_id = external_id.map(str::trim).filter(|id| !id.is_empty());
        match external_id {
            Some(id) => table.set_field(position, EXTERNAL_ID_COLUMN, id),
            None => {
                table.ensure_column(EXTERNAL_ID_COLUMN);
            }
        }

        table.write_atomic(&self.path)?;
        info!(position, state = %state, external_id = ?external_id, "job marked terminal");
        Ok(())
    }

    /// Durably records the publisher-assigned id without changing the state.
    ///
    /// Called as soon as the publisher accepts a payload so that a failure in
    /// any later step cannot cause the same job to be published again.
    ///
    /// # Errors
    ///
    /// - [`StoreError::EmptyExternalId`] if `external_id` is blank
    /// - [`StoreError::InvalidPosition`] if `position` is out of range
    /// - [`StoreError::StoreWrite`] if the table cannot be persisted
    #[instrument(skip(self), fields(store = %self.path.display()))]
    pub fn record_external_id(&self, position: usize, external_id: &str) -> Result<()> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(StoreError::EmptyExternalId { position });
        }

        let mut table = self.load()?;
        table.check_position(position)?;
        table.set_field(position, EXTERNAL_ID_COLUMN, external_id);
        table.write_atomic(&self.path)?;

        debug!(position, external_id, "external id recorded");
        Ok(())
    }
}

/// In-memory copy of the job table.
///
/// Columns the pipeline does not know about are kept verbatim so a rewrite
/// never loses data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl JobTable {
    fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| StoreError::read(path, e))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| StoreError::parse(path, e))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| StoreError::parse(path, e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header names in file order.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Raw field value, empty when the column or the field is absent.
    #[must_use]
    pub fn field(&self, position: usize, column: &str) -> &str {
        self.column_index(column)
            .and_then(|index| self.rows.get(position)?.get(index))
            .map_or("", String::as_str)
    }

    /// Returns the full record at `position`.
    #[must_use]
    pub fn record(&self, position: usize) -> Option<JobRecord> {
        if position >= self.rows.len() {
            return None;
        }
        let external_id = self.field(position, EXTERNAL_ID_COLUMN).trim();
        Some(JobRecord {
            position,
            source_reference: self.field(position, SOURCE_COLUMN).to_string(),
            caption: self.field(position, CAPTION_COLUMN).to_string(),
            upload_state: self.upload_state(position),
            external_id: (!external_id.is_empty()).then(|| external_id.to_string()),
        })
    }

    /// All records in store order.
    #[must_use]
    pub fn records(&self) -> Vec<JobRecord> {
        (0..self.rows.len())
            .filter_map(|position| self.record(position))
            .collect()
    }

    /// First eligible job in store order.
    #[must_use]
    pub fn select_next(&self) -> Option<Job> {
        (0..self.rows.len())
            .filter_map(|position| self.record(position))
            .find(JobRecord::is_eligible)
            .map(JobRecord::into_job)
    }

    fn upload_state(&self, position: usize) -> UploadState {
        UploadState::from_marker(self.field(position, STATE_COLUMN))
    }

    fn check_position(&self, position: usize) -> Result<()> {
        if position < self.rows.len() {
            Ok(())
        } else {
            Err(StoreError::InvalidPosition {
                position,
                len: self.rows.len(),
            })
        }
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|header| header.trim() == column)
    }

    fn ensure_column(&mut self, column: &str) -> usize {
        if let Some(index) = self.column_index(column) {
            return index;
        }
        self.headers.push(column.to_string());
        self.headers.len() - 1
    }

    fn set_field(&mut self, position: usize, column: &str, value: &str) {
        let index = self.ensure_column(column);
        if let Some(row) = self.rows.get_mut(position) {
            if row.len() <= index {
                row.resize(index + 1, String::new());
            }
            row[index] = value.to_string();
        }
    }

    /// Writes the table next to `path` and renames it into place.
    fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::write(path, e))?;

        {
            let mut writer = WriterBuilder::new()
                .flexible(true)
                .from_writer(temp.as_file_mut());
            writer
                .write_record(&self.headers)
                .map_err(|e| StoreError::write(path, e.into()))?;
            let width = self.headers.len();
            for row in &self.rows {
                if row.len() < width {
                    let mut padded = row.clone();
                    padded.resize(width, String::new());
                    writer
                        .write_record(&padded)
                        .map_err(|e| StoreError::write(path, e.into()))?;
                } else {
                    writer
                        .write_record(row)
                        .map_err(|e| StoreError::write(path, e.into()))?;
                }
            }
            writer.flush().map_err(|e| StoreError::write(path, e))?;
        }

        temp.as_file()
            .sync_all()
            .map_err(|e| StoreError::write(path, e))?;
        temp.persist(path)
            .map_err(|e| StoreError::write(path, e.error))?;

        debug!(path = %path.display(), rows = self.rows.len(), "job store persisted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(contents: &str) -> (TempDir, CsvJobStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uploads.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, CsvJobStore::new(path))
    }

    #[test]
    fn test_select_next_returns_pending_row_without_id() {
        let (_dir, store) = store_with(
            "gdrive_link,caption,uploaded,video_id\n\
             https://drive.google.com/file/d/A1/view,first,,\n",
        );
        let job = store.select_next().unwrap().unwrap();
        assert_eq!(job.position, 0);
        assert_eq!(job.source_reference, "https://drive.google.com/file/d/A1/view");
        assert_eq!(job.caption, "first");
    }

    #[test]
    fn test_select_next_skips_done_case_insensitive() {
        let (_dir, store) = store_with(
            "gdrive_link,caption,uploaded,video_id\n\
             link-a,a,YES,\n\
             link-b,b, yes ,\n\
             link-c,c,no,\n",
        );
        let job = store.select_next().unwrap().unwrap();
        assert_eq!(job.position, 2);
    }

    #[test]
    fn test_select_next_skips_rows_with_external_id() {
        let (_dir, store) = store_with(
            "gdrive_link,caption,uploaded,video_id\n\
             link-a,a,no,abc123\n\
             link-b,b,,\n",
        );
        let job = store.select_next().unwrap().unwrap();
        assert_eq!(job.position, 1);
        assert_eq!(job.source_reference, "link-b");
    }

    #[test]
    fn test_select_next_none_when_everything_processed() {
        let (_dir, store) = store_with(
            "gdrive_link,caption,uploaded,video_id\n\
             link-a,a,yes,id1\n\
             link-b,b,failed,id2\n",
        );
        assert!(store.select_next().unwrap().is_none());
    }

    #[test]
    fn test_missing_optional_columns_are_pending() {
        let (_dir, store) = store_with("gdrive_link,caption\nlink-a,hello\n");
        let job = store.select_next().unwrap().unwrap();
        assert_eq!(job.position, 0);
        assert_eq!(job.caption, "hello");
    }

    #[test]
    fn test_missing_store_is_read_error() {
        let dir = TempDir::new().unwrap();
        let store = CsvJobStore::new(dir.path().join("absent.csv"));
        assert!(matches!(
            store.select_next(),
            Err(StoreError::StoreRead { .. })
        ));
    }

    #[test]
    fn test_mark_terminal_sets_state_and_id() {
        let (_dir, store) = store_with("gdrive_link,caption,uploaded,video_id\nlink-a,a,,\n");
        store
            .mark_terminal(0, Some("vid42"), UploadState::Done)
            .unwrap();

        let record = store.load().unwrap().record(0).unwrap();
        assert_eq!(record.upload_state, UploadState::Done);
        assert_eq!(record.external_id.as_deref(), Some("vid42"));
    }

    #[test]
    fn test_mark_terminal_adds_missing_columns() {
        let (_dir, store) = store_with("gdrive_link,caption\nlink-a,a\nlink-b,b\n");
        store.mark_terminal(1, None, UploadState::Failed).unwrap();

        let table = store.load().unwrap();
        assert!(table.headers().iter().any(|h| h == STATE_COLUMN));
        assert!(table.headers().iter().any(|h| h == EXTERNAL_ID_COLUMN));
        assert_eq!(table.field(1, STATE_COLUMN), "failed");
        assert_eq!(table.field(0, STATE_COLUMN), "");
    }

    #[test]
    fn test_mark_terminal_without_id_keeps_existing_id() {
        let (_dir, store) = store_with("gdrive_link,caption,uploaded,video_id\nlink-a,a,,keep\n");
        store.mark_terminal(0, None, UploadState::Done).unwrap();
        assert_eq!(store.load().unwrap().field(0, EXTERNAL_ID_COLUMN), "keep");
    }

    #[test]
    fn test_mark_terminal_out_of_range() {
        let (_dir, store) = store_with("gdrive_link,caption,uploaded,video_id\nlink-a,a,,\n");
        let result = store.mark_terminal(5, Some("x"), UploadState::Done);
        assert!(matches!(
            result,
            Err(StoreError::InvalidPosition { position: 5, len: 1 })
        ));
    }

    #[test]
    fn test_mark_terminal_rejects_pending_target() {
        let (_dir, store) = store_with("gdrive_link,caption,uploaded,video_id\nlink-a,a,,\n");
        let result = store.mark_terminal(0, None, UploadState::Pending);
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
    }

    #[test]
    fn test_mark_terminal_rejects_reversal() {
        let (_dir, store) = store_with("gdrive_link,caption,uploaded,video_id\nlink-a,a,yes,v1\n");
        let result = store.mark_terminal(0, Some("v1"), UploadState::Failed);
        assert!(matches!(
            result,
            Err(StoreError::InvalidTransition {
                from: UploadState::Done,
                to: UploadState::Failed,
                ..
            })
        ));
        assert_eq!(store.load().unwrap().field(0, STATE_COLUMN), "yes");
    }

    #[test]
    fn test_mark_terminal_overwrites_failed_row() {
        let (_dir, store) = store_with("gdrive_link,caption,uploaded,video_id\nlink-a,a,failed,\n");
        assert_eq!(store.select_next().unwrap().unwrap().position, 0);

        store.record_external_id(0, "v-retry").unwrap();
        store.mark_terminal(0, Some("v-retry"), UploadState::Done).unwrap();

        let record = store.load().unwrap().record(0).unwrap();
        assert_eq!(record.upload_state, UploadState::Done);
        assert_eq!(record.external_id.as_deref(), Some("v-retry"));
    }

    #[test]
    fn test_mark_terminal_is_idempotent() {
        let (_dir, store) = store_with(
            "gdrive_link,caption,uploaded,video_id\nlink-a,a,,\nlink-b,b,,\n",
        );
        store.mark_terminal(1, Some("v2"), UploadState::Done).unwrap();
        let once = std::fs::read(store.path()).unwrap();

        store.mark_terminal(1, Some("v2"), UploadState::Done).unwrap();
        let twice = std::fs::read(store.path()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_record_external_id_keeps_state_pending_and_blocks_selection() {
        let (_dir, store) = store_with("gdrive_link,caption,uploaded,video_id\nlink-a,a,,\n");
        store.record_external_id(0, "vid9").unwrap();

        let record = store.load().unwrap().record(0).unwrap();
        assert_eq!(record.upload_state, UploadState::Pending);
        assert_eq!(record.external_id.as_deref(), Some("vid9"));
        assert!(store.select_next().unwrap().is_none());
    }

    #[test]
    fn test_record_external_id_rejects_blank() {
        let (_dir, store) = store_with("gdrive_link,caption,uploaded,video_id\nlink-a,a,,\n");
        assert!(matches!(
            store.record_external_id(0, "  "),
            Err(StoreError::EmptyExternalId { position: 0 })
        ));
    }

    #[test]
    fn test_untouched_rows_and_extra_columns_survive_rewrite() {
        let (_dir, store) = store_with(
            "gdrive_link,caption,uploaded,video_id,notes\n\
             link-a,\"Hello, world\",,,keep me\n\
             link-b,\"multi\nline\",,,\"quoted \"\"text\"\"\"\n",
        );
        let before = store.load().unwrap();

        store.mark_terminal(0, Some("v1"), UploadState::Done).unwrap();
        let after = store.load().unwrap();

        assert_eq!(before.headers(), after.headers());
        assert_eq!(before.rows[1], after.rows[1]);
        assert_eq!(after.field(0, "notes"), "keep me");
        assert_eq!(after.field(0, CAPTION_COLUMN), "Hello, world");
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_directory_preserves_committed_state() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, store) = store_with("gdrive_link,caption,uploaded,video_id\nlink-a,a,,\n");
        let original = std::fs::read(store.path()).unwrap();

        let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
        perms.set_mode(0o555);
        std::fs::set_permissions(dir.path(), perms.clone()).unwrap();

        let result = store.mark_terminal(0, Some("v1"), UploadState::Done);

        perms.set_mode(0o755);
        std::fs::set_permissions(dir.path(), perms).unwrap();

        // Running as root bypasses directory permissions; only assert when denied.
        if let Err(error) = result {
            assert!(matches!(error, StoreError::StoreWrite { .. }));
            assert_eq!(std::fs::read(store.path()).unwrap(), original);
        }
    }
}
