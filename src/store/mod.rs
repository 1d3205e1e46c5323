//! Upload record persistence for filedrop.
//!
//! Upload flows mirror their state into an [`UploadRecordStore`]. The store
//! is a collaborator: the controller only relies on the trait contract, and
//! every implementation is an explicitly constructed instance.
//!
//! Implementations:
//! - [`MemoryRecordStore`]: in-process store with optional latency and
//!   failure injection
//! - [`SqliteRecordStore`]: SQLite-backed store (feature `sqlite`)

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryRecordStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::file::FileHandle;
use crate::upload::UploadStatus;
use crate::{FiledropError, Result};

/// A persisted upload record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Store-assigned ID.
    pub id: i64,
    /// File name.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME type, if known.
    pub mime_type: Option<String>,
    /// Upload state.
    pub status: UploadStatus,
    /// Progress percentage in 0..=100.
    pub progress: u8,
    /// When the record was created.
    pub uploaded_at: DateTime<Utc>,
    /// Location of the uploaded file, once known.
    pub url: Option<String>,
}

/// Data for creating a new upload record.
#[derive(Debug, Clone)]
pub struct NewUploadRecord {
    pub name: String,
    pub size: u64,
    pub mime_type: Option<String>,
    pub status: UploadStatus,
    pub progress: u8,
    pub url: Option<String>,
}

impl NewUploadRecord {
    /// Create a pending record.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: None,
            status: UploadStatus::Pending,
            progress: 0,
            url: None,
        }
    }

    /// Create a pending record describing a selected file.
    pub fn from_handle(handle: &FileHandle) -> Self {
        let record = Self::new(handle.name(), handle.size());
        match handle.mime_type() {
            Some(mime) => record.with_mime_type(mime),
            None => record,
        }
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the initial status.
    pub fn with_status(mut self, status: UploadStatus) -> Self {
        self.status = status;
        self
    }

    /// Check the fields every store requires.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FiledropError::Validation(
                "upload record name must not be empty".to_string(),
            ));
        }
        if self.progress > 100 {
            return Err(FiledropError::Validation(format!(
                "progress {} is out of range",
                self.progress
            )));
        }
        Ok(())
    }
}

/// Partial update of an upload record.
#[derive(Debug, Clone, Default)]
pub struct UploadRecordUpdate {
    pub status: Option<UploadStatus>,
    pub progress: Option<u8>,
    pub url: Option<Option<String>>,
}

impl UploadRecordUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status.
    pub fn status(mut self, status: UploadStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the progress, clamped to 100.
    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    /// Set or clear the URL.
    pub fn url(mut self, url: Option<impl Into<String>>) -> Self {
        self.url = Some(url.map(|u| u.into()));
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.progress.is_none() && self.url.is_none()
    }

    /// Apply the set fields to a record.
    pub fn apply_to(&self, record: &mut UploadRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(progress) = self.progress {
            record.progress = progress;
        }
        if let Some(ref url) = self.url {
            record.url = url.clone();
        }
    }
}

/// Contract of the upload record collaborator.
#[async_trait]
pub trait UploadRecordStore: Send + Sync {
    /// Create a record and return it with its assigned ID.
    async fn create(&self, record: &NewUploadRecord) -> Result<UploadRecord>;

    /// Get a record by ID.
    async fn get_by_id(&self, id: i64) -> Result<Option<UploadRecord>>;

    /// Update a record. Fails with `NotFound` if the ID is absent.
    async fn update(&self, id: i64, update: &UploadRecordUpdate) -> Result<UploadRecord>;

    /// Delete a record. Returns `false` if the ID was absent.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// List all records, newest first.
    async fn list_all(&self) -> Result<Vec<UploadRecord>>;

    /// Count all records.
    async fn count(&self) -> Result<usize> {
        Ok(self.list_all().await?.len())
    }

    /// Mark a record cancelled and reset its progress.
    async fn cancel(&self, id: i64) -> Result<UploadRecord> {
        let update = UploadRecordUpdate::new()
            .status(UploadStatus::Cancelled)
            .progress(0);
        self.update(id, &update).await
    }
}
