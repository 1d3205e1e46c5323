//! Types shared by the upload controller, transfer strategies and stores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::file::{format_size, media_kind, FileCategory, FileHandle, FileIcon};
use crate::FiledropError;

/// Identifier of a tracked file, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(Uuid);

impl FileId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upload state of a file or of an upload record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    /// Lower-case wire value, as stored in records.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
            UploadStatus::Cancelled => "cancelled",
        }
    }

    /// Badge text shown next to a file.
    pub fn label(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "Pending",
            UploadStatus::Uploading => "Uploading",
            UploadStatus::Completed => "Completed",
            UploadStatus::Failed => "Failed",
            UploadStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether no further transfer will happen for this entry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Failed | UploadStatus::Cancelled
        )
    }

    /// Whether an entry in this state may be cancelled.
    ///
    /// A failed entry stays failed.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            UploadStatus::Pending | UploadStatus::Uploading | UploadStatus::Completed
        )
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = FiledropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UploadStatus::Pending),
            "uploading" => Ok(UploadStatus::Uploading),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            "cancelled" => Ok(UploadStatus::Cancelled),
            other => Err(FiledropError::Validation(format!(
                "unknown upload status: {other}"
            ))),
        }
    }
}

impl TryFrom<String> for UploadStatus {
    type Error = FiledropError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A file the user has added, together with its upload state.
///
/// Values handed out by the controller are snapshots; mutating them has no
/// effect on the tracked collection.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    /// Identifier assigned when the file was added.
    pub id: FileId,
    /// File name at selection time.
    pub name: String,
    /// Size in bytes at selection time.
    pub size: u64,
    /// MIME type at selection time.
    pub mime_type: Option<String>,
    /// Current upload state.
    pub status: UploadStatus,
    /// Progress percentage in 0..=100.
    pub progress: u8,
    /// Store record backing the current or last flow.
    pub record_id: Option<i64>,
    /// Handle to the selected file.
    pub handle: FileHandle,
}

impl TrackedFile {
    pub(crate) fn new(handle: FileHandle) -> Self {
        Self {
            id: FileId::generate(),
            name: handle.name().to_string(),
            size: handle.size(),
            mime_type: handle.mime_type().map(str::to_string),
            status: UploadStatus::Pending,
            progress: 0,
            record_id: None,
            handle,
        }
    }

    /// Category label derived from the MIME type.
    pub fn category(&self) -> FileCategory {
        FileCategory::from_mime(self.mime_type.as_deref())
    }

    /// Icon derived from the MIME type.
    pub fn icon(&self) -> FileIcon {
        FileIcon::from_mime(self.mime_type.as_deref())
    }

    /// Top-level media kind ("image", "application", ...).
    pub fn media_kind(&self) -> String {
        media_kind(self.mime_type.as_deref())
    }

    /// Human-readable size.
    pub fn formatted_size(&self) -> String {
        format_size(self.size)
    }

    /// Whether a preview can be generated.
    pub fn can_preview(&self) -> bool {
        self.handle.is_image()
    }

    /// Whether a progress bar is meaningful for this entry.
    pub fn shows_progress(&self) -> bool {
        self.status == UploadStatus::Uploading
            || (self.status == UploadStatus::Completed && self.progress == 100)
    }
}

/// Counts of tracked files by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl UploadStats {
    /// Count the given files by status.
    pub fn from_files<'a>(files: impl IntoIterator<Item = &'a TrackedFile>) -> Self {
        let mut stats = Self::default();
        for file in files {
            stats.total += 1;
            match file.status {
                UploadStatus::Pending => stats.pending += 1,
                UploadStatus::Uploading => stats.uploading += 1,
                UploadStatus::Completed => stats.completed += 1,
                UploadStatus::Failed => stats.failed += 1,
                UploadStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Whether any file is currently uploading.
    pub fn is_uploading(&self) -> bool {
        self.uploading > 0
    }

    /// One-line summary of the counts.
    pub fn summary_line(&self) -> String {
        format!(
            "Total: {} | Completed: {} | Uploading: {} | Failed: {} | Pending: {}",
            self.total, self.completed, self.uploading, self.failed, self.pending
        )
    }
}

/// Outcome of one `upload_all` batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl UploadSummary {
    /// Number of flows in the batch.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }

    /// User-facing notifications for the batch.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if self.succeeded > 0 {
            messages.push(format!(
                "Successfully uploaded {} {}",
                self.succeeded,
                plural_files(self.succeeded)
            ));
        }
        if self.failed > 0 {
            messages.push(format!(
                "Failed to upload {} {}",
                self.failed,
                plural_files(self.failed)
            ));
        }
        if self.cancelled > 0 {
            messages.push(format!(
                "Cancelled {} {}",
                self.cancelled,
                plural_files(self.cancelled)
            ));
        }
        messages
    }
}

fn plural_files(n: usize) -> &'static str {
    if n == 1 {
        "file"
    } else {
        "files"
    }
}

/// Notification published by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// A file was added in `pending` state.
    Added { id: FileId },
    /// A flow advanced the progress of a file.
    Progress { id: FileId, percent: u8 },
    /// A file changed status.
    StatusChanged { id: FileId, status: UploadStatus },
    /// A file was removed.
    Removed { id: FileId },
    /// Several files were removed at once.
    Cleared { count: usize },
}
