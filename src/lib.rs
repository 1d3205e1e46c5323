//! filedrop - file upload lifecycle controller
//!
//! Tracks selected files from selection through validation, transfer and
//! completion, persisting each upload as a record.

pub mod config;
pub mod error;
pub mod file;
pub mod logging;
pub mod store;
pub mod upload;

pub use config::Config;
pub use error::{FiledropError, Result};
pub use file::{format_size, FileCategory, FileHandle, FileIcon, FileStorage, FileValidator};
pub use store::{MemoryRecordStore, NewUploadRecord, UploadRecord, UploadRecordStore};
#[cfg(feature = "sqlite")]
pub use store::SqliteRecordStore;
pub use upload::{
    FileId, SimulatedTransfer, StorageTransfer, TrackedFile, TransferStrategy, UploadController,
    UploadEvent, UploadStats, UploadStatus, UploadSummary,
};
