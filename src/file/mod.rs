//! File handling for filedrop.
//!
//! This module covers everything that concerns a selected file before and
//! outside of an upload flow:
//! - Owning file handles (path or in-memory bytes)
//! - Human-readable sizes and MIME type classification
//! - Size and type validation
//! - Sharded on-disk storage with UUID naming

mod format;
mod handle;
mod storage;
mod validation;

pub use format::{format_size, media_kind, FileCategory, FileIcon};
pub use handle::{FileHandle, FileSource};
pub use storage::FileStorage;
pub use validation::{FileValidator, RejectReason, Rejection};

/// Default maximum file size (100MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// MIME types accepted when no whitelist is configured.
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "video/mp4",
    "video/avi",
    "video/mov",
    "audio/mp3",
    "audio/wav",
    "audio/mpeg",
];
