//! Size and type validation for selected files.

use std::fmt;

use crate::config::UploadConfig;
use crate::FiledropError;

use super::handle::FileHandle;
use super::{DEFAULT_ALLOWED_TYPES, DEFAULT_MAX_FILE_SIZE};

/// Rule a file violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The file exceeds the configured size limit.
    TooLarge { max_bytes: u64 },
    /// The MIME type is not on the whitelist.
    UnsupportedType { mime_type: Option<String> },
}

/// One rejection produced by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Name of the offending file.
    pub file_name: String,
    /// Violated rule.
    pub reason: RejectReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            RejectReason::TooLarge { max_bytes } => write!(
                f,
                "{} is too large (max {}MB)",
                self.file_name,
                max_bytes / 1024 / 1024
            ),
            RejectReason::UnsupportedType { .. } => {
                write!(f, "{} has an unsupported file type", self.file_name)
            }
        }
    }
}

/// Checks batches of files against a size limit and a MIME whitelist.
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_size_bytes: u64,
    allowed_types: Vec<String>,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_FILE_SIZE,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl FileValidator {
    /// Create a validator with explicit limits.
    pub fn new(max_size_bytes: u64, allowed_types: Vec<String>) -> Self {
        Self {
            max_size_bytes,
            allowed_types,
        }
    }

    /// Create a validator from the upload configuration.
    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_file_size_bytes(), config.allowed_types.clone())
    }

    /// Maximum accepted size in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Check whether a MIME type is on the whitelist.
    pub fn is_allowed_type(&self, mime_type: Option<&str>) -> bool {
        mime_type.is_some_and(|t| self.allowed_types.iter().any(|a| a.as_str() == t))
    }

    /// Check a single file, returning every rule it breaks.
    ///
    /// The size rule is reported before the type rule.
    pub fn check(&self, file: &FileHandle) -> Vec<Rejection> {
        let mut rejections = Vec::new();

        if file.size() > self.max_size_bytes {
            rejections.push(Rejection {
                file_name: file.name().to_string(),
                reason: RejectReason::TooLarge {
                    max_bytes: self.max_size_bytes,
                },
            });
        }

        if !self.is_allowed_type(file.mime_type()) {
            rejections.push(Rejection {
                file_name: file.name().to_string(),
                reason: RejectReason::UnsupportedType {
                    mime_type: file.mime_type().map(str::to_string),
                },
            });
        }

        rejections
    }

    /// Validate a batch of files.
    ///
    /// Returns `Ok(())` when every file passes, otherwise every rejection in
    /// input order. Nothing is logged or surfaced here; the caller decides
    /// what to show.
    pub fn validate(&self, files: &[FileHandle]) -> std::result::Result<(), Vec<Rejection>> {
        let rejections: Vec<Rejection> = files.iter().flat_map(|f| self.check(f)).collect();

        if rejections.is_empty() {
            Ok(())
        } else {
            Err(rejections)
        }
    }
}

impl From<Vec<Rejection>> for FiledropError {
    fn from(rejections: Vec<Rejection>) -> Self {
        let messages: Vec<String> = rejections.iter().map(|r| r.to_string()).collect();
        FiledropError::Validation(messages.join("; "))
    }
}
