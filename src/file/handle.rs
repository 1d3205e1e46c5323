//! Owning handles to selected files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use tokio::io::AsyncRead;

use crate::{FiledropError, Result};

/// Where the bytes of a selected file live.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// Bytes already held in memory (drag-and-drop buffers, tests).
    Memory(Arc<[u8]>),
}

/// A raw file selected by the user.
///
/// Name, size and MIME type are captured once at construction. The handle
/// keeps the byte source alive so the file can later be transferred or
/// previewed; dropping it releases the source.
#[derive(Debug, Clone)]
pub struct FileHandle {
    name: String,
    size: u64,
    mime_type: Option<String>,
    source: FileSource,
}

impl FileHandle {
    /// Create a handle for a file on disk.
    ///
    /// The size comes from the filesystem metadata and the MIME type is
    /// guessed from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(FiledropError::Validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = guess_mime(&path);

        Ok(Self {
            name,
            size: metadata.len(),
            mime_type,
            source: FileSource::Path(path),
        })
    }

    /// Create a handle for an in-memory buffer.
    ///
    /// An empty `mime_type` is treated as unknown.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        let mime_type = mime_type.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            mime_type: (!mime_type.is_empty()).then_some(mime_type),
            source: FileSource::Memory(bytes),
        }
    }

    /// Override the reported size.
    ///
    /// Lets callers describe files whose bytes are not materialised, such as
    /// multi-gigabyte selections checked only by the validator.
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// File name as selected.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// MIME type, if known.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Byte source.
    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Whether the file is an image (and therefore previewable).
    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|t| t.to_lowercase().starts_with("image/"))
    }

    /// Read the whole file into memory.
    pub async fn read_all(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => Ok(tokio::fs::read(path).await?),
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }

    /// Open a streaming reader over the file contents.
    pub async fn open(&self) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        match &self.source {
            FileSource::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::new(file))
            }
            FileSource::Memory(bytes) => Ok(Box::new(std::io::Cursor::new(Arc::clone(bytes)))),
        }
    }

    /// Build a `data:` URL for previewing an image.
    ///
    /// Returns `None` for files that are not images.
    pub async fn preview_data_url(&self) -> Result<Option<String>> {
        if !self.is_image() {
            return Ok(None);
        }
        let bytes = self.read_all().await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let mime = self.mime_type.as_deref().unwrap_or("application/octet-stream");
        Ok(Some(format!("data:{mime};base64,{encoded}")))
    }
}

fn guess_mime(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
}
