//! On-disk storage for transferred files.
//!
//! Files are written under a UUID-based name, sharded by the first two
//! characters of the UUID:
//! ```text
//! {base_path}/
//! ├── ab/
//! │   └── ab12cd34-5678-90ab-cdef-123456789012.png
//! └── cd/
//!     └── cd90ab12-3456-7890-abcd-ef1234567890.bin
//! ```

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::{FiledropError, Result};

/// Sharded file storage rooted at a base directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage, creating the base directory if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Base directory of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Generate a new stored name keeping the extension of `original_name`.
    ///
    /// Falls back to "bin" when the original has no extension.
    pub fn generate_stored_name(original_name: &str) -> String {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("bin");
        format!("{}.{ext}", Uuid::new_v4())
    }

    /// Full path for a stored name: `{base_path}/{shard}/{stored_name}`.
    pub fn get_file_path(&self, stored_name: &str) -> PathBuf {
        let shard = stored_name.get(..2).unwrap_or(stored_name);
        self.base_path.join(shard).join(stored_name)
    }

    /// Create an empty file for `original_name` and open it for writing.
    ///
    /// Returns the stored name together with the open file.
    pub async fn create(&self, original_name: &str) -> Result<(String, fs::File)> {
        let stored_name = Self::generate_stored_name(original_name);
        let path = self.get_file_path(&stored_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = fs::File::create(&path).await?;
        Ok((stored_name, file))
    }

    /// Read a stored file.
    pub async fn load(&self, stored_name: &str) -> Result<Vec<u8>> {
        match fs::read(self.get_file_path(stored_name)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(FiledropError::NotFound(format!("stored file {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a stored file.
    ///
    /// Returns `false` if the file did not exist.
    pub async fn delete(&self, stored_name: &str) -> Result<bool> {
        match fs::remove_file(self.get_file_path(stored_name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether a stored file exists.
    pub fn exists(&self, stored_name: &str) -> bool {
        self.get_file_path(stored_name).exists()
    }

    /// Size of a stored file in bytes.
    pub async fn file_size(&self, stored_name: &str) -> Result<u64> {
        match fs::metadata(self.get_file_path(stored_name)).await {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(FiledropError::NotFound(format!("stored file {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}
