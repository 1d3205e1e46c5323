//! Chunked transfer into local file storage.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::transfer::{ProgressSender, TransferStrategy};
use crate::file::{FileHandle, FileStorage};
use crate::{FiledropError, Result};

/// Default chunk size (64KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Copies the file's bytes into a [`FileStorage`] chunk by chunk.
///
/// Progress is the share of the declared size written so far. A partially
/// written file is removed when the transfer fails or is cancelled.
#[derive(Debug, Clone)]
pub struct StorageTransfer {
    storage: FileStorage,
    chunk_size: usize,
}

impl StorageTransfer {
    pub fn new(storage: FileStorage) -> Self {
        Self {
            storage,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the chunk size in bytes (minimum 1).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Storage receiving the files.
    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    async fn copy(
        &self,
        file: &FileHandle,
        out: &mut tokio::fs::File,
        progress: &mut ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut reader: Box<dyn AsyncRead + Send + Unpin> = file.open().await?;
        let total = file.size();
        let mut buf = vec![0u8; self.chunk_size];
        let mut written: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(FiledropError::Cancelled);
            }

            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).await?;
            written += n as u64;

            if total > 0 {
                let percent = (written.saturating_mul(100) / total).min(100) as u8;
                progress.report(percent).await?;
            }
        }

        out.flush().await?;
        progress.report(100).await
    }
}

#[async_trait]
impl TransferStrategy for StorageTransfer {
    fn name(&self) -> &'static str {
        "storage"
    }

    async fn transfer(
        &self,
        file: &FileHandle,
        mut progress: ProgressSender,
        cancel: CancellationToken,
    ) -> Result<Option<String>> {
        let (stored_name, mut out) = self.storage.create(file.name()).await?;
        debug!(file = file.name(), stored_name = %stored_name, "writing chunks");

        match self.copy(file, &mut out, &mut progress, &cancel).await {
            Ok(()) => {
                let path = self.storage.get_file_path(&stored_name);
                Ok(Some(path.display().to_string()))
            }
            Err(e) => {
                drop(out);
                if let Err(cleanup) = self.storage.delete(&stored_name).await {
                    warn!(stored_name = %stored_name, "failed to remove partial file: {cleanup}");
                }
                Err(e)
            }
        }
    }
}
