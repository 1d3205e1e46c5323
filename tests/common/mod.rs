//! Test helpers for upload integration tests.
//!
//! Provides file and controller builders plus transfer strategies whose
//! behaviour the tests control.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use filedrop::config::{LoggingConfig, SimulatorConfig};
use filedrop::store::{
    MemoryRecordStore, NewUploadRecord, UploadRecord, UploadRecordStore, UploadRecordUpdate,
};
use filedrop::upload::{ProgressSender, TransferStrategy};
use filedrop::{
    Config, FileHandle, FileId, FiledropError, Result, SimulatedTransfer, TrackedFile,
    UploadController,
};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a test configuration with a zero-delay simulator.
pub fn test_config() -> Config {
    Config {
        simulator: SimulatorConfig::instant(),
        logging: LoggingConfig {
            level: "warn".to_string(),
            file: None,
        },
        ..Default::default()
    }
}

/// In-memory plain text file of `size` bytes.
pub fn text_file(name: &str, size: usize) -> FileHandle {
    FileHandle::from_bytes(name, "text/plain", vec![b'x'; size])
}

/// Controller over a fresh memory store and the given strategy.
pub fn controller_with(
    strategy: Arc<dyn TransferStrategy>,
) -> (UploadController, Arc<MemoryRecordStore>) {
    let store = Arc::new(MemoryRecordStore::new());
    let controller = UploadController::from_config(&test_config(), store.clone(), strategy);
    (controller, store)
}

/// Controller over a fresh memory store and a zero-delay simulator.
pub fn instant_controller() -> (UploadController, Arc<MemoryRecordStore>) {
    controller_with(Arc::new(SimulatedTransfer::new(SimulatorConfig::instant())))
}

/// Wait until the tracked file satisfies `pred`.
pub async fn wait_until<F>(controller: &UploadController, id: FileId, pred: F) -> TrackedFile
where
    F: Fn(&TrackedFile) -> bool,
{
    timeout(DEFAULT_TIMEOUT, async {
        loop {
            if let Some(file) = controller.get(id).await {
                if pred(&file) {
                    return file;
                }
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}

/// Reports 10%, then holds until released or cancelled.
pub struct GatedTransfer {
    gate: Semaphore,
}

impl GatedTransfer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
        })
    }

    /// Let `n` held transfers finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait]
impl TransferStrategy for GatedTransfer {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn transfer(
        &self,
        _file: &FileHandle,
        mut progress: ProgressSender,
        cancel: CancellationToken,
    ) -> Result<Option<String>> {
        progress.report(10).await?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FiledropError::Cancelled),
            permit = self.gate.acquire() => {
                permit.map_err(|_| FiledropError::Cancelled)?.forget();
                progress.report(100).await?;
                Ok(None)
            }
        }
    }
}

/// Reports 50%, then fails files whose name starts with "fail".
pub struct ScriptedTransfer;

#[async_trait]
impl TransferStrategy for ScriptedTransfer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn transfer(
        &self,
        file: &FileHandle,
        mut progress: ProgressSender,
        _cancel: CancellationToken,
    ) -> Result<Option<String>> {
        progress.report(50).await?;
        if file.name().starts_with("fail") {
            return Err(FiledropError::Io(std::io::Error::other("connection reset")));
        }
        progress.report(100).await?;
        Ok(None)
    }
}

/// Records the highest number of transfers running at once.
#[derive(Default)]
pub struct CountingTransfer {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingTransfer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferStrategy for CountingTransfer {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn transfer(
        &self,
        _file: &FileHandle,
        mut progress: ProgressSender,
        _cancel: CancellationToken,
    ) -> Result<Option<String>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = progress.report(100).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        result.map(|_| None)
    }
}

/// Memory store whose `create` fails with a database error for records
/// named "fail*".
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryRecordStore,
}

#[async_trait]
impl UploadRecordStore for FlakyStore {
    async fn create(&self, record: &NewUploadRecord) -> Result<UploadRecord> {
        if record.name.starts_with("fail") {
            return Err(FiledropError::Database("disk I/O error".to_string()));
        }
        self.inner.create(record).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<UploadRecord>> {
        self.inner.get_by_id(id).await
    }

    async fn update(&self, id: i64, update: &UploadRecordUpdate) -> Result<UploadRecord> {
        self.inner.update(id, update).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn list_all(&self) -> Result<Vec<UploadRecord>> {
        self.inner.list_all().await
    }
}
