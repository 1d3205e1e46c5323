//! Upload lifecycle controller.
//!
//! The controller owns the tracked file collection and runs one flow per
//! pending entry when an upload is triggered. Each flow persists its state
//! through the [`UploadRecordStore`] and moves bytes through the configured
//! [`TransferStrategy`]. Flows are tokio tasks; the collection lives behind a
//! `RwLock` and every state change goes through the controller.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{broadcast, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::transfer::{ProgressSender, TransferStrategy};
use super::types::{FileId, TrackedFile, UploadEvent, UploadStats, UploadStatus, UploadSummary};
use crate::config::Config;
use crate::file::{FileHandle, FileValidator};
use crate::store::{NewUploadRecord, UploadRecordStore, UploadRecordUpdate};
use crate::{FiledropError, Result};

/// Default number of flows allowed to transfer at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 6;

/// Capacity of the event channel.
const EVENT_CAPACITY: usize = 1024;

/// Progress reports a strategy may queue ahead of the controller.
const PROGRESS_BUFFER: usize = 1;

struct Entry {
    file: TrackedFile,
    /// Token of the running flow, if any.
    cancel: Option<CancellationToken>,
}

struct Shared {
    files: RwLock<Vec<Entry>>,
    store: Arc<dyn UploadRecordStore>,
    strategy: Arc<dyn TransferStrategy>,
    events: broadcast::Sender<UploadEvent>,
}

/// Work handed to one flow.
struct Job {
    id: FileId,
    handle: FileHandle,
    cancel: CancellationToken,
}

/// How one flow ended.
enum FlowOutcome {
    Completed,
    Cancelled,
    Failed(FiledropError),
}

/// Tracks selected files and drives their uploads.
///
/// Cloning is cheap; clones share the same collection, store and limit.
#[derive(Clone)]
pub struct UploadController {
    shared: Arc<Shared>,
    limiter: Arc<Semaphore>,
    validator: FileValidator,
}

impl UploadController {
    /// Create a controller with the default validator and concurrency limit.
    pub fn new(store: Arc<dyn UploadRecordStore>, strategy: Arc<dyn TransferStrategy>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                files: RwLock::new(Vec::new()),
                store,
                strategy,
                events,
            }),
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
            validator: FileValidator::default(),
        }
    }

    /// Create a controller using the upload limits from `config`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn UploadRecordStore>,
        strategy: Arc<dyn TransferStrategy>,
    ) -> Self {
        Self::new(store, strategy)
            .with_max_concurrent(config.upload.max_concurrent_uploads)
            .with_validator(FileValidator::from_config(&config.upload))
    }

    /// Limit the number of concurrently transferring flows (minimum 1).
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    /// Replace the validator used by [`add_validated`](Self::add_validated).
    pub fn with_validator(mut self, validator: FileValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn validator(&self) -> &FileValidator {
        &self.validator
    }

    /// Receive controller events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.shared.events.subscribe()
    }

    /// Track new files in `pending` state, in the given order.
    ///
    /// No validation is performed here.
    pub async fn add(&self, handles: Vec<FileHandle>) -> Vec<TrackedFile> {
        let mut files = self.shared.files.write().await;
        let mut added = Vec::with_capacity(handles.len());

        for handle in handles {
            let file = TrackedFile::new(handle);
            debug!(id = %file.id, name = %file.name, size = file.size, "file added");
            self.shared.emit(UploadEvent::Added { id: file.id });
            added.push(file.clone());
            files.push(Entry { file, cancel: None });
        }

        info!("Added {} file(s)", added.len());
        added
    }

    /// Validate `handles` and add them only if every file passes.
    pub async fn add_validated(&self, handles: Vec<FileHandle>) -> Result<Vec<TrackedFile>> {
        self.validator.validate(&handles)?;
        Ok(self.add(handles).await)
    }

    /// Stop tracking a file.
    ///
    /// A running flow for the file is not cancelled; it finishes against a
    /// missing entry. Returns `false` if the file was not tracked.
    pub async fn remove(&self, id: FileId) -> bool {
        let mut files = self.shared.files.write().await;
        let Some(pos) = files.iter().position(|e| e.file.id == id) else {
            return false;
        };

        let entry = files.remove(pos);
        debug!(id = %id, name = %entry.file.name, status = %entry.file.status, "file removed");
        self.shared.emit(UploadEvent::Removed { id });
        true
    }

    /// Remove every completed file. Returns the number removed.
    pub async fn clear_completed(&self) -> usize {
        let mut files = self.shared.files.write().await;
        let before = files.len();
        files.retain(|e| e.file.status != UploadStatus::Completed);
        let count = before - files.len();

        if count > 0 {
            info!("Cleared {} completed file(s)", count);
            self.shared.emit(UploadEvent::Cleared { count });
        }
        count
    }

    /// Remove every file regardless of state. Returns the number removed.
    pub async fn clear_all(&self) -> usize {
        let mut files = self.shared.files.write().await;
        let count = files.len();
        files.clear();

        if count > 0 {
            info!("Cleared all {} file(s)", count);
            self.shared.emit(UploadEvent::Cleared { count });
        }
        count
    }

    /// Upload every pending file and wait until all flows settle.
    ///
    /// Individual failures are recorded on their entries and counted in the
    /// summary. Fails with [`FiledropError::NothingToUpload`] when no file is
    /// pending, and with [`FiledropError::Persistence`] when the record store
    /// failed every flow of the batch.
    pub async fn upload_all(&self) -> Result<UploadSummary> {
        let jobs = self.shared.begin_batch().await;
        if jobs.is_empty() {
            info!("No pending files to upload");
            return Err(FiledropError::NothingToUpload);
        }

        info!(
            "Uploading {} file(s) with {} strategy",
            jobs.len(),
            self.shared.strategy.name()
        );

        let flows: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let shared = Arc::clone(&self.shared);
                let limiter = Arc::clone(&self.limiter);
                tokio::spawn(async move { shared.run_flow(limiter, job).await })
            })
            .collect();

        let mut summary = UploadSummary::default();
        let mut persistence_errors = Vec::new();

        for result in join_all(flows).await {
            match result {
                Ok(FlowOutcome::Completed) => summary.succeeded += 1,
                Ok(FlowOutcome::Cancelled) => summary.cancelled += 1,
                Ok(FlowOutcome::Failed(e)) => {
                    summary.failed += 1;
                    if let FiledropError::Persistence(msg) = e {
                        persistence_errors.push(msg);
                    }
                }
                Err(e) => {
                    error!("Upload flow panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Upload batch settled"
        );

        if !persistence_errors.is_empty() && persistence_errors.len() == summary.total() {
            return Err(FiledropError::Persistence(format!(
                "all {} uploads failed: {}",
                summary.total(),
                persistence_errors[0]
            )));
        }

        Ok(summary)
    }

    /// Cancel a file.
    ///
    /// Pending, uploading and completed files become `cancelled`; a running
    /// flow stops at its next suspension point and progress stays where it
    /// was. Returns `false` if the file is failed or already cancelled.
    pub async fn cancel(&self, id: FileId) -> Result<bool> {
        let (token, record_id) = {
            let mut files = self.shared.files.write().await;
            let entry = files
                .iter_mut()
                .find(|e| e.file.id == id)
                .ok_or_else(|| FiledropError::NotFound(format!("file {id}")))?;

            if !entry.file.status.can_cancel() {
                return Ok(false);
            }

            entry.file.status = UploadStatus::Cancelled;
            self.shared.emit(UploadEvent::StatusChanged {
                id,
                status: UploadStatus::Cancelled,
            });
            (entry.cancel.take(), entry.file.record_id)
        };

        info!(id = %id, "upload cancelled");

        match token {
            // The flow marks its own record.
            Some(token) => token.cancel(),
            None => {
                if let Some(record_id) = record_id {
                    self.shared.cancel_record(record_id).await;
                }
            }
        }

        Ok(true)
    }

    /// Counts of tracked files by status.
    pub async fn stats(&self) -> UploadStats {
        let files = self.shared.files.read().await;
        UploadStats::from_files(files.iter().map(|e| &e.file))
    }

    /// Sum of the sizes of all tracked files.
    pub async fn total_size_bytes(&self) -> u64 {
        let files = self.shared.files.read().await;
        files.iter().map(|e| e.file.size).sum()
    }

    /// Snapshot of all tracked files in selection order.
    pub async fn files(&self) -> Vec<TrackedFile> {
        let files = self.shared.files.read().await;
        files.iter().map(|e| e.file.clone()).collect()
    }

    /// Snapshot of one tracked file.
    pub async fn get(&self, id: FileId) -> Option<TrackedFile> {
        let files = self.shared.files.read().await;
        files.iter().find(|e| e.file.id == id).map(|e| e.file.clone())
    }

    pub async fn len(&self) -> usize {
        self.shared.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.files.read().await.is_empty()
    }

    /// Whether any file is uploading.
    pub async fn is_busy(&self) -> bool {
        let files = self.shared.files.read().await;
        files
            .iter()
            .any(|e| e.file.status == UploadStatus::Uploading)
    }
}

impl Shared {
    fn emit(&self, event: UploadEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Move every pending entry to `uploading` and hand out its job.
    async fn begin_batch(&self) -> Vec<Job> {
        let mut files = self.files.write().await;
        let mut jobs = Vec::new();

        for entry in files
            .iter_mut()
            .filter(|e| e.file.status == UploadStatus::Pending)
        {
            let token = CancellationToken::new();
            entry.file.status = UploadStatus::Uploading;
            entry.file.progress = 0;
            entry.cancel = Some(token.clone());
            self.emit(UploadEvent::StatusChanged {
                id: entry.file.id,
                status: UploadStatus::Uploading,
            });

            jobs.push(Job {
                id: entry.file.id,
                handle: entry.file.handle.clone(),
                cancel: token,
            });
        }

        jobs
    }

    async fn run_flow(&self, limiter: Arc<Semaphore>, job: Job) -> FlowOutcome {
        let _permit = tokio::select! {
            biased;
            _ = job.cancel.cancelled() => return FlowOutcome::Cancelled,
            permit = limiter.acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return FlowOutcome::Cancelled,
            },
        };

        debug!(id = %job.id, name = job.handle.name(), "flow started");

        let new_record =
            NewUploadRecord::from_handle(&job.handle).with_status(UploadStatus::Uploading);
        let record = match self.store.create(&new_record).await {
            Ok(record) => record,
            Err(e) => return self.fail(job.id, store_failure(e)).await,
        };
        let id = job.id;
        let record_id = record.id;
        self.attach_record(id, record_id).await;

        let (sender, mut rx) = ProgressSender::channel(PROGRESS_BUFFER);
        let transfer_token = job.cancel.child_token();

        // Owns the receiver so a store failure also disconnects the strategy.
        let stop = &transfer_token;
        let consume = async move {
            while let Some(percent) = rx.recv().await {
                let update = UploadRecordUpdate::new().progress(percent);
                if let Err(e) = self.store.update(record_id, &update).await {
                    stop.cancel();
                    return Err(store_failure(e));
                }
                self.set_progress(id, percent).await;
            }
            Ok(())
        };

        let (transferred, consumed) = tokio::join!(
            self.strategy
                .transfer(&job.handle, sender, transfer_token.clone()),
            consume
        );

        let outcome = match (transferred, consumed) {
            (_, Err(e)) => self.fail(id, e).await,
            (Err(_), Ok(())) if job.cancel.is_cancelled() => FlowOutcome::Cancelled,
            (Err(e), Ok(())) => self.fail(id, e).await,
            (Ok(url), Ok(())) => {
                let update = UploadRecordUpdate::new()
                    .status(UploadStatus::Completed)
                    .progress(100)
                    .url(url);
                match self.store.update(record_id, &update).await {
                    Ok(_) => self.complete(id).await,
                    Err(e) => self.fail(id, store_failure(e)).await,
                }
            }
        };

        if let FlowOutcome::Cancelled = outcome {
            self.cancel_record(record_id).await;
        }

        outcome
    }

    async fn attach_record(&self, id: FileId, record_id: i64) {
        let mut files = self.files.write().await;
        if let Some(entry) = files.iter_mut().find(|e| e.file.id == id) {
            entry.file.record_id = Some(record_id);
        }
    }

    /// Apply a progress tick. Ignored for missing, non-uploading or
    /// non-advancing entries.
    async fn set_progress(&self, id: FileId, percent: u8) {
        let mut files = self.files.write().await;
        let Some(entry) = files.iter_mut().find(|e| e.file.id == id) else {
            return;
        };

        if entry.file.status == UploadStatus::Uploading && percent > entry.file.progress {
            entry.file.progress = percent;
            self.emit(UploadEvent::Progress { id, percent });
        }
    }

    async fn complete(&self, id: FileId) -> FlowOutcome {
        let mut files = self.files.write().await;
        let Some(entry) = files.iter_mut().find(|e| e.file.id == id) else {
            debug!(id = %id, "flow completed for removed file");
            return FlowOutcome::Completed;
        };

        entry.cancel = None;
        match entry.file.status {
            UploadStatus::Uploading => {
                entry.file.status = UploadStatus::Completed;
                if entry.file.progress < 100 {
                    entry.file.progress = 100;
                    self.emit(UploadEvent::Progress { id, percent: 100 });
                }
                self.emit(UploadEvent::StatusChanged {
                    id,
                    status: UploadStatus::Completed,
                });
                debug!(id = %id, name = %entry.file.name, "flow completed");
                FlowOutcome::Completed
            }
            UploadStatus::Cancelled => FlowOutcome::Cancelled,
            _ => FlowOutcome::Completed,
        }
    }

    /// Mark the entry failed, keeping its last observed progress.
    ///
    /// An entry cancelled while its flow was failing stays cancelled.
    async fn fail(&self, id: FileId, e: FiledropError) -> FlowOutcome {
        warn!(id = %id, "upload failed: {}", e);

        let mut files = self.files.write().await;
        if let Some(entry) = files.iter_mut().find(|e| e.file.id == id) {
            entry.cancel = None;
            match entry.file.status {
                UploadStatus::Uploading => {
                    entry.file.status = UploadStatus::Failed;
                    self.emit(UploadEvent::StatusChanged {
                        id,
                        status: UploadStatus::Failed,
                    });
                }
                UploadStatus::Cancelled => return FlowOutcome::Cancelled,
                _ => {}
            }
        }

        FlowOutcome::Failed(e)
    }

    async fn cancel_record(&self, record_id: i64) {
        if let Err(e) = self.store.cancel(record_id).await {
            warn!(record_id, "failed to mark upload record cancelled: {}", e);
        }
    }
}

/// Any error from the record store counts as a persistence failure.
fn store_failure(e: FiledropError) -> FiledropError {
    match e {
        FiledropError::Persistence(_) => e,
        other => FiledropError::Persistence(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::SimulatorConfig;
    use crate::store::MemoryRecordStore;
    use crate::upload::SimulatedTransfer;

    fn controller(store: MemoryRecordStore) -> UploadController {
        UploadController::new(
            Arc::new(store),
            Arc::new(SimulatedTransfer::new(SimulatorConfig::instant())),
        )
    }

    fn handle(name: &str, size: usize) -> FileHandle {
        FileHandle::from_bytes(name, "text/plain", vec![b'x'; size])
    }

    #[tokio::test]
    async fn test_add_keeps_selection_order() {
        let controller = controller(MemoryRecordStore::new());
        let added = controller
            .add(vec![handle("a.txt", 1), handle("b.txt", 2), handle("c.txt", 3)])
            .await;

        assert_eq!(added.len(), 3);
        assert!(added
            .iter()
            .all(|f| f.status == UploadStatus::Pending && f.progress == 0));

        let names: Vec<String> = controller.files().await.into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(controller.total_size_bytes().await, 6);
        assert_eq!(controller.len().await, 3);
    }

    #[tokio::test]
    async fn test_upload_all_completes_and_persists() {
        let store = Arc::new(MemoryRecordStore::new());
        let controller = UploadController::new(
            store.clone(),
            Arc::new(SimulatedTransfer::new(SimulatorConfig::instant())),
        );
        controller.add(vec![handle("a.txt", 10), handle("b.txt", 20)]).await;

        let summary = controller.upload_all().await.unwrap();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);

        for file in controller.files().await {
            assert_eq!(file.status, UploadStatus::Completed);
            assert_eq!(file.progress, 100);
            assert!(file.record_id.is_some());
        }

        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.status == UploadStatus::Completed && r.progress == 100));
        assert!(!controller.is_busy().await);
    }

    #[tokio::test]
    async fn test_upload_all_with_nothing_pending() {
        let controller = controller(MemoryRecordStore::new());
        let result = controller.upload_all().await;
        assert!(matches!(result, Err(FiledropError::NothingToUpload)));
    }

    #[tokio::test]
    async fn test_store_failure_marks_files_failed() {
        let controller = controller(MemoryRecordStore::failing());
        controller.add(vec![handle("a.txt", 1), handle("b.txt", 1)]).await;

        let result = controller.upload_all().await;
        assert!(matches!(result, Err(FiledropError::Persistence(_))));

        let stats = controller.stats().await;
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.uploading, 0);
    }

    #[tokio::test]
    async fn test_cancel_during_failing_create_counts_as_cancelled() {
        let store = MemoryRecordStore::failing().with_latency(Duration::from_millis(100));
        let controller = controller(store);
        let id = controller.add(vec![handle("a.txt", 1)]).await[0].id;

        let batch = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.upload_all().await })
        };
        while controller.get(id).await.unwrap().status != UploadStatus::Uploading {
            tokio::task::yield_now().await;
        }
        assert!(controller.cancel(id).await.unwrap());

        let summary = batch.await.unwrap().unwrap();
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(controller.get(id).await.unwrap().status, UploadStatus::Cancelled);
    }

    #[test]
    fn test_store_failure_wraps_other_errors() {
        match store_failure(FiledropError::Database("pool closed".to_string())) {
            FiledropError::Persistence(msg) => assert!(msg.contains("pool closed")),
            other => panic!("unexpected error: {other}"),
        }
        match store_failure(FiledropError::Persistence("down".to_string())) {
            FiledropError::Persistence(msg) => assert_eq!(msg, "down"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_pending_and_failed() {
        let controller = controller(MemoryRecordStore::new());
        let added = controller.add(vec![handle("a.txt", 1)]).await;
        let id = added[0].id;

        assert!(controller.cancel(id).await.unwrap());
        assert_eq!(controller.get(id).await.unwrap().status, UploadStatus::Cancelled);
        assert!(!controller.cancel(id).await.unwrap());

        // Nothing left to upload.
        assert!(matches!(
            controller.upload_all().await,
            Err(FiledropError::NothingToUpload)
        ));

        controller.remove(id).await;
        assert!(matches!(
            controller.cancel(id).await,
            Err(FiledropError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_completed_marks_record() {
        let store = Arc::new(MemoryRecordStore::new());
        let controller = UploadController::new(
            store.clone(),
            Arc::new(SimulatedTransfer::new(SimulatorConfig::instant())),
        );
        let id = controller.add(vec![handle("a.txt", 1)]).await[0].id;
        controller.upload_all().await.unwrap();

        assert!(controller.cancel(id).await.unwrap());
        let file = controller.get(id).await.unwrap();
        assert_eq!(file.status, UploadStatus::Cancelled);
        assert_eq!(file.progress, 100);

        let record = store
            .get_by_id(file.record_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, UploadStatus::Cancelled);
        assert_eq!(record.progress, 0);
    }

    #[tokio::test]
    async fn test_add_validated_rejects_whole_batch() {
        let controller = controller(MemoryRecordStore::new());
        let bad = FileHandle::from_bytes("tool.exe", "application/x-msdownload", vec![0u8; 4]);

        let result = controller
            .add_validated(vec![handle("ok.txt", 1), bad])
            .await;
        match result {
            Err(FiledropError::Validation(msg)) => {
                assert!(msg.contains("tool.exe has an unsupported file type"))
            }
            other => panic!("unexpected result: {:?}", other.map(|f| f.len())),
        }
        assert!(controller.is_empty().await);

        let added = controller.add_validated(vec![handle("ok.txt", 1)]).await.unwrap();
        assert_eq!(added.len(), 1);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let controller = controller(MemoryRecordStore::new());
        let mut events = controller.subscribe();

        let id = controller.add(vec![handle("a.txt", 1)]).await[0].id;
        controller.upload_all().await.unwrap();
        controller.clear_completed().await;

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }

        assert_eq!(received.first(), Some(&UploadEvent::Added { id }));
        assert!(received.contains(&UploadEvent::StatusChanged {
            id,
            status: UploadStatus::Uploading
        }));
        assert!(received.contains(&UploadEvent::StatusChanged {
            id,
            status: UploadStatus::Completed
        }));
        assert_eq!(received.last(), Some(&UploadEvent::Cleared { count: 1 }));
    }
}
