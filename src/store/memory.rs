//! In-process upload record store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{NewUploadRecord, UploadRecord, UploadRecordStore, UploadRecordUpdate};
use crate::{FiledropError, Result};

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<UploadRecord>,
    /// Remaining successful calls before every call fails.
    calls_left: Option<usize>,
}

/// Upload records held in memory.
///
/// Each instance owns its own records; two stores never share state.
/// Optional latency mimics a remote record API and failure injection lets
/// callers exercise the persistence-failure paths.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
    latency: Duration,
}

impl MemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with existing records.
    pub fn with_records(records: Vec<UploadRecord>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                records,
                calls_left: None,
            }),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Create a store whose every call fails.
    pub fn failing() -> Self {
        Self::failing_after(0)
    }

    /// Create a store that serves `calls` calls and fails every call after.
    pub fn failing_after(calls: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                records: Vec::new(),
                calls_left: Some(calls),
            }),
            latency: Duration::ZERO,
        }
    }

    async fn enter(&self) -> Result<tokio::sync::MutexGuard<'_, MemoryState>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state.lock().await;
        if let Some(left) = state.calls_left {
            if left == 0 {
                return Err(FiledropError::Persistence(
                    "record store unavailable".to_string(),
                ));
            }
            state.calls_left = Some(left - 1);
        }
        Ok(state)
    }
}

#[async_trait]
impl UploadRecordStore for MemoryRecordStore {
    async fn create(&self, record: &NewUploadRecord) -> Result<UploadRecord> {
        record.validate()?;
        let mut state = self.enter().await?;

        let id = state.records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let created = UploadRecord {
            id,
            name: record.name.clone(),
            size: record.size,
            mime_type: record.mime_type.clone(),
            status: record.status,
            progress: record.progress,
            uploaded_at: Utc::now(),
            url: record.url.clone(),
        };
        state.records.push(created.clone());
        debug!(id, name = %created.name, "created upload record");

        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<UploadRecord>> {
        let state = self.enter().await?;
        Ok(state.records.iter().find(|r| r.id == id).cloned())
    }

    async fn update(&self, id: i64, update: &UploadRecordUpdate) -> Result<UploadRecord> {
        let mut state = self.enter().await?;
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| FiledropError::NotFound(format!("upload record {id}")))?;

        update.apply_to(record);
        Ok(record.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut state = self.enter().await?;
        let before = state.records.len();
        state.records.retain(|r| r.id != id);
        Ok(state.records.len() < before)
    }

    async fn list_all(&self) -> Result<Vec<UploadRecord>> {
        let state = self.enter().await?;
        let mut records = state.records.clone();
        records.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }
}
