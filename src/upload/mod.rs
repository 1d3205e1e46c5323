//! Upload lifecycle for filedrop.
//!
//! This module provides:
//! - Tracked file state, statistics and controller events
//! - The transfer strategy seam with its per-flow progress channel
//! - A simulated transfer and a chunked transfer into local storage
//! - The upload controller that runs flows concurrently

mod chunked;
mod controller;
mod simulator;
mod transfer;
mod types;

pub use chunked::{StorageTransfer, DEFAULT_CHUNK_SIZE};
pub use controller::{UploadController, DEFAULT_MAX_CONCURRENT};
pub use simulator::SimulatedTransfer;
pub use transfer::{ProgressSender, TransferStrategy};
pub use types::{FileId, TrackedFile, UploadEvent, UploadStats, UploadStatus, UploadSummary};
