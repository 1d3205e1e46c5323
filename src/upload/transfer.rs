//! Transfer strategy seam and the per-flow progress channel.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::file::FileHandle;
use crate::{FiledropError, Result};

/// Sending half of a flow's progress channel.
///
/// Each flow owns exactly one channel with a single subscriber: the
/// controller. Reports are clamped to 100 and never go backwards; a report
/// that does not advance is dropped. The channel is bounded, so a strategy
/// cannot run ahead of the subscriber by more than the buffer.
#[derive(Debug)]
pub struct ProgressSender {
    tx: mpsc::Sender<u8>,
    last: Option<u8>,
}

impl ProgressSender {
    /// Create a channel holding at most `buffer` unconsumed reports.
    pub fn channel(buffer: usize) -> (ProgressSender, mpsc::Receiver<u8>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (ProgressSender { tx, last: None }, rx)
    }

    /// Report a new progress value.
    ///
    /// Fails with [`FiledropError::Cancelled`] once the subscriber is gone.
    pub async fn report(&mut self, percent: u8) -> Result<()> {
        let percent = percent.min(100);
        if self.last.is_some_and(|last| percent <= last) {
            return Ok(());
        }

        self.tx
            .send(percent)
            .await
            .map_err(|_| FiledropError::Cancelled)?;
        self.last = Some(percent);
        Ok(())
    }

    /// Last value that was delivered.
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

/// A way of moving one file to its destination.
///
/// Implementations drive progress from 0 to 100 through `progress`, stop
/// with [`FiledropError::Cancelled`] at their next suspension point once
/// `cancel` fires, and return the location of the transferred file when
/// they have one.
#[async_trait]
pub trait TransferStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Transfer `file`, reporting progress until it reaches 100.
    async fn transfer(
        &self,
        file: &FileHandle,
        progress: ProgressSender,
        cancel: CancellationToken,
    ) -> Result<Option<String>>;
}
