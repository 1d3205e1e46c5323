//! Simulated transfer: a randomized progress sequence with no real I/O.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::transfer::{ProgressSender, TransferStrategy};
use crate::config::SimulatorConfig;
use crate::file::FileHandle;
use crate::{FiledropError, Result};

/// Fabricates upload progress for a file.
///
/// Starting from 0, each step waits a random delay and then advances by a
/// random increment, clamping the last step to exactly 100. With a minimum
/// increment of `min_step`, a run takes at most `ceil(100 / min_step)` steps.
/// Instances share nothing, so any number of runs can proceed concurrently.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransfer {
    config: SimulatorConfig,
}

impl SimulatedTransfer {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    fn next_step(&self) -> (Duration, u8) {
        let min_delay = self.config.min_delay_ms.min(self.config.max_delay_ms);
        let min_step = self.config.min_step.clamp(1, 100);
        let max_step = self.config.max_step.clamp(min_step, 100);

        let mut rng = rand::rng();
        let delay = rng.random_range(min_delay..=self.config.max_delay_ms);
        let step = rng.random_range(min_step..=max_step);
        (Duration::from_millis(delay), step)
    }
}

#[async_trait]
impl TransferStrategy for SimulatedTransfer {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn transfer(
        &self,
        file: &FileHandle,
        mut progress: ProgressSender,
        cancel: CancellationToken,
    ) -> Result<Option<String>> {
        let mut current: u8 = 0;

        while current < 100 {
            let (delay, step) = self.next_step();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FiledropError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            current = current.saturating_add(step).min(100);
            trace!(file = file.name(), progress = current, "simulated step");
            progress.report(current).await?;
        }

        Ok(None)
    }
}
