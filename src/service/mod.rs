use crate::journal::{JournalError, JournalSource};
use crate::normalize::{entry_timestamp, Normalizer};
use crate::shipper::{BulkShipper, ShipError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("journal source error: {0}")]
    Journal(#[from] JournalError),

    #[error("shipper error: {0}")]
    Ship(#[from] ShipError),
}

/// Owns the whole pipeline for the process lifetime and pumps it on a
/// single task: read one entry, normalize, enqueue, repeat. Flushes run
/// inline, so "record enqueued" and "record shipped or process aborted"
/// are totally ordered and the checkpoint always equals the cursor of the
/// last item of the most recently acknowledged batch.
pub struct Service {
    source: Box<dyn JournalSource>,
    normalizer: Normalizer,
    shipper: BulkShipper,
    wait_timeout: Duration,
}

impl Service {
    pub fn new(
        source: Box<dyn JournalSource>,
        normalizer: Normalizer,
        shipper: BulkShipper,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            source,
            normalizer,
            shipper,
            wait_timeout,
        }
    }

    /// Run until a component fails or the shutdown signal is observed.
    /// Shutdown is checked only at iteration boundaries, never mid-entry;
    /// on shutdown the shipper drains any partial batch before returning.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) -> Result<(), ServiceError> {
        info!("Pipeline started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.shipper.flush_if_due().await?;

            match self.source.next()? {
                Some(entry) => {
                    let timestamp = entry_timestamp(&entry);
                    let record = self.normalizer.normalize(&entry);
                    self.shipper
                        .enqueue(&record, timestamp, entry.cursor)
                        .await?;
                }
                None => {
                    self.source.wait_for_more(self.wait_timeout).await?;
                }
            }
        }

        info!("Shutdown observed, draining shipper");
        self.shipper.stop().await?;
        info!("Pipeline stopped");
        Ok(())
    }
}
