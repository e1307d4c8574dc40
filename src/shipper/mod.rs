pub mod sink;

use crate::cursor::{Cursor, CursorError, CursorStore};
use crate::normalize::NormalizedRecord;
use chrono::{DateTime, Utc};
use sink::{BulkSink, SinkError};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShipError {
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to checkpoint cursor: {0}")]
    Cursor(#[from] CursorError),

    #[error("sink reported errors on intake")]
    SinkReportedErrors,

    #[error("bulk response acknowledged {acknowledged} items, {sent} were sent")]
    ItemCountMismatch { sent: usize, acknowledged: usize },

    #[error("bulk response checkpoint id '{got}' does not match last submitted cursor '{expected}'")]
    CheckpointMismatch { expected: String, got: String },
}

pub type Result<T> = std::result::Result<T, ShipError>;

struct BufferedDoc {
    action: String,
    id: Cursor,
    body: String,
}

/// Accumulates normalized records and ships them as one bulk request when a
/// count, size, or delay threshold is hit. On a fully-acknowledged flush the
/// cursor of the batch's last item is persisted before the buffer resets;
/// any submission or checkpoint failure is fatal to the pipeline, because
/// partial success cannot be safely disambiguated.
pub struct BulkShipper {
    sink: Box<dyn BulkSink>,
    cursor_store: CursorStore,
    index_prefix: String,
    max_docs: usize,
    max_bytes: usize,
    max_delay: Duration,
    buffer: Vec<BufferedDoc>,
    buffered_bytes: usize,
    first_enqueued_at: Option<Instant>,
}

impl BulkShipper {
    pub fn new(
        sink: Box<dyn BulkSink>,
        cursor_store: CursorStore,
        index_prefix: impl Into<String>,
        max_docs: usize,
        max_bytes: usize,
        max_delay: Duration,
    ) -> Self {
        Self {
            sink,
            cursor_store,
            index_prefix: index_prefix.into(),
            max_docs,
            max_bytes,
            max_delay,
            buffer: Vec::new(),
            buffered_bytes: 0,
            first_enqueued_at: None,
        }
    }

    pub fn buffered_docs(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer one record, flushing if the count or size threshold is
    /// reached. The document id is the record's cursor token, so re-indexed
    /// duplicates after a crash upsert instead of duplicating.
    pub async fn enqueue(
        &mut self,
        record: &NormalizedRecord,
        timestamp: DateTime<Utc>,
        cursor: Cursor,
    ) -> Result<()> {
        let body = serde_json::to_string(record)?;
        let index = format!("{}-{}", self.index_prefix, timestamp.format("%Y-%m-%d"));
        let action =
            serde_json::json!({"index": {"_index": index, "_id": cursor.as_str()}}).to_string();

        if self.buffer.is_empty() {
            self.first_enqueued_at = Some(Instant::now());
        }
        // Count the payload as it goes on the wire, action line included
        self.buffered_bytes += action.len() + body.len() + 2;
        self.buffer.push(BufferedDoc {
            action,
            id: cursor,
            body,
        });

        if self.buffer.len() >= self.max_docs || self.buffered_bytes >= self.max_bytes {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flush if the oldest buffered record has waited past the delay
    /// threshold, so a thin trickle of events still ships within a bounded
    /// latency. Called by the pump loop between entries.
    pub async fn flush_if_due(&mut self) -> Result<()> {
        if let Some(first) = self.first_enqueued_at {
            if first.elapsed() >= self.max_delay {
                self.flush().await?;
            }
        }
        Ok(())
    }

    /// Drain: flush any partial batch. Called on clean shutdown, so no
    /// record accepted by `enqueue` is ever silently lost.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let last_cursor = match self.buffer.last() {
            Some(doc) => doc.id.clone(),
            None => return Ok(()),
        };

        let mut payload = String::with_capacity(self.buffered_bytes);
        for doc in &self.buffer {
            payload.push_str(&doc.action);
            payload.push('\n');
            payload.push_str(&doc.body);
            payload.push('\n');
        }

        let response = self.sink.submit(payload).await?;

        if response.errors {
            return Err(ShipError::SinkReportedErrors);
        }
        if response.items.len() != self.buffer.len() {
            return Err(ShipError::ItemCountMismatch {
                sent: self.buffer.len(),
                acknowledged: response.items.len(),
            });
        }
        // Checked non-empty above, items length matches
        let acked_id = &response.items[response.items.len() - 1].index.id;
        if acked_id != last_cursor.as_str() {
            return Err(ShipError::CheckpointMismatch {
                expected: last_cursor.as_str().to_string(),
                got: acked_id.clone(),
            });
        }

        // The checkpoint must be durable before the buffer resets; a save
        // failure here aborts with the batch still un-acknowledged in memory.
        self.cursor_store.save(&last_cursor)?;

        tracing::debug!(
            docs = self.buffer.len(),
            bytes = self.buffered_bytes,
            cursor = %last_cursor,
            "Flushed bulk batch"
        );
        self.buffer.clear();
        self.buffered_bytes = 0;
        self.first_enqueued_at = None;
        Ok(())
    }
}
