pub mod export;
pub mod journalctl;

use crate::cursor::Cursor;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to spawn journalctl: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to read journal stream: {0}")]
    Read(#[from] std::io::Error),

    #[error("malformed journal export entry: {0}")]
    Parse(String),

    #[error("journal entry missing required field {0}")]
    MissingField(&'static str),

    #[error("journalctl exited: {0}")]
    ProcessExited(String),

    #[error("journal source closed unexpectedly")]
    SourceClosed,
}

pub type Result<T> = std::result::Result<T, JournalError>;

/// One journal event as read from the source. Immutable once read; the
/// cursor token strictly orders entries within one journal instance.
#[derive(Debug, Clone)]
pub struct RawEntry {
    /// Field name/value pairs in journal order.
    pub fields: Vec<(String, String)>,
    /// Wall-clock timestamp, microseconds since the Unix epoch.
    pub realtime_usec: u64,
    /// Boot-scoped monotonic timestamp in microseconds.
    pub monotonic_usec: u64,
    /// Boot identifier the monotonic timestamp is scoped to.
    pub boot_id: String,
    /// Opaque resume token for this entry's position.
    pub cursor: Cursor,
}

/// A resumable, ordered stream of journal entries.
///
/// Implementations open at the journal's current tail, or strictly after a
/// resume cursor. The caller polls `next` and falls back to `wait_for_more`
/// with a bounded timeout when no entry is available; the journal has no
/// push notification contract beyond "block until changed or timeout".
#[async_trait]
pub trait JournalSource: Send {
    /// The next entry in cursor order, or `None` if none is available yet.
    fn next(&mut self) -> Result<Option<RawEntry>>;

    /// Block until the journal may have more entries, or the timeout elapses.
    async fn wait_for_more(&mut self, timeout: Duration) -> Result<()>;
}
