use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub cursor: CursorConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Target Elasticsearch hosts. Empty means dry-run: documents go to
    /// stdout and no network calls are made.
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            index_prefix: default_index_prefix(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_index_prefix() -> String {
    "journald".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorConfig {
    /// File keeping the last-acknowledged cursor between runs.
    #[serde(default = "default_cursor_path")]
    pub path: PathBuf,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            path: default_cursor_path(),
        }
    }
}

fn default_cursor_path() -> PathBuf {
    PathBuf::from(".journalship_cursor")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_docs")]
    pub max_docs: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    /// Upper bound on how long a buffered record waits before shipping.
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_docs: default_max_docs(),
            max_bytes: default_max_bytes(),
            max_delay: default_max_delay(),
        }
    }
}

fn default_max_docs() -> usize {
    1000
}

fn default_max_bytes() -> usize {
    65536
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journalctl_path")]
    pub journalctl_path: PathBuf,
    /// How long one poll blocks waiting for journal changes.
    #[serde(default = "default_wait_timeout", with = "humantime_serde")]
    pub wait_timeout: Duration,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            journalctl_path: default_journalctl_path(),
            wait_timeout: default_wait_timeout(),
        }
    }
}

fn default_journalctl_path() -> PathBuf {
    PathBuf::from("journalctl")
}

fn default_wait_timeout() -> Duration {
    Duration::from_secs(1)
}
