use super::{export, JournalError, JournalSource, RawEntry, Result};
use crate::config::types::JournalConfig;
use crate::cursor::Cursor;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 1024;
const STDERR_TAIL_LINES: usize = 4;

/// Journal source backed by a `journalctl --follow --output=export` child
/// process. A reader task parses the export stream and feeds a bounded
/// channel; `next` polls the channel and `wait_for_more` blocks on it with
/// a timeout. Channel order preserves journal order.
pub struct JournalctlSource {
    entries: mpsc::Receiver<Result<RawEntry>>,
    lookahead: Option<RawEntry>,
}

impl JournalctlSource {
    /// Spawn journalctl. A present resume cursor starts the stream strictly
    /// after that entry (`--after-cursor`); an absent one starts at the
    /// current tail (`--lines=0`), with no historical backfill.
    pub fn spawn(config: &JournalConfig, resume: Option<&Cursor>) -> Result<Self> {
        let mut cmd = Command::new(&config.journalctl_path);
        cmd.arg("--follow").arg("--output=export").arg("--no-pager");
        match resume {
            Some(cursor) => {
                cmd.arg("--after-cursor").arg(cursor.as_str());
            }
            None => {
                cmd.arg("--lines=0");
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(JournalError::Spawn)?;
        let stdout = child.stdout.take().ok_or(JournalError::SourceClosed)?;
        let stderr = child.stderr.take();

        // Drain stderr as it arrives, keeping the last few lines for the
        // exit diagnostic.
        let stderr_tail: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let mut stderr_task = stderr.map(|stderr| {
            let tail = stderr_tail.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let mut tail = tail.lock().unwrap();
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            })
        });

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            loop {
                match export::read_entry(&mut reader).await {
                    Ok(Some(entry)) => {
                        if tx.send(Ok(entry)).await.is_err() {
                            // Receiver dropped, shut the child down
                            break;
                        }
                    }
                    Ok(None) => {
                        // journalctl --follow should never exit on its own
                        let status = match child.wait().await {
                            Ok(status) => status.to_string(),
                            Err(e) => e.to_string(),
                        };
                        if let Some(task) = stderr_task.take() {
                            let _ = task.await;
                        }
                        let tail = stderr_tail
                            .lock()
                            .unwrap()
                            .iter()
                            .cloned()
                            .collect::<Vec<_>>()
                            .join("; ");
                        let message = if tail.is_empty() {
                            status
                        } else {
                            format!("{}: {}", status, tail)
                        };
                        let _ = tx.send(Err(JournalError::ProcessExited(message))).await;
                        break;
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        tracing::info!(
            journalctl = %config.journalctl_path.display(),
            resuming = resume.is_some(),
            "journalctl source started"
        );
        Ok(Self {
            entries: rx,
            lookahead: None,
        })
    }
}

#[async_trait]
impl JournalSource for JournalctlSource {
    fn next(&mut self) -> Result<Option<RawEntry>> {
        if let Some(entry) = self.lookahead.take() {
            return Ok(Some(entry));
        }
        match self.entries.try_recv() {
            Ok(Ok(entry)) => Ok(Some(entry)),
            Ok(Err(e)) => Err(e),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(JournalError::SourceClosed),
        }
    }

    async fn wait_for_more(&mut self, timeout: Duration) -> Result<()> {
        if self.lookahead.is_some() {
            return Ok(());
        }
        match tokio::time::timeout(timeout, self.entries.recv()).await {
            Ok(Some(Ok(entry))) => {
                self.lookahead = Some(entry);
                Ok(())
            }
            Ok(Some(Err(e))) => Err(e),
            Ok(None) => Err(JournalError::SourceClosed),
            // Timeout: no data yet, caller re-polls
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let config = JournalConfig {
            journalctl_path: PathBuf::from("/nonexistent/journalctl"),
            ..JournalConfig::default()
        };
        let result = JournalctlSource::spawn(&config, None);
        assert!(matches!(result, Err(JournalError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_process_exit_reports_stderr_tail() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("journalctl");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'Failed to open journal' >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = JournalConfig {
            journalctl_path: script,
            ..JournalConfig::default()
        };
        let mut source = JournalctlSource::spawn(&config, None).unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Err(e) = source.wait_for_more(Duration::from_millis(50)).await {
                    return e;
                }
                if let Err(e) = source.next() {
                    return e;
                }
            }
        })
        .await
        .unwrap();

        assert!(matches!(err, JournalError::ProcessExited(_)));
        assert!(err.to_string().contains("Failed to open journal"));
    }
}
