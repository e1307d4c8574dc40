use crate::config::{self, Config};
use crate::cursor::{CursorError, CursorStore};
use crate::journal::journalctl::JournalctlSource;
use crate::journal::JournalError;
use crate::normalize::Normalizer;
use crate::service::{Service, ServiceError};
use crate::shipper::sink::{BulkSink, ElasticSink, SinkError, StdoutSink};
use crate::shipper::BulkShipper;
use std::path::PathBuf;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("journal source error: {0}")]
    Journal(#[from] JournalError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub hosts: Option<String>,
    pub index_prefix: Option<String>,
    pub cursor_file: Option<PathBuf>,
    pub hostname: Option<String>,
}

pub async fn run(opts: RunOptions) -> Result<(), RunError> {
    let mut config = match &opts.config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            config::load_config(path)?
        }
        None => {
            info!("No config file found, using defaults");
            Config::default()
        }
    };
    apply_overrides(&mut config, &opts);

    let hostname = match opts.hostname {
        Some(hostname) => hostname,
        None => hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|e| {
                warn!(error = %e, "Could not determine hostname, using 'localhost'");
                "localhost".to_string()
            }),
    };

    let cursor_store = CursorStore::new(&config.cursor.path);
    let resume = cursor_store.load()?;
    match &resume {
        Some(cursor) => info!(cursor = %cursor, "Resuming strictly after stored cursor"),
        None => info!("Starting at journal tail"),
    }

    let source = JournalctlSource::spawn(&config.journal, resume.as_ref())?;

    let sink: Box<dyn BulkSink> = if config.sink.hosts.is_empty() {
        warn!("No sink hosts configured, running dry-run: documents go to stdout");
        Box::new(StdoutSink)
    } else {
        info!(hosts = ?config.sink.hosts, prefix = %config.sink.index_prefix, "Shipping to Elasticsearch");
        Box::new(ElasticSink::new(
            &config.sink.hosts,
            config.sink.request_timeout,
        )?)
    };

    let shipper = BulkShipper::new(
        sink,
        cursor_store,
        config.sink.index_prefix.clone(),
        config.batch.max_docs,
        config.batch.max_bytes,
        config.batch.max_delay,
    );
    let service = Service::new(
        Box::new(source),
        Normalizer::new(hostname),
        shipper,
        config.journal.wait_timeout,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handle = tokio::spawn(service.run(shutdown_rx));

    tokio::select! {
        cause = shutdown_signal() => {
            let cause = cause.map_err(RunError::Signal)?;
            info!(signal = cause, "Shutdown signal received");
            let _ = shutdown_tx.send(true);
            handle.await??;
        }
        result = &mut handle => {
            result??;
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolve when a termination request arrives: interactive Ctrl-C, or the
/// SIGTERM a process supervisor sends on stop.
async fn shutdown_signal() -> std::io::Result<&'static str> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::select! {
        result = signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

fn apply_overrides(config: &mut Config, opts: &RunOptions) {
    if let Some(hosts) = &opts.hosts {
        config.sink.hosts = hosts
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
    }
    if let Some(prefix) = &opts.index_prefix {
        config.sink.index_prefix = prefix.clone();
    }
    if let Some(path) = &opts.cursor_file {
        config.cursor.path = path.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosts_override_splits_on_comma() {
        let mut config = Config::default();
        let opts = RunOptions {
            hosts: Some("es1:9200, es2:9200,".to_string()),
            ..RunOptions::default()
        };
        apply_overrides(&mut config, &opts);
        assert_eq!(config.sink.hosts, vec!["es1:9200", "es2:9200"]);
    }

    #[test]
    fn test_overrides_leave_unset_fields_alone() {
        let mut config = Config::default();
        apply_overrides(&mut config, &RunOptions::default());
        assert_eq!(config.sink.index_prefix, "journald");
        assert!(config.sink.hosts.is_empty());
    }

    #[tokio::test]
    async fn test_sigterm_resolves_shutdown_signal() {
        let handle = tokio::spawn(shutdown_signal());
        // Let the handler register before raising the signal
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        std::process::Command::new("kill")
            .arg("-TERM")
            .arg(std::process::id().to_string())
            .status()
            .unwrap();

        let cause = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(cause, "SIGTERM");
    }

    #[test]
    fn test_prefix_and_cursor_overrides() {
        let mut config = Config::default();
        let opts = RunOptions {
            index_prefix: Some("logs".to_string()),
            cursor_file: Some(PathBuf::from("/tmp/cursor")),
            ..RunOptions::default()
        };
        apply_overrides(&mut config, &opts);
        assert_eq!(config.sink.index_prefix, "logs");
        assert_eq!(config.cursor.path, PathBuf::from("/tmp/cursor"));
    }
}
