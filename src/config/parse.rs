use super::expand_tilde;
use super::types::Config;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file '{}': {source}", path.display())]
    YamlParse {
        path: std::path::PathBuf,
        source: serde_yaml::Error,
    },

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut config: Config =
        serde_yaml::from_str(&yaml_string).map_err(|e| ConfigError::YamlParse {
            path: path.to_path_buf(),
            source: e,
        })?;

    config.cursor.path = expand_tilde(&config.cursor.path);
    config.journal.journalctl_path = expand_tilde(&config.journal.journalctl_path);

    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.sink.index_prefix.is_empty() {
        return Err(ConfigError::Validation(
            "sink.index_prefix must not be empty".to_string(),
        ));
    }
    if config.sink.hosts.iter().any(|h| h.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "sink.hosts must not contain empty entries".to_string(),
        ));
    }
    if config.batch.max_docs == 0 {
        return Err(ConfigError::Validation(
            "batch.max_docs must be at least 1".to_string(),
        ));
    }
    if config.batch.max_bytes == 0 {
        return Err(ConfigError::Validation(
            "batch.max_bytes must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let file = write_config("{}");
        let config = load_config(file.path()).unwrap();

        assert!(config.sink.hosts.is_empty());
        assert_eq!(config.sink.index_prefix, "journald");
        assert_eq!(config.batch.max_docs, 1000);
        assert_eq!(config.batch.max_bytes, 65536);
        assert_eq!(config.batch.max_delay.as_secs(), 30);
        assert_eq!(config.journal.wait_timeout.as_secs(), 1);
        assert_eq!(
            config.cursor.path,
            std::path::PathBuf::from(".journalship_cursor")
        );
    }

    #[test]
    fn test_full_config_parses() {
        let file = write_config(
            "sink:\n\
             \x20 hosts: [\"es1:9200\", \"es2:9200\"]\n\
             \x20 index_prefix: logs\n\
             \x20 request_timeout: 10s\n\
             cursor:\n\
             \x20 path: /var/lib/journalship/cursor\n\
             batch:\n\
             \x20 max_docs: 500\n\
             \x20 max_bytes: 32768\n\
             \x20 max_delay: 5s\n\
             journal:\n\
             \x20 wait_timeout: 2s\n",
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.sink.hosts, vec!["es1:9200", "es2:9200"]);
        assert_eq!(config.sink.index_prefix, "logs");
        assert_eq!(config.sink.request_timeout.as_secs(), 10);
        assert_eq!(config.batch.max_docs, 500);
        assert_eq!(config.batch.max_delay.as_secs(), 5);
        assert_eq!(config.journal.wait_timeout.as_secs(), 2);
    }

    #[test]
    fn test_zero_max_docs_rejected() {
        let file = write_config("batch:\n  max_docs: 0\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let file = write_config("sink:\n  index_prefix: \"\"\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error_with_path() {
        let file = write_config("sink: [unclosed");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::YamlParse { .. }));
        assert!(err
            .to_string()
            .contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/config.yml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_default_config_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.batch.max_docs, 1000);
        assert_eq!(parsed.sink.index_prefix, "journald");
    }
}
