use std::path::PathBuf;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{NotifyError, Result};

const DEFAULT_LOG_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "gitlab_irc_notify";

pub struct FileLogger {
    log_directory: PathBuf,
    max_files: usize,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            max_files: 5,
            rotation: Rotation::DAILY,
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Applies the optional `LOG_MAX_FILES` and `LOG_ROTATION` values on top
    /// of the defaults (5 files, daily).
    pub fn from_settings(
        log_directory: PathBuf,
        max_files: Option<&str>,
        rotation: Option<&str>,
    ) -> Result<Self> {
        let mut logger = Self::new(log_directory);
        if let Some(max_files) = max_files {
            let max_files = max_files
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    NotifyError::ConfigError(format!(
                        "LOG_MAX_FILES must be a positive integer, got '{}'",
                        max_files
                    ))
                })?;
            logger = logger.with_max_files(max_files);
        }
        if let Some(rotation) = rotation {
            logger = logger.with_rotation(parse_rotation(rotation)?);
        }
        Ok(logger)
    }

    /// Creates the log directory and a non-blocking rolling file writer.
    /// The guard must be kept alive for buffered lines to be flushed.
    pub fn setup_file_logging(&self) -> Result<(NonBlocking, WorkerGuard)> {
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(self.rotation.clone())
            .filename_prefix(LOG_FILE_PREFIX)
            .max_log_files(self.max_files)
            .build(&self.log_directory)
            .map_err(|e| {
                NotifyError::ConfigError(format!(
                    "Failed to create log file in '{}': {}",
                    self.log_directory.display(),
                    e
                ))
            })?;

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

fn parse_rotation(name: &str) -> Result<Rotation> {
    match name.trim().to_ascii_lowercase().as_str() {
        "minutely" => Ok(Rotation::MINUTELY),
        "hourly" => Ok(Rotation::HOURLY),
        "daily" => Ok(Rotation::DAILY),
        "never" => Ok(Rotation::NEVER),
        other => Err(NotifyError::ConfigError(format!(
            "Unknown LOG_ROTATION '{}', expected minutely, hourly, daily or never",
            other
        ))),
    }
}

/// `RUST_LOG` when set, `info` otherwise.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs console logging and, when a file logger is given, a second
/// plain-text layer writing to rolling files.
pub fn setup_logging(file_logger: Option<&FileLogger>) -> Result<Option<WorkerGuard>> {
    match file_logger {
        Some(file_logger) => {
            let (file_writer, guard) = file_logger.setup_file_logging()?;
            tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file_writer)
                        .with_ansi(false),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer())
                .init();
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logging_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let logger = FileLogger::from_settings(log_dir.clone(), Some("2"), Some("never")).unwrap();
        assert_eq!(logger.max_files, 2);
        assert_eq!(logger.rotation, Rotation::NEVER);

        let (_writer, _guard) = logger.setup_file_logging().unwrap();
        assert!(log_dir.is_dir());
    }

    #[test]
    fn settings_default_to_five_daily_files() {
        let logger = FileLogger::from_settings(PathBuf::from("logs"), None, None).unwrap();
        assert_eq!(logger.max_files, 5);
        assert_eq!(logger.rotation, Rotation::DAILY);

        let logger = FileLogger::from_settings(PathBuf::from("logs"), None, Some("Hourly")).unwrap();
        assert_eq!(logger.rotation, Rotation::HOURLY);
    }

    #[test]
    fn invalid_settings_are_config_errors() {
        for (max_files, rotation) in [(Some("0"), None), (Some("many"), None), (None, Some("weekly"))] {
            let err = FileLogger::from_settings(PathBuf::from("logs"), max_files, rotation)
                .err()
                .unwrap();
            assert!(matches!(err, NotifyError::ConfigError(_)));
        }
    }
}
