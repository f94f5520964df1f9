//! Logging setup.
//!
//! Installs a global `tracing` subscriber with a stderr layer and an optional
//! file layer. `RUST_LOG` takes precedence over the configured level.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    /// Also write logs to this file (no ANSI colours).
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("invalid log file path {0}")]
    FilePath(PathBuf),

    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when a log file is configured. Logs
/// buffered for the file are flushed when the guard is dropped, so keep it
/// alive for the lifetime of the program.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = resolve_filter(std::env::var("RUST_LOG").ok(), &config.level)?;
    let timer = local_timer();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer.clone())
        .with_target(true);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(timer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(guard)
}

/// Build the filter, preferring a non-empty `RUST_LOG` value over `level`.
fn resolve_filter(env: Option<String>, level: &str) -> Result<EnvFilter, LoggingError> {
    let directive = match env {
        Some(env) if !env.trim().is_empty() => env,
        _ => level.to_string(),
    };

    EnvFilter::try_new(&directive).map_err(|e| LoggingError::Filter {
        filter: directive,
        reason: e.to_string(),
    })
}

fn local_timer() -> OffsetTime<Rfc3339> {
    // The local offset is unavailable in some multi-threaded environments
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::FilePath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_env_overrides_level() {
        let filter = resolve_filter(Some("galleria=trace".to_string()), "warn").unwrap();
        assert_eq!(filter.to_string(), "galleria=trace");

        let filter = resolve_filter(Some("  ".to_string()), "warn").unwrap();
        assert_eq!(filter.to_string(), "warn");

        let filter = resolve_filter(None, "debug").unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_invalid_filter() {
        let err = resolve_filter(None, "galleria=loud").unwrap_err();
        assert!(matches!(err, LoggingError::Filter { ref filter, .. } if filter == "galleria=loud"));
    }

    #[test]
    fn test_file_path_without_name() {
        assert!(matches!(file_writer(Path::new("/")), Err(LoggingError::FilePath(_))));
    }

    #[test]
    fn test_init_with_file_then_reinit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("galleria.log");
        let config = LoggingConfig::default().with_level("debug").with_file(&path);

        let guard = init_logging(&config).unwrap();
        assert!(guard.is_some());
        tracing::info!(test = "logging", "written to file");
        drop(guard);

        assert!(path.exists());
        assert!(matches!(
            init_logging(&LoggingConfig::default()),
            Err(LoggingError::AlreadyInitialized)
        ));
    }
}
