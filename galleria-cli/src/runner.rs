//! Shared setup for commands that talk to the library.

use galleria::config::ConfigFile;
use galleria::logging::init_logging;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::error::CliError;

/// Loads configuration and installs logging for the lifetime of a command.
pub struct CliRunner {
    config: ConfigFile,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    /// Load `config.ini` and initialize logging from it.
    pub fn new() -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let log_guard = init_logging(&config.logging_config())?;
        Ok(Self {
            config,
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log the command being run.
    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = galleria::VERSION,
            log_file = ?self.config.logging.file,
            "galleria starting"
        );
    }

    /// Build a multi-threaded runtime for async commands.
    pub fn runtime(&self) -> Result<tokio::runtime::Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)
    }
}
