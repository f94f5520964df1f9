//! CLI error type.

use galleria::config::ConfigError;
use galleria::item::ManifestError;
use galleria::loader::LoadError;
use galleria::logging::LoggingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Failed to set up image fetching: {0}")]
    Fetcher(#[from] LoadError),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::ConfigFile(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("bad".to_string()).exit_code(), 2);
        assert_eq!(
            CliError::ConfigFile(ConfigError::UnknownKey("x.y".to_string())).exit_code(),
            2
        );
        assert_eq!(
            CliError::Fetcher(LoadError::Client("tls".to_string())).exit_code(),
            1
        );
    }

    #[test]
    fn test_messages() {
        let err = CliError::ConfigFile(ConfigError::UnknownKey("x.y".to_string()));
        assert_eq!(err.to_string(), "unknown configuration key 'x.y'");
    }
}
