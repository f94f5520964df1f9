//! Persistent configuration.
//!
//! Settings live in an INI file under the user's configuration directory:
//!
//! ```ini
//! [quality]
//! default_quality = 75
//! default_width = 800
//!
//! [gallery]
//! gap = 8
//! overscan = 2
//!
//! [preload]
//! critical_delay_ms = 1000
//! lookahead = 3
//!
//! [placeholder]
//! max_entries = 512
//! width = 8
//! height = 12
//! quality = 10
//!
//! [delivery]
//! endpoint = /_next/image
//! optimized_hosts = vercel.app, netlify.app
//!
//! [logging]
//! level = info
//! file = /var/log/galleria.log
//! ```
//!
//! Missing files and missing keys fall back to defaults. Every key can be
//! read and written individually through [`ConfigKey`].

mod file;
mod keys;

pub use file::{
    ConfigFile, DeliverySettings, GallerySettings, LoggingSettings, PlaceholderSettings, PreloadSettings,
    QualitySettings,
};
pub use keys::ConfigKey;

use std::path::PathBuf;

use thiserror::Error;

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors from loading, saving or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue { key: String, value: String, reason: String },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Directory holding galleria's configuration.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("galleria")
}

/// Full path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}
