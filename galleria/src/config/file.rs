//! INI-backed configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::{debug, warn};

use super::keys::ConfigKey;
use super::{config_file_path, ConfigError};
use crate::engine::GalleryConfig;
use crate::logging::LoggingConfig;
use crate::placeholder::PlaceholderConfig;
use crate::policy::{DeliveryConfig, QualityRequest, DEFAULT_IMAGE_ENDPOINT};
use crate::preload::PreloadConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualitySettings {
    pub default_quality: u8,
    pub default_width: u32,
}

impl Default for QualitySettings {
    fn default() -> Self {
        let request = QualityRequest::default();
        Self {
            default_quality: request.quality,
            default_width: request.width,
        }
    }
}

/// Grid overrides. Unset values use the device-dependent defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GallerySettings {
    pub gap: Option<f64>,
    pub overscan: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadSettings {
    pub critical_delay_ms: u64,
    pub lookahead: usize,
}

impl Default for PreloadSettings {
    fn default() -> Self {
        let preload = PreloadConfig::default();
        Self {
            critical_delay_ms: preload.critical_delay.as_millis() as u64,
            lookahead: preload.lookahead,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderSettings {
    pub max_entries: u64,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl Default for PlaceholderSettings {
    fn default() -> Self {
        let placeholder = PlaceholderConfig::default();
        Self {
            max_entries: placeholder.max_entries,
            width: placeholder.width,
            height: placeholder.height,
            quality: placeholder.quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    pub endpoint: String,
    pub optimized_hosts: Vec<String>,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        let delivery = DeliveryConfig::default();
        Self {
            endpoint: DEFAULT_IMAGE_ENDPOINT.to_string(),
            optimized_hosts: delivery.optimized_hosts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Optional log file in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Contents of `config.ini`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub quality: QualitySettings,
    pub gallery: GallerySettings,
    pub preload: PreloadSettings,
    pub placeholder: PlaceholderSettings,
    pub delivery: DeliverySettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::default();
        for (section, properties) in ini.iter() {
            let Some(section) = section else {
                continue;
            };
            for (key, value) in properties.iter() {
                let name = format!("{}.{}", section, key);
                match name.parse::<ConfigKey>() {
                    Ok(config_key) => config_key.set(&mut config, value)?,
                    Err(_) => warn!(key = %name, path = %path.display(), "Ignoring unknown config key"),
                }
            }
        }

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories as needed.
    ///
    /// Unset optional values are omitted.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section())).set(key.key_name(), value);
            }
        }

        ini.write_to_file(path).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Engine configuration built from these settings.
    pub fn to_gallery_config(&self) -> GalleryConfig {
        let quality = QualityRequest::width(self.quality.default_width).with_quality(self.quality.default_quality);

        let preload = PreloadConfig::default()
            .with_critical_delay(Duration::from_millis(self.preload.critical_delay_ms))
            .with_lookahead(self.preload.lookahead);

        let placeholder = PlaceholderConfig::default()
            .with_max_entries(self.placeholder.max_entries)
            .with_size(self.placeholder.width, self.placeholder.height)
            .with_quality(self.placeholder.quality);

        let delivery = DeliveryConfig::default()
            .with_endpoint(self.delivery.endpoint.clone())
            .with_optimized_hosts(self.delivery.optimized_hosts.clone());

        let mut config = GalleryConfig::default()
            .with_quality(quality)
            .with_preload(preload)
            .with_placeholder(placeholder)
            .with_delivery(delivery);

        if let Some(gap) = self.gallery.gap {
            config = config.with_gap(gap);
        }
        if let Some(overscan) = self.gallery.overscan {
            config = config.with_overscan(overscan);
        }
        config
    }

    /// Logging configuration built from these settings.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level.clone(),
            file: self.logging.file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.quality.default_quality = 60;
        config.gallery.overscan = Some(4);
        config.delivery.optimized_hosts = vec!["example.net".to_string()];
        config.logging.file = Some(PathBuf::from("/tmp/galleria.log"));
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[preload]\nlookahead = 5\n\n[unknown]\nfoo = bar\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.preload.lookahead, 5);
        assert_eq!(config.preload.critical_delay_ms, 1000);
        assert_eq!(config.quality, QualitySettings::default());
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[quality]\ndefault_quality = high\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "quality.default_quality"));
    }

    #[test]
    fn test_to_gallery_config() {
        let mut config = ConfigFile::default();
        config.quality.default_width = 1200;
        config.gallery.gap = Some(16.0);
        config.preload.critical_delay_ms = 0;
        config.placeholder.width = 4;

        let gallery = config.to_gallery_config();
        assert_eq!(gallery.quality.width, 1200);
        assert_eq!(gallery.quality.quality, 75);
        assert_eq!(gallery.gap, 16.0);
        assert_eq!(gallery.overscan, None);
        assert!(gallery.preload.critical_delay.is_zero());
        assert_eq!(gallery.placeholder.width, 4);
        assert_eq!(gallery.delivery, DeliveryConfig::default());
    }

    #[test]
    fn test_default_round_trips_through_gallery_config() {
        assert_eq!(ConfigFile::default().to_gallery_config(), GalleryConfig::default());
    }
}
