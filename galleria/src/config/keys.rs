//! Individually addressable configuration keys.

use std::path::PathBuf;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use super::file::ConfigFile;
use super::ConfigError;

/// A `section.key` entry of the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    QualityDefaultQuality,
    QualityDefaultWidth,
    GalleryGap,
    GalleryOverscan,
    PreloadCriticalDelayMs,
    PreloadLookahead,
    PlaceholderMaxEntries,
    PlaceholderWidth,
    PlaceholderHeight,
    PlaceholderQuality,
    DeliveryEndpoint,
    DeliveryOptimizedHosts,
    LoggingLevel,
    LoggingFile,
}

const ALL_KEYS: [ConfigKey; 14] = [
    ConfigKey::QualityDefaultQuality,
    ConfigKey::QualityDefaultWidth,
    ConfigKey::GalleryGap,
    ConfigKey::GalleryOverscan,
    ConfigKey::PreloadCriticalDelayMs,
    ConfigKey::PreloadLookahead,
    ConfigKey::PlaceholderMaxEntries,
    ConfigKey::PlaceholderWidth,
    ConfigKey::PlaceholderHeight,
    ConfigKey::PlaceholderQuality,
    ConfigKey::DeliveryEndpoint,
    ConfigKey::DeliveryOptimizedHosts,
    ConfigKey::LoggingLevel,
    ConfigKey::LoggingFile,
];

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::QualityDefaultQuality => "quality.default_quality",
            Self::QualityDefaultWidth => "quality.default_width",
            Self::GalleryGap => "gallery.gap",
            Self::GalleryOverscan => "gallery.overscan",
            Self::PreloadCriticalDelayMs => "preload.critical_delay_ms",
            Self::PreloadLookahead => "preload.lookahead",
            Self::PlaceholderMaxEntries => "placeholder.max_entries",
            Self::PlaceholderWidth => "placeholder.width",
            Self::PlaceholderHeight => "placeholder.height",
            Self::PlaceholderQuality => "placeholder.quality",
            Self::DeliveryEndpoint => "delivery.endpoint",
            Self::DeliveryOptimizedHosts => "delivery.optimized_hosts",
            Self::LoggingLevel => "logging.level",
            Self::LoggingFile => "logging.file",
        }
    }

    /// INI section name.
    pub fn section(&self) -> &'static str {
        self.split().0
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        self.split().1
    }

    fn split(&self) -> (&'static str, &'static str) {
        let name = self.name();
        match name.split_once('.') {
            Some(parts) => parts,
            None => (name, ""),
        }
    }

    /// Current value as text. Unset optional values are empty.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            Self::QualityDefaultQuality => config.quality.default_quality.to_string(),
            Self::QualityDefaultWidth => config.quality.default_width.to_string(),
            Self::GalleryGap => optional(config.gallery.gap),
            Self::GalleryOverscan => optional(config.gallery.overscan),
            Self::PreloadCriticalDelayMs => config.preload.critical_delay_ms.to_string(),
            Self::PreloadLookahead => config.preload.lookahead.to_string(),
            Self::PlaceholderMaxEntries => config.placeholder.max_entries.to_string(),
            Self::PlaceholderWidth => config.placeholder.width.to_string(),
            Self::PlaceholderHeight => config.placeholder.height.to_string(),
            Self::PlaceholderQuality => config.placeholder.quality.to_string(),
            Self::DeliveryEndpoint => config.delivery.endpoint.clone(),
            Self::DeliveryOptimizedHosts => config.delivery.optimized_hosts.join(", "),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse and store `value`.
    ///
    /// An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            Self::QualityDefaultQuality => config.quality.default_quality = self.parse_in(value, 1, 100)?,
            Self::QualityDefaultWidth => config.quality.default_width = self.parse_in(value, 1, u32::MAX)?,
            Self::GalleryGap => {
                config.gallery.gap = if value.is_empty() {
                    None
                } else {
                    let gap: f64 = self.parse(value)?;
                    if !gap.is_finite() || gap < 0.0 {
                        return Err(self.invalid(value, "expected a non-negative number"));
                    }
                    Some(gap)
                }
            }
            Self::GalleryOverscan => {
                config.gallery.overscan = if value.is_empty() {
                    None
                } else {
                    Some(self.parse(value)?)
                }
            }
            Self::PreloadCriticalDelayMs => config.preload.critical_delay_ms = self.parse(value)?,
            Self::PreloadLookahead => config.preload.lookahead = self.parse(value)?,
            Self::PlaceholderMaxEntries => config.placeholder.max_entries = self.parse_in(value, 1, u64::MAX)?,
            Self::PlaceholderWidth => config.placeholder.width = self.parse_in(value, 1, u32::MAX)?,
            Self::PlaceholderHeight => config.placeholder.height = self.parse_in(value, 1, u32::MAX)?,
            Self::PlaceholderQuality => config.placeholder.quality = self.parse_in(value, 1, 100)?,
            Self::DeliveryEndpoint => {
                if value.is_empty() {
                    return Err(self.invalid(value, "endpoint cannot be empty"));
                }
                config.delivery.endpoint = value.to_string();
            }
            Self::DeliveryOptimizedHosts => {
                config.delivery.optimized_hosts = value
                    .split(',')
                    .map(str::trim)
                    .filter(|host| !host.is_empty())
                    .map(String::from)
                    .collect();
            }
            Self::LoggingLevel => {
                if let Err(e) = EnvFilter::try_new(value) {
                    return Err(self.invalid(value, &e.to_string()));
                }
                config.logging.level = value.to_string();
            }
            Self::LoggingFile => {
                config.logging.file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
        }
        Ok(())
    }

    fn parse<T: FromStr>(&self, value: &str) -> Result<T, ConfigError> {
        value
            .parse()
            .map_err(|_| self.invalid(value, "expected a non-negative integer"))
    }

    fn parse_in<T>(&self, value: &str, min: T, max: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + std::fmt::Display,
    {
        let parsed: T = self.parse(value)?;
        if parsed < min || parsed > max {
            return Err(self.invalid(value, &format!("expected a value between {} and {}", min, max)));
        }
        Ok(parsed)
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
