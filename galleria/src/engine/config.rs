//! Engine configuration.

use crate::placeholder::PlaceholderConfig;
use crate::policy::{DeliveryConfig, QualityRequest};
use crate::preload::PreloadConfig;
use crate::visibility::ObserverOptions;
use crate::window::DEFAULT_GAP;

/// Configuration for [`GalleryEngine`](super::GalleryEngine).
///
/// Every field has a working default, so callers only override what they
/// need:
///
/// ```
/// use galleria::GalleryConfig;
/// use galleria::policy::QualityRequest;
///
/// let config = GalleryConfig::default()
///     .with_quality(QualityRequest::width(1200).with_quality(60))
///     .with_overscan(3);
/// assert_eq!(config.overscan, Some(3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryConfig {
    /// Base quality and width before device constraints.
    pub quality: QualityRequest,
    /// Request URL derivation.
    pub delivery: DeliveryConfig,
    /// Blur placeholder settings.
    pub placeholder: PlaceholderConfig,
    /// Preload timing and look-ahead.
    pub preload: PreloadConfig,
    /// Vertical gap between rows in pixels.
    pub gap: f64,
    /// Overscan rows. `None` uses the device-dependent default.
    pub overscan: Option<usize>,
    /// Lazy-activation tuning.
    pub observer: ObserverOptions,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            quality: QualityRequest::default(),
            delivery: DeliveryConfig::default(),
            placeholder: PlaceholderConfig::default(),
            preload: PreloadConfig::default(),
            gap: DEFAULT_GAP,
            overscan: None,
            observer: ObserverOptions::default(),
        }
    }
}

impl GalleryConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, quality: QualityRequest) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryConfig) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_placeholder(mut self, placeholder: PlaceholderConfig) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn with_preload(mut self, preload: PreloadConfig) -> Self {
        self.preload = preload;
        self
    }

    /// Set the row gap. Negative or non-finite values are ignored.
    pub fn with_gap(mut self, gap: f64) -> Self {
        if gap.is_finite() && gap >= 0.0 {
            self.gap = gap;
        }
        self
    }

    /// Override the device-dependent overscan.
    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = Some(overscan);
        self
    }

    pub fn with_observer(mut self, observer: ObserverOptions) -> Self {
        self.observer = observer;
        self
    }
}
