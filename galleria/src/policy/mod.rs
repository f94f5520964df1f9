//! Quality selection policy.
//!
//! [`QualitySelector`] combines a [`DeviceProfile`] with the caller's request
//! and the performance feedback hint into an [`EffectivePolicy`]. Each
//! constraint can only lower quality, width and concurrency:
//!
//! ```text
//! requested ─► mobile cap ─► slow-link cap ─► low-memory cap ─► reduce hint ─► DPR scale
//!  75/800/6     50/400/3      35/300/2          30/200/1        q-15 (≥20)     w × min(dpr,2)
//! ```
//!
//! The function is pure: the same inputs always yield the same policy.

mod url;

pub use url::{DeliveryConfig, RequestUrlBuilder, DEFAULT_IMAGE_ENDPOINT};

use serde::Serialize;

use crate::device::{DeviceProfile, MAX_PIXEL_RATIO};

/// Quality used when the caller does not ask for one.
pub const DEFAULT_QUALITY: u8 = 75;

/// Quality ceiling; requests above it are clamped.
pub const MAX_QUALITY: u8 = 75;

/// Quality floor; no constraint ever pushes quality below it.
pub const MIN_QUALITY: u8 = 20;

/// Width used when the caller does not ask for one.
pub const DEFAULT_WIDTH: u32 = 800;

/// Width floor, below which previews stop being legible.
pub const MIN_LEGIBLE_WIDTH: u32 = 16;

/// Concurrency ceiling for unconstrained devices.
pub const MAX_CONCURRENT: usize = 6;

/// Quality reduction applied when the monitor reports poor performance.
pub const QUALITY_REDUCTION_STEP: u8 = 15;

/// Memory at or below which a device counts as low-memory (GB).
pub const LOW_MEMORY_GB: f64 = 2.0;

/// Thumbnail width on mobile devices.
pub const MOBILE_THUMBNAIL_WIDTH: u32 = 100;

/// Thumbnail width on everything else.
pub const DESKTOP_THUMBNAIL_WIDTH: u32 = 150;

/// Caps applied by a single device constraint.
#[derive(Debug, Clone, Copy)]
struct Caps {
    quality: u8,
    width: u32,
    concurrency: usize,
}

const MOBILE_CAPS: Caps = Caps {
    quality: 50,
    width: 400,
    concurrency: 3,
};

const SLOW_CONNECTION_CAPS: Caps = Caps {
    quality: 35,
    width: 300,
    concurrency: 2,
};

const LOW_MEMORY_CAPS: Caps = Caps {
    quality: 30,
    width: 200,
    concurrency: 1,
};

/// What the caller asks for before device constraints are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityRequest {
    /// Requested encoding quality.
    pub quality: u8,
    /// Requested display width in CSS pixels.
    pub width: u32,
    /// Performance feedback asked for lower quality.
    pub reduce_quality: bool,
}

impl Default for QualityRequest {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            width: DEFAULT_WIDTH,
            reduce_quality: false,
        }
    }
}

impl QualityRequest {
    /// Request a given width at the default quality.
    pub fn width(width: u32) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    /// Set the requested quality.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Set the reduce-quality hint.
    pub fn with_reduce_quality(mut self, reduce: bool) -> Self {
        self.reduce_quality = reduce;
        self
    }
}

/// The quality, width and concurrency actually used for requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectivePolicy {
    /// Encoding quality in `[MIN_QUALITY, MAX_QUALITY]`.
    pub quality: u8,
    /// Request width in device pixels, at least [`MIN_LEGIBLE_WIDTH`].
    pub max_width: u32,
    /// Concurrent load limit in `[1, MAX_CONCURRENT]`.
    pub max_concurrent: usize,
}

/// Pure policy function from device profile and request to effective policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct QualitySelector;

impl QualitySelector {
    /// Create a selector.
    pub fn new() -> Self {
        Self
    }

    /// Compute the effective policy.
    pub fn select(&self, profile: &DeviceProfile, request: QualityRequest) -> EffectivePolicy {
        let mut quality = request.quality.clamp(MIN_QUALITY, MAX_QUALITY);
        let mut width = request.width;
        let mut concurrency = MAX_CONCURRENT;

        let mut apply = |caps: Caps| {
            quality = quality.min(caps.quality);
            width = width.min(caps.width);
            concurrency = concurrency.min(caps.concurrency);
        };

        if profile.is_mobile {
            apply(MOBILE_CAPS);
        }
        if profile.is_slow_connection {
            apply(SLOW_CONNECTION_CAPS);
        }
        if profile.device_memory_gb.is_some_and(|gb| gb <= LOW_MEMORY_GB) {
            apply(LOW_MEMORY_CAPS);
        }

        if request.reduce_quality {
            quality = quality.saturating_sub(QUALITY_REDUCTION_STEP).max(MIN_QUALITY);
        }

        EffectivePolicy {
            quality,
            max_width: scale_width(width, profile.pixel_ratio),
            max_concurrent: concurrency,
        }
    }

    /// Thumbnail width for the device, in CSS pixels.
    pub fn thumbnail_width(&self, profile: &DeviceProfile) -> u32 {
        if profile.is_mobile {
            MOBILE_THUMBNAIL_WIDTH
        } else {
            DESKTOP_THUMBNAIL_WIDTH
        }
    }
}

fn scale_width(width: u32, pixel_ratio: f64) -> u32 {
    let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
        pixel_ratio.min(MAX_PIXEL_RATIO)
    } else {
        1.0
    };
    let scaled = (width as f64 * ratio).round();
    let ceiling = width.saturating_mul(2) as f64;
    (scaled.min(ceiling) as u32).max(MIN_LEGIBLE_WIDTH)
}
