//! Device profile derivation from platform signals.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::signals::{ConnectionHint, PlatformSignals};

/// Pixel ratio beyond which higher-density requests stop paying off.
pub const MAX_PIXEL_RATIO: f64 = 2.0;

/// Pixel ratio assumed when the platform does not report one.
const DEFAULT_PIXEL_RATIO: f64 = 1.0;

const MOBILE_PATTERN: &str = r"(?i)Android|webOS|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini";

fn mobile_regex() -> &'static Regex {
    static MOBILE: OnceLock<Regex> = OnceLock::new();
    MOBILE.get_or_init(|| Regex::new(MOBILE_PATTERN).expect("mobile user agent pattern is valid"))
}

/// Snapshot of device and network characteristics.
///
/// Recomputed on demand; never cached as a source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceProfile {
    /// User agent matched a mobile device family.
    pub is_mobile: bool,
    /// Connection hints (or the fallback) describe a slow link.
    pub is_slow_connection: bool,
    /// Pixel density, capped at 2.0 (lower values pass through).
    pub pixel_ratio: f64,
    /// Approximate device memory, if the platform exposes it.
    pub device_memory_gb: Option<f64>,
}

impl DeviceProfile {
    /// Desktop profile on a fast connection with unknown memory.
    pub fn desktop() -> Self {
        Self {
            is_mobile: false,
            is_slow_connection: false,
            pixel_ratio: DEFAULT_PIXEL_RATIO,
            device_memory_gb: None,
        }
    }

    /// Mobile profile on a fast connection with unknown memory.
    pub fn mobile() -> Self {
        Self {
            is_mobile: true,
            ..Self::desktop()
        }
    }

    /// Whether the device is mobile or on a slow link.
    pub fn is_constrained(&self) -> bool {
        self.is_mobile || self.is_slow_connection
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::desktop()
    }
}

/// Reads ambient signals and derives a [`DeviceProfile`].
///
/// Side-effect free and never fails: every missing signal maps to a default.
#[derive(Clone)]
pub struct DeviceSignalProbe {
    signals: Arc<dyn PlatformSignals>,
}

impl DeviceSignalProbe {
    /// Create a probe over the given platform signals.
    pub fn new(signals: Arc<dyn PlatformSignals>) -> Self {
        Self { signals }
    }

    /// The underlying platform signals.
    pub fn signals(&self) -> &Arc<dyn PlatformSignals> {
        &self.signals
    }

    /// Current connection hints, if any.
    pub fn connection(&self) -> Option<ConnectionHint> {
        self.signals.connection()
    }

    /// Derive the current device profile.
    pub fn profile(&self) -> DeviceProfile {
        let is_mobile = self
            .signals
            .user_agent()
            .is_some_and(|ua| is_mobile_user_agent(&ua));

        let is_slow_connection = match self.signals.connection() {
            Some(hint) => hint.is_slow(),
            None => {
                debug!(
                    is_mobile,
                    "Connection hints unavailable, assuming slow link only on mobile"
                );
                is_mobile
            }
        };

        DeviceProfile {
            is_mobile,
            is_slow_connection,
            pixel_ratio: normalize_pixel_ratio(self.signals.pixel_ratio()),
            device_memory_gb: self
                .signals
                .device_memory_gb()
                .filter(|gb| gb.is_finite() && *gb > 0.0),
        }
    }
}

impl std::fmt::Debug for DeviceSignalProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSignalProbe").finish_non_exhaustive()
    }
}

/// Whether a user-agent string identifies a mobile device.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    mobile_regex().is_match(user_agent)
}

fn normalize_pixel_ratio(reported: Option<f64>) -> f64 {
    match reported {
        Some(ratio) if ratio.is_finite() && ratio > 0.0 => ratio.min(MAX_PIXEL_RATIO),
        _ => DEFAULT_PIXEL_RATIO,
    }
}
