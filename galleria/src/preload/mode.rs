//! Connection-aware preload modes.

use std::fmt;

use serde::Serialize;

use crate::device::ConnectionHint;

/// Downlink below which preloading is limited (Mbps).
const LIMITED_DOWNLINK_MBPS: f64 = 2.0;

/// Items per batch when preloading is limited.
const LIMITED_BATCH: usize = 2;

/// How much preloading the connection can afford.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PreloadMode {
    /// Preload normally.
    Full,
    /// Preload small batches only.
    Limited,
    /// Do not preload at all.
    Disabled,
}

impl PreloadMode {
    /// Derive the mode from connection hints.
    ///
    /// Without hints the connection is assumed good. Save-data and 2G-class
    /// links disable preloading; 3G or a downlink under 2 Mbps limits it.
    pub fn from_connection(hint: Option<&ConnectionHint>) -> Self {
        let Some(hint) = hint else {
            return PreloadMode::Full;
        };

        if hint.save_data || hint.is_2g_class() {
            return PreloadMode::Disabled;
        }

        let is_3g = hint.effective_type().as_deref() == Some("3g");
        let low_downlink = hint
            .downlink_mbps
            .is_some_and(|mbps| mbps.is_finite() && mbps > 0.0 && mbps < LIMITED_DOWNLINK_MBPS);
        if is_3g || low_downlink {
            return PreloadMode::Limited;
        }

        PreloadMode::Full
    }

    /// Get a short description for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            PreloadMode::Full => "full",
            PreloadMode::Limited => "limited",
            PreloadMode::Disabled => "disabled",
        }
    }

    /// Whether any preloading is allowed.
    pub fn allows_preload(&self) -> bool {
        !matches!(self, PreloadMode::Disabled)
    }

    /// Cap a batch size according to the mode.
    pub fn cap_batch(&self, batch: usize) -> usize {
        match self {
            PreloadMode::Full => batch,
            PreloadMode::Limited => batch.min(LIMITED_BATCH),
            PreloadMode::Disabled => 0,
        }
    }
}

impl fmt::Display for PreloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
