//! Platform signal capability and its implementations.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Downlink below which a connection counts as slow (Mbps).
pub const SLOW_DOWNLINK_MBPS: f64 = 1.5;

/// Network quality hints as reported by the platform.
///
/// Every field is optional on real platforms; an absent hint object is
/// modelled as `None` at the [`PlatformSignals`] level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionHint {
    /// Effective connection type (`slow-2g`, `2g`, `3g`, `4g`).
    pub effective_type: Option<String>,
    /// Estimated downlink bandwidth in Mbps.
    pub downlink_mbps: Option<f64>,
    /// Whether the user asked for reduced data usage.
    #[serde(default)]
    pub save_data: bool,
}

impl ConnectionHint {
    /// Create a hint carrying only an effective connection type.
    pub fn effective(effective_type: impl Into<String>) -> Self {
        Self {
            effective_type: Some(effective_type.into()),
            ..Default::default()
        }
    }

    /// Set the downlink estimate.
    pub fn with_downlink(mut self, mbps: f64) -> Self {
        self.downlink_mbps = Some(mbps);
        self
    }

    /// Set the save-data preference.
    pub fn with_save_data(mut self, save_data: bool) -> Self {
        self.save_data = save_data;
        self
    }

    /// Effective type in lowercase, if reported.
    pub fn effective_type(&self) -> Option<String> {
        self.effective_type.as_ref().map(|t| t.to_ascii_lowercase())
    }

    /// Whether this connection is 2G-class.
    pub fn is_2g_class(&self) -> bool {
        matches!(self.effective_type().as_deref(), Some("2g") | Some("slow-2g"))
    }

    /// Whether the hints describe a slow connection.
    ///
    /// Slow means a 2G-class effective type or a downlink below
    /// [`SLOW_DOWNLINK_MBPS`].
    pub fn is_slow(&self) -> bool {
        self.is_2g_class()
            || self
                .downlink_mbps
                .is_some_and(|mbps| mbps.is_finite() && mbps < SLOW_DOWNLINK_MBPS)
    }
}

/// Read-only access to ambient device and network signals.
///
/// Implementations must never fail: an unavailable signal is reported as
/// `None` and the probe applies a default.
pub trait PlatformSignals: Send + Sync {
    /// The user-agent string, if known.
    fn user_agent(&self) -> Option<String>;

    /// Connection quality hints, if the platform exposes them.
    fn connection(&self) -> Option<ConnectionHint>;

    /// Approximate device memory in gigabytes, if exposed.
    fn device_memory_gb(&self) -> Option<f64>;

    /// Device pixel ratio, if exposed.
    fn pixel_ratio(&self) -> Option<f64>;

    /// Host name the page is served from, if any.
    fn host(&self) -> Option<String>;

    /// Whether the platform can notify when an element becomes visible.
    fn supports_visibility(&self) -> bool;
}

/// Signals reported by a real rendering environment.
///
/// The embedding layer fills these in from its platform queries. Connection
/// hints can change during a session and are updated in place.
#[derive(Debug, Default)]
pub struct BrowserSignals {
    user_agent: Option<String>,
    connection: RwLock<Option<ConnectionHint>>,
    device_memory_gb: Option<f64>,
    pixel_ratio: Option<f64>,
    host: Option<String>,
    supports_visibility: bool,
}

impl BrowserSignals {
    /// Create browser signals with the given user agent.
    ///
    /// Visibility observation is assumed supported; every other hint starts
    /// out unavailable.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
            supports_visibility: true,
            ..Default::default()
        }
    }

    /// Set the connection hints.
    pub fn with_connection(self, hint: ConnectionHint) -> Self {
        *self.connection.write() = Some(hint);
        self
    }

    /// Set the device memory hint.
    pub fn with_device_memory(mut self, gigabytes: f64) -> Self {
        self.device_memory_gb = Some(gigabytes);
        self
    }

    /// Set the pixel density hint.
    pub fn with_pixel_ratio(mut self, ratio: f64) -> Self {
        self.pixel_ratio = Some(ratio);
        self
    }

    /// Set the page host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Declare whether visibility observation is available.
    pub fn with_visibility_support(mut self, supported: bool) -> Self {
        self.supports_visibility = supported;
        self
    }

    /// Replace the connection hints after a network change.
    pub fn update_connection(&self, hint: Option<ConnectionHint>) {
        *self.connection.write() = hint;
    }
}

impl PlatformSignals for BrowserSignals {
    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }

    fn connection(&self) -> Option<ConnectionHint> {
        self.connection.read().clone()
    }

    fn device_memory_gb(&self) -> Option<f64> {
        self.device_memory_gb
    }

    fn pixel_ratio(&self) -> Option<f64> {
        self.pixel_ratio
    }

    fn host(&self) -> Option<String> {
        self.host.clone()
    }

    fn supports_visibility(&self) -> bool {
        self.supports_visibility
    }
}

/// No platform at all: every signal is unavailable.
///
/// Useful for unit tests where you want the probe's defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSignals;

impl PlatformSignals for NoopSignals {
    fn user_agent(&self) -> Option<String> {
        None
    }

    fn connection(&self) -> Option<ConnectionHint> {
        None
    }

    fn device_memory_gb(&self) -> Option<f64> {
        None
    }

    fn pixel_ratio(&self) -> Option<f64> {
        None
    }

    fn host(&self) -> Option<String> {
        None
    }

    fn supports_visibility(&self) -> bool {
        false
    }
}

/// Server-side stub.
///
/// A server only knows what the incoming request told it, typically the
/// user agent and its own host name. There is no viewport to observe.
#[derive(Debug, Default, Clone)]
pub struct ServerSignals {
    user_agent: Option<String>,
    host: Option<String>,
}

impl ServerSignals {
    /// Create server signals from an optional request user agent.
    pub fn new(user_agent: Option<String>) -> Self {
        Self {
            user_agent,
            host: None,
        }
    }

    /// Set the host name the page is being rendered for.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

impl PlatformSignals for ServerSignals {
    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }

    fn connection(&self) -> Option<ConnectionHint> {
        None
    }

    fn device_memory_gb(&self) -> Option<f64> {
        None
    }

    fn pixel_ratio(&self) -> Option<f64> {
        None
    }

    fn host(&self) -> Option<String> {
        self.host.clone()
    }

    fn supports_visibility(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_connection_hint_2g_is_slow() {
        assert!(ConnectionHint::effective("2g").is_slow());
        assert!(ConnectionHint::effective("slow-2g").is_slow());
        assert!(ConnectionHint::effective("SLOW-2G").is_slow());
    }

    #[test]
    fn test_connection_hint_low_downlink_is_slow() {
        let hint = ConnectionHint::effective("4g").with_downlink(1.2);
        assert!(hint.is_slow());

        let hint = ConnectionHint::effective("4g").with_downlink(10.0);
        assert!(!hint.is_slow());
    }

    #[test]
    fn test_empty_connection_hint_is_not_slow() {
        assert!(!ConnectionHint::default().is_slow());
    }

    #[test]
    fn test_browser_signals_update_connection() {
        let signals = BrowserSignals::new("Mozilla/5.0").with_connection(ConnectionHint::effective("4g"));
        assert_eq!(signals.connection().unwrap().effective_type(), Some("4g".to_string()));

        signals.update_connection(Some(ConnectionHint::effective("2g")));
        assert!(signals.connection().unwrap().is_slow());

        signals.update_connection(None);
        assert!(signals.connection().is_none());
    }

    #[test]
    fn test_noop_signals_report_nothing() {
        let signals: Arc<dyn PlatformSignals> = Arc::new(NoopSignals);
        assert!(signals.user_agent().is_none());
        assert!(signals.connection().is_none());
        assert!(signals.device_memory_gb().is_none());
        assert!(signals.pixel_ratio().is_none());
        assert!(!signals.supports_visibility());
    }

    #[test]
    fn test_server_signals_carry_request_user_agent() {
        let signals = ServerSignals::new(Some("iPhone".to_string())).with_host("example.vercel.app");
        assert_eq!(signals.user_agent().as_deref(), Some("iPhone"));
        assert_eq!(signals.host().as_deref(), Some("example.vercel.app"));
        assert!(!signals.supports_visibility());
    }
}
