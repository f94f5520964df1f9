//! Request URL derivation.
//!
//! On hosts with an image optimization endpoint, requests go through that
//! endpoint with width and quality parameters. Everywhere else the original
//! source URL is used unmodified.

use reqwest::Url;
use tracing::warn;

use super::EffectivePolicy;

/// Default image optimization endpoint path.
pub const DEFAULT_IMAGE_ENDPOINT: &str = "/_next/image";

/// Placeholder origin used to resolve relative endpoints.
const RELATIVE_BASE: &str = "http://localhost";

/// Where and when to route requests through an optimization endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Endpoint path (or absolute URL) of the optimizer.
    pub endpoint: String,
    /// Host fragments whose pages have the optimizer deployed.
    pub optimized_hosts: Vec<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_IMAGE_ENDPOINT.to_string(),
            optimized_hosts: vec!["vercel.app".to_string(), "netlify.app".to_string()],
        }
    }
}

impl DeliveryConfig {
    /// Set the optimizer endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Replace the list of optimized hosts.
    pub fn with_optimized_hosts(mut self, hosts: Vec<String>) -> Self {
        self.optimized_hosts = hosts;
        self
    }
}

/// Builds the URL actually requested for an image.
#[derive(Debug, Clone, Default)]
pub struct RequestUrlBuilder {
    config: DeliveryConfig,
}

impl RequestUrlBuilder {
    /// Create a builder with the given delivery configuration.
    pub fn new(config: DeliveryConfig) -> Self {
        Self { config }
    }

    /// The delivery configuration.
    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Whether pages served from `host` can use the optimizer.
    pub fn is_optimized_host(&self, host: Option<&str>) -> bool {
        let Some(host) = host else {
            return false;
        };
        self.config
            .optimized_hosts
            .iter()
            .any(|fragment| !fragment.is_empty() && host.contains(fragment.as_str()))
    }

    /// Derive the request URL for `source` under `policy`.
    pub fn build(&self, host: Option<&str>, source: &str, policy: &EffectivePolicy) -> String {
        self.build_with(host, source, policy.max_width, policy.quality)
    }

    /// Derive the request URL for an explicit width and quality.
    pub fn build_with(&self, host: Option<&str>, source: &str, width: u32, quality: u8) -> String {
        if !self.is_optimized_host(host) {
            return source.to_string();
        }

        match self.optimizer_url(source, width, quality) {
            Some(url) => url,
            None => {
                warn!(
                    endpoint = %self.config.endpoint,
                    source,
                    "Invalid optimizer endpoint, requesting original source"
                );
                source.to_string()
            }
        }
    }

    fn optimizer_url(&self, source: &str, width: u32, quality: u8) -> Option<String> {
        let width = width.to_string();
        let quality = quality.to_string();
        let params = [("url", source), ("w", width.as_str()), ("q", quality.as_str())];

        // Absolute endpoints keep their origin; relative ones are resolved
        // against a throwaway base and emitted as path plus query.
        if let Ok(absolute) = Url::parse(&self.config.endpoint) {
            let url = Url::parse_with_params(absolute.as_str(), &params).ok()?;
            return Some(url.to_string());
        }

        let base = Url::parse(RELATIVE_BASE).ok()?.join(&self.config.endpoint).ok()?;
        let url = Url::parse_with_params(base.as_str(), &params).ok()?;
        Some(format!("{}?{}", url.path(), url.query().unwrap_or_default()))
    }
}
