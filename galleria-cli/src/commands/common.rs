//! Common argument groups shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use galleria::device::{BrowserSignals, ConnectionHint, NoopSignals, PlatformSignals};
use galleria::item::{load_manifest, ImageItem};
use galleria::loader::HttpImageFetcher;

use crate::error::CliError;

/// Device and network hints, as a browser would report them.
#[derive(Debug, Clone, Default, Args)]
pub struct DeviceArgs {
    /// User agent string (omit to simulate a client that reports nothing)
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Effective connection type (slow-2g, 2g, 3g, 4g)
    #[arg(long)]
    pub effective_type: Option<String>,

    /// Downlink estimate in Mbit/s
    #[arg(long)]
    pub downlink: Option<f64>,

    /// Data saver is enabled
    #[arg(long)]
    pub save_data: bool,

    /// Device memory in GB
    #[arg(long)]
    pub memory: Option<f64>,

    /// Device pixel ratio
    #[arg(long)]
    pub pixel_ratio: Option<f64>,

    /// Page host, used to decide whether the image optimizer is available
    #[arg(long)]
    pub host: Option<String>,
}

impl DeviceArgs {
    fn connection(&self) -> Option<ConnectionHint> {
        if self.effective_type.is_none() && self.downlink.is_none() && !self.save_data {
            return None;
        }
        Some(ConnectionHint {
            effective_type: self.effective_type.clone(),
            downlink_mbps: self.downlink,
            save_data: self.save_data,
        })
    }

    /// Platform signals described by these arguments.
    pub fn signals(&self) -> Arc<dyn PlatformSignals> {
        let Some(user_agent) = &self.user_agent else {
            if self.host.is_none() && self.connection().is_none() {
                return Arc::new(NoopSignals);
            }
            return Arc::new(self.apply(BrowserSignals::default()));
        };
        Arc::new(self.apply(BrowserSignals::new(user_agent.as_str())))
    }

    fn apply(&self, mut signals: BrowserSignals) -> BrowserSignals {
        if let Some(hint) = self.connection() {
            signals = signals.with_connection(hint);
        }
        if let Some(memory) = self.memory {
            signals = signals.with_device_memory(memory);
        }
        if let Some(ratio) = self.pixel_ratio {
            signals = signals.with_pixel_ratio(ratio);
        }
        if let Some(host) = &self.host {
            signals = signals.with_host(host.as_str());
        }
        signals
    }
}

/// Where image sources are fetched from.
#[derive(Debug, Clone, Default, Args)]
pub struct FetchArgs {
    /// Base URL for relative image sources (e.g. https://example.com/)
    #[arg(long)]
    pub base_url: Option<String>,
}

impl FetchArgs {
    /// HTTP fetcher honouring the base URL.
    pub fn fetcher(&self) -> Result<HttpImageFetcher, CliError> {
        let fetcher = match &self.base_url {
            Some(base) => HttpImageFetcher::with_base_url(base)?,
            None => HttpImageFetcher::new()?,
        };
        Ok(fetcher)
    }
}

/// Read a JSON manifest of image items.
pub fn read_manifest(path: &Path) -> Result<Vec<ImageItem>, CliError> {
    Ok(load_manifest(path)?)
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
