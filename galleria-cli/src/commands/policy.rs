//! Policy command - show the effective delivery policy for a device.

use galleria::device::{DeviceProfile, DeviceSignalProbe};
use galleria::policy::{EffectivePolicy, QualityRequest, QualitySelector, RequestUrlBuilder};
use galleria::preload::PreloadMode;
use serde::Serialize;

use super::common::{print_json, DeviceArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the policy command.
pub struct PolicyArgs {
    pub device: DeviceArgs,
    pub quality: Option<u8>,
    pub width: Option<u32>,
    pub reduce_quality: bool,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
struct PolicyReport {
    profile: DeviceProfile,
    policy: EffectivePolicy,
    preload_mode: PreloadMode,
    thumbnail_width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_url: Option<String>,
}

/// Run the policy command.
pub fn run(args: PolicyArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("policy");
    let gallery = runner.config().to_gallery_config();

    let request = QualityRequest::width(args.width.unwrap_or(gallery.quality.width))
        .with_quality(args.quality.unwrap_or(gallery.quality.quality))
        .with_reduce_quality(args.reduce_quality);

    let signals = args.device.signals();
    let probe = DeviceSignalProbe::new(signals.clone());
    let profile = probe.profile();
    let selector = QualitySelector::new();
    let policy = selector.select(&profile, request);

    let request_url = args.source.as_deref().map(|source| {
        RequestUrlBuilder::new(gallery.delivery.clone()).build(signals.host().as_deref(), source, &policy)
    });

    print_json(&PolicyReport {
        profile,
        policy,
        preload_mode: PreloadMode::from_connection(probe.connection().as_ref()),
        thumbnail_width: selector.thumbnail_width(&profile),
        request_url,
    })
}
