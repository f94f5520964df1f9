//! Preload command - run critical and look-ahead preloading for a manifest.

use std::path::PathBuf;
use std::sync::Arc;

use galleria::monitor::MonitorSnapshot;
use galleria::preload::PreloadReport;
use galleria::GalleryEngine;
use serde::Serialize;

use super::common::{print_json, read_manifest, DeviceArgs, FetchArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the preload command.
pub struct PreloadArgs {
    pub manifest: PathBuf,
    pub device: DeviceArgs,
    pub fetch: FetchArgs,
    pub ahead_of: Option<usize>,
}

#[derive(Debug, Serialize)]
struct PreloadSummary {
    critical: Option<PreloadReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ahead: Option<PreloadReport>,
    monitor: MonitorSnapshot,
}

/// Run the preload command.
pub fn run(args: PreloadArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("preload");

    let items = read_manifest(&args.manifest)?;
    let fetcher = Arc::new(args.fetch.fetcher()?);
    let config = runner.config().to_gallery_config();
    let runtime = runner.runtime()?;

    let summary = runtime.block_on(async {
        let engine = GalleryEngine::new(items, args.device.signals(), fetcher, config);

        let critical = match engine.start() {
            Some(handle) => handle.await.ok().flatten(),
            None => None,
        };

        let ahead = match args.ahead_of {
            Some(index) => {
                let lookahead = engine.config().preload.lookahead;
                Some(engine.scheduler().preload_ahead(index, engine.items(), lookahead).await)
            }
            None => None,
        };

        PreloadSummary {
            critical,
            ahead,
            monitor: engine.monitor().snapshot(),
        }
    });

    print_json(&summary)
}
