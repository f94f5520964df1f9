//! Window command - compute the virtual window for a scroll position.

use std::path::PathBuf;

use galleria::device::DeviceSignalProbe;
use galleria::window::{GalleryLayout, VirtualWindow, VirtualWindowCalculator};
use serde::Serialize;

use super::common::{print_json, read_manifest, DeviceArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the window command.
pub struct WindowArgs {
    pub device: DeviceArgs,
    pub items: Option<usize>,
    pub manifest: Option<PathBuf>,
    pub scroll_top: f64,
    pub viewport_height: f64,
}

#[derive(Debug, Serialize)]
struct WindowReport {
    total_items: usize,
    layout: GalleryLayout,
    window: VirtualWindow,
}

/// Run the window command.
pub fn run(args: WindowArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("window");
    let gallery = runner.config().to_gallery_config();

    let total_items = match (&args.manifest, args.items) {
        (Some(path), _) => read_manifest(path)?.len(),
        (None, Some(count)) => count,
        (None, None) => {
            return Err(CliError::Config(
                "Either --items or --manifest is required".to_string(),
            ))
        }
    };

    let profile = DeviceSignalProbe::new(args.device.signals()).profile();
    let mut layout = GalleryLayout::for_viewport(&profile, args.viewport_height);
    if let Some(overscan) = gallery.overscan {
        layout = layout.with_overscan(overscan);
    }

    let window = VirtualWindowCalculator::with_gap(gallery.gap).compute_window(total_items, &layout, args.scroll_top);

    print_json(&WindowReport {
        total_items,
        layout,
        window,
    })
}
