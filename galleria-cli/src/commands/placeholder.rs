//! Placeholder command - generate a blur placeholder data URL.

use std::sync::Arc;

use galleria::placeholder::{BlurPlaceholderCache, PlaceholderKey, PlaceholderOrigin};
use tracing::info;

use super::common::FetchArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the placeholder command.
pub struct PlaceholderArgs {
    pub source: String,
    pub fetch: FetchArgs,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
}

/// Run the placeholder command.
///
/// Prints the data URL on stdout. Generation never fails; when the source
/// cannot be fetched or decoded the gradient fallback is printed and a
/// warning is logged.
pub fn run(args: PlaceholderArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("placeholder");

    let config = runner.config().to_gallery_config().placeholder;
    let key = PlaceholderKey::new(
        args.source.as_str(),
        args.width.unwrap_or(config.width),
        args.height.unwrap_or(config.height),
        args.quality.unwrap_or(config.quality),
    );

    let cache = BlurPlaceholderCache::new(Arc::new(args.fetch.fetcher()?), config);
    let runtime = runner.runtime()?;
    let entry = runtime.block_on(cache.generate_entry(key));

    info!(
        key = %entry.key,
        fallback = entry.origin == PlaceholderOrigin::Fallback,
        bytes = entry.data_url.len(),
        "Placeholder ready"
    );
    println!("{}", entry.data_url);
    Ok(())
}
