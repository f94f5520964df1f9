//! Blur placeholder generation and caching.
//!
//! A placeholder is a tiny, heavily compressed JPEG preview of a source
//! image, delivered as a `data:` URL so the rendering layer can paint it
//! before the full image arrives.
//!
//! Generation never fails from the caller's point of view: when the source
//! cannot be fetched or decoded, a deterministic three-stop diagonal gradient
//! is encoded instead and cached under the same key.

mod cache;
mod raster;

pub use cache::{
    BlurPlaceholderCache, PlaceholderConfig, PlaceholderEntry, PlaceholderKey, PlaceholderOrigin,
    PlaceholderStats,
};
pub use raster::{encode_data_url, fallback_data_url, gradient, DATA_URL_PREFIX, GRADIENT_STOPS};

use thiserror::Error;

use crate::loader::LoadError;

/// Why a placeholder could not be generated from its source.
#[derive(Debug, Error)]
pub enum PlaceholderError {
    /// Target dimensions have no area.
    #[error("Invalid placeholder dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The source image could not be fetched.
    #[error("Failed to fetch source: {0}")]
    Fetch(#[from] LoadError),

    /// The source bytes are not a decodable image.
    #[error("Failed to decode source: {0}")]
    Decode(#[source] image::ImageError),

    /// JPEG encoding failed.
    #[error("Failed to encode placeholder: {0}")]
    Encode(#[source] image::ImageError),

    /// The blocking worker died.
    #[error("Placeholder worker failed: {0}")]
    Worker(String),
}
