//! Pixel work for placeholders: down-sampling, gradients and JPEG encoding.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};

use super::PlaceholderError;

/// Prefix of every placeholder data URL.
pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Fallback gradient colors at offsets 0, 0.5 and 1 along the diagonal.
pub const GRADIENT_STOPS: [[u8; 3]; 3] = [[0xf6, 0xf7, 0xfb], [0xe9, 0xec, 0xef], [0xde, 0xe2, 0xe6]];

/// Quality used for the fallback gradient.
const FALLBACK_QUALITY: u8 = 10;

/// 1x1 light gray GIF, returned only if even the gradient cannot be encoded.
const LAST_RESORT_DATA_URL: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAO7u7gAAACH5BAAAAAAALAAAAAABAAEAAAICRAEAOw==";

fn check_dimensions(width: u32, height: u32) -> Result<(), PlaceholderError> {
    if width == 0 || height == 0 {
        return Err(PlaceholderError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Decode `bytes` and shrink the image to exactly `width` x `height`.
pub(crate) fn downsample(bytes: &[u8], width: u32, height: u32) -> Result<RgbImage, PlaceholderError> {
    check_dimensions(width, height)?;
    let decoded = image::load_from_memory(bytes).map_err(PlaceholderError::Decode)?;
    Ok(decoded.resize_exact(width, height, FilterType::Triangle).to_rgb8())
}

/// Diagonal gradient from the top-left to the bottom-right corner.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    let (w, h) = (width as f64, height as f64);
    let length_sq = (w * w + h * h).max(f64::EPSILON);

    RgbImage::from_fn(width, height, |x, y| {
        // Project the pixel center onto the (0,0)→(w,h) axis
        let t = (((x as f64 + 0.5) * w + (y as f64 + 0.5) * h) / length_sq).clamp(0.0, 1.0);
        let (from, to, local) = if t <= 0.5 {
            (GRADIENT_STOPS[0], GRADIENT_STOPS[1], t * 2.0)
        } else {
            (GRADIENT_STOPS[1], GRADIENT_STOPS[2], (t - 0.5) * 2.0)
        };

        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * local).round() as u8;
        Rgb([mix(from[0], to[0]), mix(from[1], to[1]), mix(from[2], to[2])])
    })
}

/// Encode an image as a base64 JPEG data URL.
pub fn encode_data_url(image: &RgbImage, quality: u8) -> Result<String, PlaceholderError> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(PlaceholderError::Encode)?;

    Ok(format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(&jpeg)))
}

/// Deterministic gradient placeholder for the given dimensions.
///
/// Never fails; degenerate dimensions get a constant 1x1 image.
pub fn fallback_data_url(width: u32, height: u32) -> String {
    if check_dimensions(width, height).is_err() {
        return LAST_RESORT_DATA_URL.to_string();
    }

    match encode_data_url(&gradient(width, height), FALLBACK_QUALITY) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(width, height, error = %e, "Failed to encode gradient placeholder");
            LAST_RESORT_DATA_URL.to_string()
        }
    }
}
