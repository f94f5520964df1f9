//! Grid geometry derived from the device and viewport.

use serde::Serialize;

use crate::device::DeviceProfile;

/// Items per row in the gallery grid.
pub const ITEMS_PER_ROW: usize = 2;

const MOBILE_ITEM_HEIGHT: f64 = 160.0;
const DESKTOP_ITEM_HEIGHT: f64 = 200.0;
const MOBILE_MAX_CONTAINER: f64 = 400.0;
const DESKTOP_MAX_CONTAINER: f64 = 600.0;
const MOBILE_OVERSCAN: usize = 1;
const DESKTOP_OVERSCAN: usize = 2;

/// Share of the viewport height the scroll container may occupy.
const CONTAINER_VIEWPORT_SHARE: f64 = 0.7;

/// Geometry of a fixed-row gallery grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GalleryLayout {
    /// Height of one item in pixels, excluding the row gap.
    pub item_height: f64,
    /// Number of items per row.
    pub items_per_row: usize,
    /// Height of the visible scroll container.
    pub container_height: f64,
    /// Extra rows kept above and below the visible range.
    pub overscan: usize,
}

impl GalleryLayout {
    /// Create a layout from explicit geometry.
    pub fn new(item_height: f64, items_per_row: usize, container_height: f64, overscan: usize) -> Self {
        Self {
            item_height,
            items_per_row,
            container_height,
            overscan,
        }
    }

    /// Layout for the given device and viewport height.
    ///
    /// Mobile devices get shorter items, a shorter container and less
    /// overscan to keep fewer decoded images alive.
    pub fn for_viewport(profile: &DeviceProfile, viewport_height: f64) -> Self {
        let viewport_height = if viewport_height.is_finite() {
            viewport_height.max(0.0)
        } else {
            0.0
        };

        let (item_height, max_container, overscan) = if profile.is_mobile {
            (MOBILE_ITEM_HEIGHT, MOBILE_MAX_CONTAINER, MOBILE_OVERSCAN)
        } else {
            (DESKTOP_ITEM_HEIGHT, DESKTOP_MAX_CONTAINER, DESKTOP_OVERSCAN)
        };

        Self {
            item_height,
            items_per_row: ITEMS_PER_ROW,
            container_height: (viewport_height * CONTAINER_VIEWPORT_SHARE).min(max_container),
            overscan,
        }
    }

    /// Replace the overscan row count.
    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_layout() {
        let layout = GalleryLayout::for_viewport(&DeviceProfile::desktop(), 1000.0);
        assert_eq!(layout.item_height, 200.0);
        assert_eq!(layout.items_per_row, 2);
        assert_eq!(layout.container_height, 600.0);
        assert_eq!(layout.overscan, 2);
    }

    #[test]
    fn test_mobile_layout() {
        let layout = GalleryLayout::for_viewport(&DeviceProfile::mobile(), 500.0);
        assert_eq!(layout.item_height, 160.0);
        assert!((layout.container_height - 350.0).abs() < 1e-9);
        assert_eq!(layout.overscan, 1);

        let tall = GalleryLayout::for_viewport(&DeviceProfile::mobile(), 2000.0);
        assert_eq!(tall.container_height, 400.0);
    }

    #[test]
    fn test_invalid_viewport_height() {
        let layout = GalleryLayout::for_viewport(&DeviceProfile::desktop(), f64::NAN);
        assert_eq!(layout.container_height, 0.0);
    }

    #[test]
    fn test_overscan_override() {
        let layout = GalleryLayout::for_viewport(&DeviceProfile::desktop(), 800.0).with_overscan(4);
        assert_eq!(layout.overscan, 4);
    }
}
