//! Virtualized grid windowing.
//!
//! Given a fixed-size grid and a scroll offset, [`VirtualWindowCalculator`]
//! works out which items need to exist right now. Everything outside the
//! window can be dropped by the rendering layer.
//!
//! ```text
//!            ┌──────────────┐
//!  row 0     │ 0     │ 1    │ ◄── start_row (scroll row − overscan)
//!  row 1   ┌─┼───────┼──────┼─┐
//!  row 2   │ │ 4     │ 5    │ │ viewport (scroll_top .. + container_height)
//!  row 3   └─┼───────┼──────┼─┘
//!  row 4     │ 8     │ 9    │ ◄── end_row (last visible row + overscan)
//!            └──────────────┘
//! ```
//!
//! Rows are `item_height + gap` tall. The calculator is stateless and
//! synchronous; call it on every scroll change.

mod layout;

pub use layout::GalleryLayout;

use serde::Serialize;

/// Vertical gap between rows in pixels.
pub const DEFAULT_GAP: f64 = 8.0;

/// A single item inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VirtualItem {
    /// Index into the item list.
    pub index: usize,
    /// Distance from the top of the scroll content to the item's row.
    pub offset_top: f64,
}

/// The contiguous range of items that should currently be rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualWindow {
    /// First index in the window (inclusive).
    pub start_index: usize,
    /// Last index in the window (inclusive).
    pub end_index: usize,
    /// Items in index order.
    pub items: Vec<VirtualItem>,
    /// Height of the full scroll content.
    pub total_height: f64,
}

impl VirtualWindow {
    /// A window containing nothing.
    pub fn empty(total_height: f64) -> Self {
        Self {
            start_index: 0,
            end_index: 0,
            items: Vec::new(),
            total_height,
        }
    }

    /// Whether no items are in the window.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items in the window.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether `index` falls inside the window.
    pub fn contains(&self, index: usize) -> bool {
        !self.is_empty() && (self.start_index..=self.end_index).contains(&index)
    }
}

/// Computes visible windows over a fixed-row grid.
#[derive(Debug, Clone, Copy)]
pub struct VirtualWindowCalculator {
    gap: f64,
}

impl Default for VirtualWindowCalculator {
    fn default() -> Self {
        Self { gap: DEFAULT_GAP }
    }
}

impl VirtualWindowCalculator {
    /// Create a calculator with the default row gap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a calculator with a custom row gap.
    ///
    /// Negative or non-finite gaps are treated as zero.
    pub fn with_gap(gap: f64) -> Self {
        Self {
            gap: if gap.is_finite() { gap.max(0.0) } else { 0.0 },
        }
    }

    /// Row gap in pixels.
    pub fn gap(&self) -> f64 {
        self.gap
    }

    /// Compute the window for `total` items laid out per `layout` at `scroll_top`.
    ///
    /// Degenerate inputs never panic: zero items or zero items per row give
    /// an empty window, negative scroll offsets count as zero, and offsets
    /// past the end clamp to the last row.
    pub fn compute_window(&self, total: usize, layout: &GalleryLayout, scroll_top: f64) -> VirtualWindow {
        let per_row = layout.items_per_row;
        if total == 0 || per_row == 0 {
            return VirtualWindow::empty(0.0);
        }

        let row_height = layout.item_height + self.gap;
        let total_rows = total.div_ceil(per_row);
        if !(row_height.is_finite() && row_height > 0.0) {
            return VirtualWindow::empty(0.0);
        }
        let total_height = total_rows as f64 * row_height;

        let scroll_top = if scroll_top.is_finite() { scroll_top.max(0.0) } else { 0.0 };
        let container_height = if layout.container_height.is_finite() {
            layout.container_height.max(0.0)
        } else {
            0.0
        };
        let overscan = layout.overscan;
        let last_row = total_rows - 1;

        let first_visible_row = (scroll_top / row_height).floor() as usize;
        let last_visible_row = ((scroll_top + container_height) / row_height).ceil() as usize;

        let end_row = last_visible_row.saturating_add(overscan).min(last_row);
        let start_row = first_visible_row.saturating_sub(overscan).min(end_row);

        let start_index = start_row * per_row;
        let end_index = (total - 1).min((end_row + 1) * per_row - 1);

        let items = (start_index..=end_index)
            .map(|index| VirtualItem {
                index,
                offset_top: (index / per_row) as f64 * row_height,
            })
            .collect();

        VirtualWindow {
            start_index,
            end_index,
            items,
            total_height,
        }
    }
}
