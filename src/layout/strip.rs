use crate::models::Item;
use crate::selection::VisibleItem;

/// Configuration for the single-row thumbnail strip.
///
/// Tiles are placed left-to-right along the scroll axis. By default every
/// tile has the same extent; with `aspect_derived` the extent follows the
/// source aspect ratio at the fixed strip thickness.
#[derive(Debug, Clone, PartialEq)]
pub struct StripLayout {
    /// Tile length along the scroll axis in pixels (default: 56)
    pub tile_extent: f32,
    /// Strip thickness across the scroll axis in pixels (default: 72)
    pub tile_thickness: f32,
    /// Gap between tiles in pixels (default: 0)
    pub gap: f32,
    /// Derive each tile's extent from the item aspect ratio (default: false)
    pub aspect_derived: bool,
    /// Bounds for aspect-derived extents in pixels (default: 24..=240)
    pub min_extent: f32,
    pub max_extent: f32,
}

impl Default for StripLayout {
    fn default() -> Self {
        Self {
            tile_extent: 56.0,
            tile_thickness: 72.0,
            gap: 0.0,
            aspect_derived: false,
            min_extent: 24.0,
            max_extent: 240.0,
        }
    }
}

/// Placement of one tile along the scroll axis, in content coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileSpan {
    pub offset: f32,
    pub extent: f32,
}

impl TileSpan {
    pub fn end(&self) -> f32 {
        self.offset + self.extent
    }
}

impl StripLayout {
    fn tile_extent_for(&self, item: &Item) -> f32 {
        if !self.aspect_derived {
            return self.tile_extent.max(1.0);
        }
        let ar = item.aspect_ratio().max(0.01);
        (self.tile_thickness * ar)
            .clamp(self.min_extent, self.max_extent.max(self.min_extent))
            .max(1.0)
    }

    /// Lays out `items` in listing order.
    pub fn compute(&self, items: &[Item]) -> Vec<TileSpan> {
        let mut spans = Vec::with_capacity(items.len());
        let mut offset = 0.0f32;
        for item in items {
            if !spans.is_empty() {
                offset += self.gap;
            }
            let extent = self.tile_extent_for(item);
            spans.push(TileSpan { offset, extent });
            offset += extent;
        }
        spans
    }

    /// Length of the laid-out content along the scroll axis.
    pub fn total_extent(spans: &[TileSpan]) -> f32 {
        spans.last().map(TileSpan::end).unwrap_or(0.0)
    }

    /// Tiles intersecting the viewport, with offsets relative to its start.
    pub fn visible_items(
        spans: &[TileSpan],
        scroll_offset: f32,
        viewport_length: f32,
    ) -> Vec<VisibleItem> {
        if viewport_length <= 0.0 || !viewport_length.is_finite() || !scroll_offset.is_finite() {
            return Vec::new();
        }
        let viewport_end = scroll_offset + viewport_length;

        // Spans are sorted by offset, so skip straight to the first one ending past the start.
        let first = spans.partition_point(|span| span.end() <= scroll_offset);
        spans[first..]
            .iter()
            .enumerate()
            .take_while(|(_, span)| span.offset < viewport_end)
            .map(|(i, span)| VisibleItem {
                index: first + i,
                offset: span.offset - scroll_offset,
                size: span.extent,
            })
            .collect()
    }

    /// Scroll offset that puts tile `index` in the middle of the viewport,
    /// limited to the scrollable range.
    pub fn centering_offset(spans: &[TileSpan], index: usize, viewport_length: f32) -> Option<f32> {
        let span = spans.get(index)?;
        let max_scroll = (Self::total_extent(spans) - viewport_length).max(0.0);
        let target = span.offset + span.extent / 2.0 - viewport_length / 2.0;
        Some(target.clamp(0.0, max_scroll))
    }
}
