//! Centered-item selection for the thumbnail strip.

use tracing::trace;

use crate::models::{Item, ItemId};
use crate::store::GallerySnapshot;

/// One tile currently on screen, measured along the scroll axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleItem {
    /// Position in the materialized listing.
    pub index: usize,
    /// Distance from the viewport start; negative when partly scrolled off.
    pub offset: f32,
    pub size: f32,
}

/// Index of the visible item whose extent contains the viewport midpoint.
///
/// An item is centered when `|offset + size/2 - viewport_length/2| <= size/2`.
/// Items with a non-finite or non-positive size are still settling and are
/// skipped. When several items qualify the smallest index wins.
pub fn compute_selected(visible: &[VisibleItem], viewport_length: f32) -> Option<usize> {
    if !viewport_length.is_finite() {
        return None;
    }
    let viewport_center = viewport_length / 2.0;

    visible
        .iter()
        .filter(|item| item.size.is_finite() && item.size > 0.0 && item.offset.is_finite())
        .filter(|item| {
            let half = item.size / 2.0;
            (item.offset + half - viewport_center).abs() <= half
        })
        .map(|item| item.index)
        .min()
}

/// The centered tile, by position and by the photo it showed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selected {
    pub index: usize,
    pub id: ItemId,
}

/// Remembers the selection across frames.
///
/// A frame where nothing is centered (fast scroll, layout settling) keeps the
/// previous selection; only [`SelectionTracker::clear`] and a listing that no
/// longer holds the photo drop it.
#[derive(Debug, Default, Clone)]
pub struct SelectionTracker {
    selected: Option<Selected>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the selection for the current geometry over `items`.
    ///
    /// Returns the centered index whenever the photo under it differs from
    /// the one selected before, even if the position is the same.
    pub fn update(
        &mut self,
        visible: &[VisibleItem],
        viewport_length: f32,
        items: &[Item],
    ) -> Option<usize> {
        let index = compute_selected(visible, viewport_length)?;
        let id = items.get(index)?.id;
        let next = Selected { index, id };
        if self.selected == Some(next) {
            return None;
        }
        trace!(index, id, "Selection changed");
        self.selected = Some(next);
        Some(index)
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected.map(|s| s.index)
    }

    pub fn selected_id(&self) -> Option<ItemId> {
        self.selected.map(|s| s.id)
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Follows the selected photo to its position in `snapshot`, or drops
    /// the selection when the listing no longer has it.
    ///
    /// Snapshots of an initial load still in flight are skipped, so a reload
    /// does not lose the selection.
    pub fn sync_with(&mut self, snapshot: &GallerySnapshot) {
        let Some(current) = self.selected else {
            return;
        };
        if snapshot.load_states.refresh.is_loading() {
            return;
        }
        if snapshot.get(current.index).is_some_and(|item| item.id == current.id) {
            return;
        }
        match snapshot.position_of(current.id) {
            Some(index) => {
                trace!(from = current.index, to = index, id = current.id, "Selected photo moved");
                self.selected = Some(Selected { index, ..current });
            }
            None => {
                trace!(id = current.id, "Selected photo left the listing");
                self.clear();
            }
        }
    }
}
