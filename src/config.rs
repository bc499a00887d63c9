use crate::layout::StripLayout;
use crate::models::PAGE_SIZE;

/// Default number of page loader threads.
pub const DEFAULT_LOADERS: usize = 2;

/// Maximum number of page loader threads.
pub const MAX_LOADERS: usize = 4;

/// Settings for a gallery session and its store.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// Threads running page queries (clamped to `1..=MAX_LOADERS`).
    pub loader_threads: usize,
    /// How close to either end of the listing an accessed item must be to
    /// trigger loading the neighbouring page.
    pub prefetch_distance: usize,
    /// Geometry of the thumbnail strip.
    pub layout: StripLayout,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            loader_threads: DEFAULT_LOADERS,
            prefetch_distance: PAGE_SIZE,
            layout: StripLayout::default(),
        }
    }
}

impl GalleryConfig {
    pub fn with_loader_threads(mut self, count: usize) -> Self {
        self.loader_threads = count;
        self
    }

    pub fn with_prefetch_distance(mut self, distance: usize) -> Self {
        self.prefetch_distance = distance;
        self
    }

    pub fn with_layout(mut self, layout: StripLayout) -> Self {
        self.layout = layout;
        self
    }
}
