//! Wires the store, the change notifier and the strip selection together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flume::Receiver;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::GalleryConfig;
use crate::layout::{StripLayout, TileSpan};
use crate::models::{Item, ItemId};
use crate::selection::SelectionTracker;
use crate::source::MediaSource;
use crate::store::{GallerySnapshot, GalleryStore};
use crate::watcher::{ChangeNotifier, IndexObserver, Subscription};

/// One viewer of the gallery: a store, a read-permission gate, and the
/// selection of the strip it drives.
///
/// While read permission is not granted the paginator is never invoked.
/// Index changes reload the store only while permission is granted.
pub struct GallerySession {
    store: GalleryStore,
    read_granted: Arc<AtomicBool>,
    layout: StripLayout,
    selection: Mutex<SelectionTracker>,
    spans: Mutex<Option<CachedSpans>>,
    _subscription: Subscription,
}

/// Strip layout of one listing, reused across scroll frames.
///
/// Within a generation the listing only changes by gaining pages, so the
/// length and the first id identify its contents.
struct CachedSpans {
    generation: u64,
    len: usize,
    first_id: Option<ItemId>,
    spans: Arc<[TileSpan]>,
}

impl CachedSpans {
    fn matches(&self, snapshot: &GallerySnapshot) -> bool {
        self.generation == snapshot.generation
            && self.len == snapshot.len()
            && self.first_id == snapshot.items.first().map(|item| item.id)
    }
}

impl GallerySession {
    pub fn new(source: Arc<dyn MediaSource>, notifier: &ChangeNotifier, config: GalleryConfig) -> Self {
        let store = GalleryStore::with_config(source, &config);
        let read_granted = Arc::new(AtomicBool::new(false));

        // The observer must not keep the store alive, or store and notifier
        // would own each other through the source.
        let weak_store = store.downgrade();
        let granted = Arc::clone(&read_granted);
        let observer: Arc<dyn IndexObserver> = Arc::new(move || {
            if !granted.load(Ordering::SeqCst) {
                debug!("Index changed without read permission, ignoring");
                return;
            }
            if let Some(store) = weak_store.upgrade() {
                store.reload();
            }
        });
        let subscription = notifier.register(observer);

        Self {
            store,
            read_granted,
            layout: config.layout,
            selection: Mutex::new(SelectionTracker::new()),
            spans: Mutex::new(None),
            _subscription: subscription,
        }
    }

    /// Records the read permission outcome.
    ///
    /// Granting loads the first page; revoking drops the selection.
    pub fn set_read_permission(&self, granted: bool) {
        let was = self.read_granted.swap(granted, Ordering::SeqCst);
        info!(granted, "Read permission updated");
        if granted && !was {
            self.store.reload();
        } else if !granted {
            self.selection.lock().clear();
        }
    }

    pub fn is_read_granted(&self) -> bool {
        self.read_granted.load(Ordering::SeqCst)
    }

    fn gate(&self, action: &str) -> bool {
        let granted = self.is_read_granted();
        if !granted {
            debug!(action, "Read permission not granted, dropping request");
        }
        granted
    }

    pub fn reload(&self) {
        if self.gate("reload") {
            self.store.reload();
        }
    }

    /// Reloads around the currently selected item.
    pub fn refresh(&self) {
        if self.gate("refresh") {
            self.store.refresh(self.selection.lock().selected());
        }
    }

    pub fn append_next(&self) {
        if self.gate("append") {
            self.store.append_next();
        }
    }

    pub fn prepend_previous(&self) {
        if self.gate("prepend") {
            self.store.prepend_previous();
        }
    }

    pub fn retry(&self) {
        if self.gate("retry") {
            self.store.retry();
        }
    }

    /// Recomputes the strip for a scroll frame.
    ///
    /// Returns the newly centered item when the selection changed. Also
    /// prefetches neighbouring pages for the edges of the visible window.
    pub fn on_viewport_changed(&self, scroll_offset: f32, viewport_length: f32) -> Option<Item> {
        let snapshot = self.store.snapshot();
        let spans = self.spans_for(&snapshot);
        let visible = StripLayout::visible_items(&spans, scroll_offset, viewport_length);

        let changed = {
            let mut selection = self.selection.lock();
            selection.sync_with(&snapshot);
            selection.update(&visible, viewport_length, &snapshot.items)
        };

        if self.is_read_granted() {
            if let (Some(first), Some(last)) = (visible.first(), visible.last()) {
                self.store.on_item_accessed(last.index);
                if first.index != last.index {
                    self.store.on_item_accessed(first.index);
                }
            }
        }

        let item = changed.and_then(|index| snapshot.get(index).cloned());
        if let Some(item) = &item {
            debug!(id = item.id, name = %item.name, "Centered item changed");
        }
        item
    }

    /// Scroll offset that centers tile `index`, or `None` if it is not loaded.
    pub fn tap(&self, index: usize, viewport_length: f32) -> Option<f32> {
        let snapshot = self.store.snapshot();
        let spans = self.spans_for(&snapshot);
        StripLayout::centering_offset(&spans, index, viewport_length)
    }

    /// Item currently shown in the large preview.
    pub fn selected_item(&self) -> Option<Item> {
        let (index, id) = {
            let selection = self.selection.lock();
            (selection.selected()?, selection.selected_id()?)
        };
        let snapshot = self.store.snapshot();
        snapshot
            .get(index)
            .filter(|item| item.id == id)
            .or_else(|| snapshot.position_of(id).and_then(|i| snapshot.get(i)))
            .cloned()
    }

    /// Tile spans for `snapshot`, laid out again only when its listing changed.
    fn spans_for(&self, snapshot: &GallerySnapshot) -> Arc<[TileSpan]> {
        let mut cache = self.spans.lock();
        if let Some(cached) = cache.as_ref().filter(|c| c.matches(snapshot)) {
            return Arc::clone(&cached.spans);
        }

        let spans: Arc<[TileSpan]> = self.layout.compute(&snapshot.items).into();
        debug!(generation = snapshot.generation, tiles = spans.len(), "Laid out strip");
        *cache = Some(CachedSpans {
            generation: snapshot.generation,
            len: snapshot.len(),
            first_id: snapshot.items.first().map(|item| item.id),
            spans: Arc::clone(&spans),
        });
        spans
    }

    pub fn snapshot(&self) -> Arc<GallerySnapshot> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> Receiver<Arc<GallerySnapshot>> {
        self.store.subscribe()
    }

    pub fn store(&self) -> &GalleryStore {
        &self.store
    }

    pub fn layout(&self) -> &StripLayout {
        &self.layout
    }
}
