//! Reactive container for the paged listing.
//!
//! - One writer thread owns the materialized pages and applies every change
//! - A small loader pool runs page queries off the writer thread
//! - Commands and load results share one flume channel, so writes are serialized
//! - Readers clone the published `Arc<GallerySnapshot>` and never block on loads
//!
//! Each reload bumps a shared generation counter before it is queued. Every
//! load carries the generation it was issued under and the writer drops
//! results whose generation is no longer current, so a slow page can never
//! overwrite a fresher reload.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};

use crate::config::{GalleryConfig, MAX_LOADERS};
use crate::error::LoadError;
use crate::models::{Item, ItemId, Page, PageKey, PageMeta};
use crate::paging::{Paginator, PagingState};
use crate::source::MediaSource;
use crate::store::snapshot::{GallerySnapshot, LoadOp, LoadState, LoadStates};

enum Command {
    Reload {
        generation: u64,
    },
    Refresh {
        generation: u64,
        anchor_position: Option<usize>,
    },
    AppendNext,
    PrependPrevious,
    ItemAccessed(usize),
    Retry,
    Loaded(LoadOutcome),
    Shutdown,
}

#[derive(Debug)]
struct LoadJob {
    generation: u64,
    op: LoadOp,
    key: Option<PageKey>,
}

#[derive(Debug)]
struct LoadOutcome {
    generation: u64,
    op: LoadOp,
    key: Option<PageKey>,
    /// `None` when the job was already superseded before it ran.
    result: Option<Result<Page, LoadError>>,
}

struct Shared {
    generation: AtomicU64,
    in_flight: AtomicUsize,
    snapshot: RwLock<Arc<GallerySnapshot>>,
    subscribers: Mutex<Vec<Sender<Arc<GallerySnapshot>>>>,
}

impl Shared {
    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn publish(&self, snapshot: GallerySnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.snapshot.write() = Arc::clone(&snapshot);
        self.subscribers
            .lock()
            .retain(|tx| tx.send(Arc::clone(&snapshot)).is_ok());
    }
}

struct StoreInner {
    cmd_tx: Sender<Command>,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl StoreInner {
    fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            warn!("Gallery store is shut down, dropping command");
        }
    }

    fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Shutting down gallery store");

        let _ = self.cmd_tx.send(Command::Shutdown);
        for handle in self.workers.lock().drain(..) {
            let _ = handle.join();
        }

        debug!("Gallery store shutdown complete");
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to the paged listing. Cheap to clone; all clones share one writer.
#[derive(Clone)]
pub struct GalleryStore {
    inner: Arc<StoreInner>,
}

/// Non-owning handle, see [`GalleryStore::downgrade`].
#[derive(Clone)]
pub struct WeakGalleryStore {
    inner: Weak<StoreInner>,
}

impl WeakGalleryStore {
    pub fn upgrade(&self) -> Option<GalleryStore> {
        self.inner.upgrade().map(|inner| GalleryStore { inner })
    }
}

impl GalleryStore {
    /// Creates a store with default configuration.
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self::with_config(source, &GalleryConfig::default())
    }

    /// Creates a store and starts its writer and loader threads.
    ///
    /// Nothing is loaded until [`GalleryStore::reload`] is called.
    pub fn with_config(source: Arc<dyn MediaSource>, config: &GalleryConfig) -> Self {
        let num_loaders = config.loader_threads.clamp(1, MAX_LOADERS);

        let (cmd_tx, cmd_rx) = flume::unbounded();
        let (job_tx, job_rx) = flume::unbounded();

        let shared = Arc::new(Shared {
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            snapshot: RwLock::new(Arc::new(GallerySnapshot::uninitialized())),
            subscribers: Mutex::new(Vec::new()),
        });

        let paginator = Paginator::new(source);
        let mut workers = Vec::with_capacity(num_loaders + 1);

        for loader_id in 0..num_loaders {
            let rx = job_rx.clone();
            let tx = cmd_tx.clone();
            let shared = Arc::clone(&shared);
            let paginator = paginator.clone();

            let handle = thread::Builder::new()
                .name(format!("page-loader-{}", loader_id))
                .spawn(move || loader_loop(loader_id, paginator, rx, tx, shared))
                .expect("Failed to spawn page loader");
            workers.push(handle);
        }

        let writer = Writer::new(Arc::clone(&shared), job_tx, config.prefetch_distance);
        let handle = thread::Builder::new()
            .name("gallery-store".to_string())
            .spawn(move || writer.run(cmd_rx))
            .expect("Failed to spawn gallery store writer");
        workers.push(handle);

        debug!(num_loaders, "Started gallery store");

        Self {
            inner: Arc::new(StoreInner {
                cmd_tx,
                shared,
                workers: Mutex::new(workers),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakGalleryStore {
        WeakGalleryStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Discards every materialized page and loads the first page again.
    ///
    /// Results of loads issued before this call are dropped on arrival.
    pub fn reload(&self) {
        let generation = self.bump_generation();
        info!(generation, "Reloading gallery");
        self.inner.send(Command::Reload { generation });
    }

    /// Like [`GalleryStore::reload`], but restarts at the page around
    /// `anchor_position` so the viewer keeps its place.
    pub fn refresh(&self, anchor_position: Option<usize>) {
        let generation = self.bump_generation();
        info!(generation, ?anchor_position, "Refreshing gallery");
        self.inner.send(Command::Refresh {
            generation,
            anchor_position,
        });
    }

    /// Loads the page after the last materialized one.
    ///
    /// No-op past the end of the listing or while another append is in flight.
    pub fn append_next(&self) {
        self.inner.send(Command::AppendNext);
    }

    /// Loads the page before the first materialized one.
    pub fn prepend_previous(&self) {
        self.inner.send(Command::PrependPrevious);
    }

    /// Tells the store the consumer is showing item `index`, loading
    /// neighbouring pages when it is close to either end.
    pub fn on_item_accessed(&self, index: usize) {
        self.inner.send(Command::ItemAccessed(index));
    }

    /// Re-issues every operation currently in the error state.
    pub fn retry(&self) {
        self.inner.send(Command::Retry);
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<GallerySnapshot> {
        Arc::clone(&self.inner.shared.snapshot.read())
    }

    /// Receives the current snapshot immediately, then every later one.
    pub fn subscribe(&self) -> Receiver<Arc<GallerySnapshot>> {
        let (tx, rx) = flume::unbounded();
        let mut subscribers = self.inner.shared.subscribers.lock();
        let _ = tx.send(self.snapshot());
        subscribers.push(tx);
        rx
    }

    /// Blocks until a published snapshot satisfies `pred`, or `timeout` passes.
    pub fn wait_for<F>(&self, timeout: Duration, mut pred: F) -> Option<Arc<GallerySnapshot>>
    where
        F: FnMut(&GallerySnapshot) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let rx = self.subscribe();
        loop {
            match rx.recv_deadline(deadline) {
                Ok(snapshot) if pred(&snapshot) => return Some(snapshot),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Number of page loads issued and not yet applied or discarded.
    pub fn pending_loads(&self) -> usize {
        self.inner.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Generation of the most recent reload request.
    pub fn generation(&self) -> u64 {
        self.inner.shared.current_generation()
    }

    /// Stops the writer and loader threads and waits for them.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    fn bump_generation(&self) -> u64 {
        self.inner.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Owner of the materialized pages. Lives on the writer thread.
struct Writer {
    shared: Arc<Shared>,
    job_tx: Sender<LoadJob>,
    prefetch_distance: usize,
    generation: u64,
    initialized: bool,
    items: Vec<Item>,
    ids: HashSet<ItemId>,
    pages: Vec<PageMeta>,
    load_states: LoadStates,
    refresh_key: Option<PageKey>,
    append_pending: bool,
    prepend_pending: bool,
}

impl Writer {
    fn new(shared: Arc<Shared>, job_tx: Sender<LoadJob>, prefetch_distance: usize) -> Self {
        Self {
            shared,
            job_tx,
            prefetch_distance,
            generation: 0,
            initialized: false,
            items: Vec::new(),
            ids: HashSet::new(),
            pages: Vec::new(),
            load_states: LoadStates::default(),
            refresh_key: None,
            append_pending: false,
            prepend_pending: false,
        }
    }

    fn run(mut self, rx: Receiver<Command>) {
        debug!("Gallery store writer started");

        while let Ok(cmd) = rx.recv() {
            match cmd {
                Command::Reload { generation } => self.start_refresh(generation, None),
                Command::Refresh {
                    generation,
                    anchor_position,
                } => {
                    let key = Paginator::refresh_key(&PagingState {
                        pages: &self.pages,
                        anchor_position,
                    });
                    self.start_refresh(generation, key);
                }
                Command::AppendNext => self.append_next(),
                Command::PrependPrevious => self.prepend_previous(),
                Command::ItemAccessed(index) => self.item_accessed(index),
                Command::Retry => self.retry(),
                Command::Loaded(outcome) => self.apply(outcome),
                Command::Shutdown => break,
            }
        }

        debug!("Gallery store writer stopped");
    }

    fn is_superseded(&self) -> bool {
        self.shared.current_generation() != self.generation
    }

    fn start_refresh(&mut self, generation: u64, key: Option<PageKey>) {
        if generation != self.shared.current_generation() {
            trace!(generation, "Skipping superseded reload");
            return;
        }

        self.generation = generation;
        self.initialized = true;
        self.items.clear();
        self.ids.clear();
        self.pages.clear();
        self.append_pending = false;
        self.prepend_pending = false;
        self.load_states = LoadStates::default();
        self.refresh_key = key;

        self.dispatch(LoadOp::Refresh, key);
        self.publish();
    }

    fn dispatch(&mut self, op: LoadOp, key: Option<PageKey>) {
        self.load_states.set(op, LoadState::Loading);
        match op {
            LoadOp::Append => self.append_pending = true,
            LoadOp::Prepend => self.prepend_pending = true,
            LoadOp::Refresh => {}
        }

        trace!(?op, ?key, generation = self.generation, "Dispatching page load");
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        let job = LoadJob {
            generation: self.generation,
            op,
            key,
        };
        if self.job_tx.send(job).is_err() {
            error!("Page loaders disconnected");
            self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn can_extend(&self, op: LoadOp) -> bool {
        if !self.initialized || self.is_superseded() {
            trace!(?op, "Store not ready to extend");
            return false;
        }
        if self.load_states.refresh.is_loading() || self.pages.is_empty() {
            trace!(?op, "Initial page not loaded yet");
            return false;
        }
        true
    }

    fn append_next(&mut self) {
        if !self.can_extend(LoadOp::Append) {
            return;
        }
        if self.append_pending {
            trace!("Append already in flight");
            return;
        }
        match self.pages.last().and_then(|page| page.next_key) {
            Some(key) => {
                self.dispatch(LoadOp::Append, Some(key));
                self.publish();
            }
            None => trace!("End of listing reached, nothing to append"),
        }
    }

    fn prepend_previous(&mut self) {
        if !self.can_extend(LoadOp::Prepend) {
            return;
        }
        if self.prepend_pending {
            trace!("Prepend already in flight");
            return;
        }
        match self.pages.first().and_then(|page| page.prev_key) {
            Some(key) => {
                self.dispatch(LoadOp::Prepend, Some(key));
                self.publish();
            }
            None => trace!("Start of listing reached, nothing to prepend"),
        }
    }

    /// Prefetch trigger. Operations in the error state wait for an explicit retry.
    fn item_accessed(&mut self, index: usize) {
        if self.items.is_empty() {
            return;
        }
        if index.saturating_add(self.prefetch_distance) >= self.items.len()
            && self.load_states.append.error().is_none()
        {
            self.append_next();
        }
        if index < self.prefetch_distance && self.load_states.prepend.error().is_none() {
            self.prepend_previous();
        }
    }

    fn retry(&mut self) {
        if self.is_superseded() {
            return;
        }
        if self.load_states.refresh.error().is_some() {
            debug!(key = ?self.refresh_key, "Retrying initial load");
            self.dispatch(LoadOp::Refresh, self.refresh_key);
            self.publish();
            return;
        }
        if self.load_states.append.error().is_some() {
            debug!("Retrying append");
            self.append_next();
        }
        if self.load_states.prepend.error().is_some() {
            debug!("Retrying prepend");
            self.prepend_previous();
        }
    }

    fn apply(&mut self, outcome: LoadOutcome) {
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);

        let current = self.shared.current_generation();
        if outcome.generation != self.generation || outcome.generation != current {
            trace!(
                op = ?outcome.op,
                key = ?outcome.key,
                generation = outcome.generation,
                current,
                "Discarding stale page result"
            );
            return;
        }
        let Some(result) = outcome.result else {
            return;
        };

        match outcome.op {
            LoadOp::Refresh => self.apply_refresh(result),
            LoadOp::Append => {
                self.append_pending = false;
                self.apply_append(result);
            }
            LoadOp::Prepend => {
                self.prepend_pending = false;
                self.apply_prepend(result);
            }
        }
        self.publish();
    }

    fn apply_refresh(&mut self, result: Result<Page, LoadError>) {
        match result {
            Ok(page) if page.items.is_empty() && page.is_last() && page.prev_key.is_some() => {
                // The anchor page fell past the end of a shrunken listing.
                // Only an empty first page may leave the gallery empty.
                debug!(key = page.key, "Anchor page is empty, restarting at first page");
                self.refresh_key = None;
                self.dispatch(LoadOp::Refresh, None);
            }
            Ok(page) => {
                let meta = PageMeta::from(&page);
                let fresh = self.take_new_items(page.items);
                self.pages = vec![PageMeta {
                    len: fresh.len(),
                    ..meta
                }];
                self.items = fresh;
                self.load_states = LoadStates {
                    refresh: LoadState::idle(),
                    append: LoadState::NotLoading {
                        end_reached: meta.next_key.is_none(),
                    },
                    prepend: LoadState::NotLoading {
                        end_reached: meta.prev_key.is_none(),
                    },
                };
                debug!(key = meta.key, items = self.items.len(), "Applied initial page");
            }
            Err(e) => {
                warn!(error = %e, "Initial page load failed");
                self.load_states.refresh = LoadState::Error(e);
            }
        }
    }

    fn apply_append(&mut self, result: Result<Page, LoadError>) {
        match result {
            Ok(page) => {
                let meta = PageMeta::from(&page);
                let fresh = self.take_new_items(page.items);
                self.pages.push(PageMeta {
                    len: fresh.len(),
                    ..meta
                });
                self.items.extend(fresh);
                self.load_states.append = LoadState::NotLoading {
                    end_reached: meta.next_key.is_none(),
                };
                debug!(key = meta.key, total = self.items.len(), "Appended page");
            }
            Err(e) => {
                warn!(error = %e, "Append failed");
                self.load_states.append = LoadState::Error(e);
            }
        }
    }

    fn apply_prepend(&mut self, result: Result<Page, LoadError>) {
        match result {
            Ok(page) => {
                let meta = PageMeta::from(&page);
                let fresh = self.take_new_items(page.items);
                self.pages.insert(
                    0,
                    PageMeta {
                        len: fresh.len(),
                        ..meta
                    },
                );
                self.items.splice(0..0, fresh);
                self.load_states.prepend = LoadState::NotLoading {
                    end_reached: meta.prev_key.is_none(),
                };
                debug!(key = meta.key, total = self.items.len(), "Prepended page");
            }
            Err(e) => {
                warn!(error = %e, "Prepend failed");
                self.load_states.prepend = LoadState::Error(e);
            }
        }
    }

    /// Keeps only items whose id is not materialized yet.
    fn take_new_items(&mut self, items: Vec<Item>) -> Vec<Item> {
        let mut fresh = Vec::with_capacity(items.len());
        for item in items {
            if self.ids.insert(item.id) {
                fresh.push(item);
            } else {
                trace!(id = item.id, "Dropping duplicate item");
            }
        }
        fresh
    }

    fn publish(&self) {
        self.shared.publish(GallerySnapshot {
            generation: self.generation,
            initialized: self.initialized,
            items: self.items.clone(),
            pages: self.pages.clone(),
            load_states: self.load_states.clone(),
        });
    }
}

/// Page loader thread loop.
fn loader_loop(
    loader_id: usize,
    paginator: Paginator,
    rx: Receiver<LoadJob>,
    tx: Sender<Command>,
    shared: Arc<Shared>,
) {
    debug!(loader_id, "Page loader started");

    while let Ok(job) = rx.recv() {
        let result = if job.generation == shared.current_generation() {
            Some(paginator.load_page(job.key))
        } else {
            trace!(loader_id, generation = job.generation, "Skipping superseded page load");
            None
        };

        let outcome = LoadOutcome {
            generation: job.generation,
            op: job.op,
            key: job.key,
            result,
        };
        if tx.send(Command::Loaded(outcome)).is_err() {
            break;
        }
    }

    debug!(loader_id, "Page loader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MediaIndex, NewImage};
    use crate::models::PAGE_SIZE;
    use crate::source::{MediaQuery, MediaRow};
    use crate::store::snapshot::GalleryStatus;

    const WAIT: Duration = Duration::from_secs(5);

    /// Recency listing of `total` rows whose query at `blocked_offset` parks
    /// until the test releases it.
    struct GatedSource {
        total: usize,
        blocked_offset: Option<usize>,
        entered_tx: Sender<usize>,
        release_rx: Receiver<()>,
        queries: Mutex<Vec<usize>>,
    }

    struct Gate {
        entered_rx: Receiver<usize>,
        release_tx: Sender<()>,
    }

    impl GatedSource {
        fn new(total: usize, blocked_offset: Option<usize>) -> (Arc<Self>, Gate) {
            let (entered_tx, entered_rx) = flume::unbounded();
            let (release_tx, release_rx) = flume::unbounded();
            let source = Arc::new(Self {
                total,
                blocked_offset,
                entered_tx,
                release_rx,
                queries: Mutex::new(Vec::new()),
            });
            (
                source,
                Gate {
                    entered_rx,
                    release_tx,
                },
            )
        }

        fn queries_at(&self, offset: usize) -> usize {
            self.queries.lock().iter().filter(|o| **o == offset).count()
        }
    }

    impl MediaSource for GatedSource {
        fn query(&self, query: &MediaQuery) -> Result<Vec<MediaRow>, LoadError> {
            self.queries.lock().push(query.offset);
            if self.blocked_offset == Some(query.offset) {
                let _ = self.entered_tx.send(query.offset);
                let _ = self.release_rx.recv();
            }
            Ok((query.offset..self.total)
                .take(query.limit)
                .map(|i| {
                    let id = (self.total - i) as i64;
                    MediaRow::new(id, format!("{id}.jpg"), 100, 100)
                })
                .collect())
        }
    }

    fn ids(snapshot: &GallerySnapshot) -> Vec<ItemId> {
        snapshot.items.iter().map(|i| i.id).collect()
    }

    fn wait_idle(store: &GalleryStore) {
        let deadline = Instant::now() + WAIT;
        while store.pending_loads() > 0 {
            assert!(Instant::now() < deadline, "loads did not settle");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn settled(store: &GalleryStore, len: usize) -> Arc<GallerySnapshot> {
        let snapshot = store
            .wait_for(WAIT, |s| {
                s.generation == store.generation()
                    && s.initialized
                    && !s.load_states.refresh.is_loading()
                    && !s.load_states.append.is_loading()
                    && s.len() == len
            })
            .expect("store did not settle");
        wait_idle(store);
        snapshot
    }

    #[test]
    fn test_starts_uninitialized() {
        let (source, _gate) = GatedSource::new(5, None);
        let store = GalleryStore::new(source);
        assert_eq!(store.snapshot().status(), GalleryStatus::Uninitialized);
    }

    #[test]
    fn test_reload_loads_first_page() {
        let (source, _gate) = GatedSource::new(35, None);
        let store = GalleryStore::new(source);

        store.reload();
        let snapshot = settled(&store, PAGE_SIZE);

        assert_eq!(ids(&snapshot), (26..=35).rev().collect::<Vec<_>>());
        assert_eq!(snapshot.pages.len(), 1);
        assert_eq!(snapshot.pages[0].next_key, Some(1));
        assert_eq!(snapshot.status(), GalleryStatus::Ready);
    }

    #[test]
    fn test_append_until_end_of_data() {
        let (source, _gate) = GatedSource::new(15, None);
        let store = GalleryStore::new(Arc::clone(&source) as Arc<dyn MediaSource>);

        store.reload();
        settled(&store, 10);
        store.append_next();
        let snapshot = settled(&store, 15);
        assert!(snapshot.load_states.append.is_end_reached());

        store.append_next();
        wait_idle(&store);
        assert_eq!(source.queries_at(20), 0);
        assert_eq!(store.snapshot().len(), 15);
    }

    #[test]
    fn test_reload_discards_in_flight_append() {
        let (source, gate) = GatedSource::new(40, Some(PAGE_SIZE));
        let store = GalleryStore::new(source);

        store.reload();
        let first = settled(&store, PAGE_SIZE);

        store.append_next();
        assert_eq!(gate.entered_rx.recv_timeout(WAIT), Ok(PAGE_SIZE));

        store.reload();
        let reloaded = store
            .wait_for(WAIT, |s| {
                s.generation == 2 && !s.load_states.refresh.is_loading() && s.len() == PAGE_SIZE
            })
            .expect("reload did not finish");
        assert_eq!(ids(&reloaded), ids(&first));
        assert_eq!(store.pending_loads(), 1);

        gate.release_tx.send(()).unwrap();
        wait_idle(&store);

        let last = store.snapshot();
        assert_eq!(ids(&last), ids(&first));
        assert_eq!(last.pages.len(), 1);
        assert!(!last.load_states.append.is_loading());
    }

    #[test]
    fn test_concurrent_appends_collapse() {
        let (source, gate) = GatedSource::new(40, Some(PAGE_SIZE));
        let store = GalleryStore::new(Arc::clone(&source) as Arc<dyn MediaSource>);

        store.reload();
        settled(&store, PAGE_SIZE);

        store.append_next();
        gate.entered_rx.recv_timeout(WAIT).unwrap();
        store.append_next();
        store.append_next();
        gate.release_tx.send(()).unwrap();

        let snapshot = settled(&store, 2 * PAGE_SIZE);
        assert_eq!(source.queries_at(PAGE_SIZE), 1);
        assert_eq!(source.queries_at(2 * PAGE_SIZE), 0);
        assert_eq!(snapshot.pages.len(), 2);
    }

    #[test]
    fn test_overlapping_reloads_do_not_duplicate() {
        let (source, _gate) = GatedSource::new(30, None);
        let store = GalleryStore::new(source);

        store.reload();
        store.reload();
        store.reload();
        let snapshot = settled(&store, PAGE_SIZE);

        let unique: HashSet<ItemId> = ids(&snapshot).into_iter().collect();
        assert_eq!(unique.len(), PAGE_SIZE);
        assert_eq!(snapshot.generation, 3);
    }

    #[test]
    fn test_shifted_rows_are_deduplicated() {
        let index = Arc::new(MediaIndex::open_in_memory().unwrap());
        for i in 0..20 {
            index.insert(&NewImage::new(format!("{i}.jpg"), 10, 10, i)).unwrap();
        }
        let store = GalleryStore::new(Arc::clone(&index) as Arc<dyn MediaSource>);

        store.reload();
        settled(&store, PAGE_SIZE);

        // A newer photo pushes the last row of page 0 onto page 1.
        index.insert(&NewImage::new("new.jpg", 10, 10, 100)).unwrap();
        store.append_next();
        let snapshot = settled(&store, 2 * PAGE_SIZE - 1);

        let unique: HashSet<ItemId> = ids(&snapshot).into_iter().collect();
        assert_eq!(unique.len(), snapshot.len());
        assert_eq!(snapshot.pages[1].len, PAGE_SIZE - 1);
    }

    #[test]
    fn test_empty_index_is_distinct_state() {
        let index = Arc::new(MediaIndex::open_in_memory().unwrap());
        let store = GalleryStore::new(index);

        store.reload();
        let snapshot = settled(&store, 0);
        assert_eq!(snapshot.status(), GalleryStatus::Empty);
        assert!(snapshot.load_states.append.is_end_reached());
    }

    #[test]
    fn test_permission_error_and_retry() {
        let index = Arc::new(MediaIndex::open_in_memory().unwrap());
        index.insert(&NewImage::new("a.jpg", 10, 10, 1)).unwrap();
        index.set_read_granted(false);
        let store = GalleryStore::new(Arc::clone(&index) as Arc<dyn MediaSource>);

        store.reload();
        let failed = store
            .wait_for(WAIT, |s| s.load_states.refresh.error().is_some())
            .unwrap();
        match failed.status() {
            GalleryStatus::Error { op, error } => {
                assert_eq!(op, LoadOp::Refresh);
                assert!(error.is_permission_denied());
            }
            other => panic!("unexpected status {other:?}"),
        }

        index.set_read_granted(true);
        store.retry();
        let snapshot = settled(&store, 1);
        assert_eq!(snapshot.status(), GalleryStatus::Ready);
    }

    #[test]
    fn test_refresh_keeps_anchor_page() {
        let (source, _gate) = GatedSource::new(50, None);
        let store = GalleryStore::new(source);

        store.reload();
        settled(&store, 10);
        store.append_next();
        settled(&store, 20);
        store.append_next();
        settled(&store, 30);

        // Anchor on page 2: its prev key is 1, so loading restarts at page 2.
        store.refresh(Some(25));
        let snapshot = settled(&store, 10);
        assert_eq!(snapshot.pages[0].key, 2);
        assert_eq!(snapshot.items[0].id, 30);
        assert!(!snapshot.load_states.prepend.is_end_reached());

        store.prepend_previous();
        let snapshot = store
            .wait_for(WAIT, |s| s.len() == 20 && !s.load_states.prepend.is_loading())
            .unwrap();
        assert_eq!(snapshot.pages[0].key, 1);
        assert_eq!(snapshot.items[0].id, 40);
    }

    #[test]
    fn test_refresh_past_shrunken_end_restarts_at_first_page() {
        let index = Arc::new(MediaIndex::open_in_memory().unwrap());
        let ids: Vec<ItemId> = (0..30)
            .map(|i| index.insert(&NewImage::new(format!("{i}.jpg"), 10, 10, i)).unwrap())
            .collect();
        let store = GalleryStore::new(Arc::clone(&index) as Arc<dyn MediaSource>);

        store.reload();
        settled(&store, 10);
        store.append_next();
        settled(&store, 20);
        store.append_next();
        settled(&store, 30);

        // Half the photos go away, so page 2 no longer has rows.
        for id in &ids[..15] {
            index.delete(*id).unwrap();
        }
        store.refresh(Some(25));
        let snapshot = settled(&store, 10);

        assert_eq!(snapshot.pages[0].key, 0);
        assert_eq!(snapshot.items[0].name, "29.jpg");
        assert_eq!(snapshot.status(), GalleryStatus::Ready);
        assert!(snapshot.load_states.prepend.is_end_reached());
    }

    #[test]
    fn test_item_access_prefetches_next_page() {
        let (source, _gate) = GatedSource::new(40, None);
        let config = GalleryConfig::default().with_prefetch_distance(3);
        let store = GalleryStore::with_config(source, &config);

        store.reload();
        settled(&store, 10);

        store.on_item_accessed(2);
        wait_idle(&store);
        assert_eq!(store.snapshot().len(), 10);

        store.on_item_accessed(7);
        settled(&store, 20);
    }

    #[test]
    fn test_subscribers_see_loading_then_ready() {
        let (source, _gate) = GatedSource::new(5, None);
        let store = GalleryStore::new(source);
        let rx = store.subscribe();

        store.reload();
        settled(&store, 5);

        let statuses: Vec<GalleryStatus> = rx.try_iter().map(|s| s.status()).collect();
        assert_eq!(statuses.first(), Some(&GalleryStatus::Uninitialized));
        assert!(statuses.contains(&GalleryStatus::LoadingInitial));
        assert_eq!(statuses.last(), Some(&GalleryStatus::Ready));
    }
}
