use crate::error::LoadError;
use crate::models::{Item, ItemId, PageMeta};

/// Which kind of page request a load state or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    /// Replacing the whole listing (reload or anchored refresh).
    Refresh,
    /// Extending the tail.
    Append,
    /// Extending the head.
    Prepend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    NotLoading { end_reached: bool },
    Loading,
    Error(LoadError),
}

impl LoadState {
    pub fn idle() -> Self {
        Self::NotLoading { end_reached: false }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_end_reached(&self) -> bool {
        matches!(self, Self::NotLoading { end_reached: true })
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStates {
    pub refresh: LoadState,
    pub append: LoadState,
    pub prepend: LoadState,
}

impl LoadStates {
    pub fn get(&self, op: LoadOp) -> &LoadState {
        match op {
            LoadOp::Refresh => &self.refresh,
            LoadOp::Append => &self.append,
            LoadOp::Prepend => &self.prepend,
        }
    }

    pub(crate) fn set(&mut self, op: LoadOp, state: LoadState) {
        match op {
            LoadOp::Refresh => self.refresh = state,
            LoadOp::Append => self.append = state,
            LoadOp::Prepend => self.prepend = state,
        }
    }
}

impl Default for LoadStates {
    fn default() -> Self {
        Self {
            refresh: LoadState::idle(),
            append: LoadState::idle(),
            prepend: LoadState::idle(),
        }
    }
}

/// One-word summary of a snapshot for consumers that only pick a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryStatus {
    /// Nothing has been requested yet.
    Uninitialized,
    LoadingInitial,
    LoadingMore,
    /// The index answered and holds no photos.
    Empty,
    Ready,
    Error { op: LoadOp, error: LoadError },
}

/// Immutable view of the materialized listing, published after every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GallerySnapshot {
    /// Reload generation the contents belong to.
    pub generation: u64,
    pub initialized: bool,
    /// Materialized items in listing order, unique by id.
    pub items: Vec<Item>,
    /// Materialized pages in listing order.
    pub pages: Vec<PageMeta>,
    pub load_states: LoadStates,
}

impl GallerySnapshot {
    pub fn uninitialized() -> Self {
        Self {
            generation: 0,
            initialized: false,
            items: Vec::new(),
            pages: Vec::new(),
            load_states: LoadStates::default(),
        }
    }

    pub fn status(&self) -> GalleryStatus {
        let states = &self.load_states;
        if states.refresh.is_loading() {
            return GalleryStatus::LoadingInitial;
        }
        if !self.initialized {
            return GalleryStatus::Uninitialized;
        }
        for op in [LoadOp::Refresh, LoadOp::Append, LoadOp::Prepend] {
            if let Some(error) = states.get(op).error() {
                return GalleryStatus::Error {
                    op,
                    error: error.clone(),
                };
            }
        }
        if states.append.is_loading() || states.prepend.is_loading() {
            GalleryStatus::LoadingMore
        } else if self.items.is_empty() {
            GalleryStatus::Empty
        } else {
            GalleryStatus::Ready
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

impl Default for GallerySnapshot {
    fn default() -> Self {
        Self::uninitialized()
    }
}
