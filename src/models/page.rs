use crate::models::Item;

/// Number of items requested per page.
pub const PAGE_SIZE: usize = 10;

/// Ordinal of a page within the index listing.
pub type PageKey = u32;

/// One bounded batch of items, most recently added first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub key: PageKey,
    pub prev_key: Option<PageKey>,
    /// `None` once the listing is exhausted.
    pub next_key: Option<PageKey>,
    pub items: Vec<Item>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next_key.is_none()
    }

    pub fn is_first(&self) -> bool {
        self.prev_key.is_none()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Key bookkeeping for a materialized page, without its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub key: PageKey,
    pub prev_key: Option<PageKey>,
    pub next_key: Option<PageKey>,
    /// Items this page contributed after deduplication.
    pub len: usize,
}

impl From<&Page> for PageMeta {
    fn from(page: &Page) -> Self {
        Self {
            key: page.key,
            prev_key: page.prev_key,
            next_key: page.next_key,
            len: page.items.len(),
        }
    }
}
