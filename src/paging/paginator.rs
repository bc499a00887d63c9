use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::LoadError;
use crate::models::{Page, PageKey, PageMeta, PAGE_SIZE};
use crate::source::{MediaQuery, MediaSource, SortOrder};

/// What the paginator needs to know about the materialized window to pick a
/// refresh key.
#[derive(Debug, Clone, Copy)]
pub struct PagingState<'a> {
    /// Materialized pages, in listing order.
    pub pages: &'a [PageMeta],
    /// Position in the materialized item sequence nearest the viewport.
    pub anchor_position: Option<usize>,
}

impl PagingState<'_> {
    /// Page containing `position`; positions past the end map to the last page.
    pub fn closest_page_to_position(&self, position: usize) -> Option<&PageMeta> {
        let mut start = 0;
        for page in self.pages {
            let end = start + page.len;
            if position < end {
                return Some(page);
            }
            start = end;
        }
        self.pages.last()
    }
}

/// Turns media source queries into numbered pages.
///
/// Page `k` covers rows `k * PAGE_SIZE .. (k + 1) * PAGE_SIZE` of the
/// recency-ordered listing.
#[derive(Clone)]
pub struct Paginator {
    source: Arc<dyn MediaSource>,
}

impl Paginator {
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self { source }
    }

    /// Loads page `key`, or the first page when `key` is `None`.
    ///
    /// A page shorter than [`PAGE_SIZE`] ends the listing and carries no
    /// `next_key`. Failures are returned as errors, never as empty pages.
    pub fn load_page(&self, key: Option<PageKey>) -> Result<Page, LoadError> {
        let key = key.unwrap_or(0);
        let query = MediaQuery {
            sort: SortOrder::RecencyDesc,
            limit: PAGE_SIZE,
            offset: key as usize * PAGE_SIZE,
        };
        trace!(key, offset = query.offset, "Querying page");

        let rows = self.source.query(&query).map_err(|e| {
            warn!(key, error = %e, "Page query failed");
            e
        })?;
        let row_count = rows.len();

        let items = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                let item = row.into_item();
                if item.is_none() {
                    warn!(id, "Skipping row without usable dimensions");
                }
                item
            })
            .collect();

        let page = Page {
            key,
            prev_key: key.checked_sub(1),
            // Judged on raw rows so a skipped row cannot end the listing early.
            next_key: (row_count >= PAGE_SIZE).then(|| key + 1),
            items,
        };
        debug!(key, rows = row_count, last = page.is_last(), "Loaded page");
        Ok(page)
    }

    /// Key to restart loading from so the anchored position stays in view.
    ///
    /// `None` means start from the first page.
    pub fn refresh_key(state: &PagingState<'_>) -> Option<PageKey> {
        let anchor = state.anchor_position?;
        let page = state.closest_page_to_position(anchor)?;
        page.prev_key
            .map(|prev| prev + 1)
            .or_else(|| page.next_key.map(|next| next - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MediaRow;

    /// Listing of `total` rows with ids counting down, like a recency index.
    struct FakeSource {
        total: usize,
        failure: Option<LoadError>,
    }

    impl MediaSource for FakeSource {
        fn query(&self, query: &MediaQuery) -> Result<Vec<MediaRow>, LoadError> {
            if let Some(e) = &self.failure {
                return Err(e.clone());
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

    fn paginator(total: usize) -> Paginator {
        Paginator::new(Arc::new(FakeSource {
            total,
            failure: None,
        }))
    }

    fn meta(key: PageKey, prev_key: Option<PageKey>, next_key: Option<PageKey>) -> PageMeta {
        PageMeta {
            key,
            prev_key,
            next_key,
            len: PAGE_SIZE,
        }
    }

    #[test]
    fn test_page_keys() {
        let paginator = paginator(100);
        for key in 0..5 {
            let page = paginator.load_page(Some(key)).unwrap();
            assert_eq!(page.key, key);
            assert_eq!(page.prev_key, key.checked_sub(1));
            assert_eq!(page.next_key, Some(key + 1));
            assert_eq!(page.len(), PAGE_SIZE);
        }
    }

    #[test]
    fn test_absent_key_is_first_page() {
        let page = paginator(30).load_page(None).unwrap();
        assert_eq!(page.key, 0);
        assert_eq!(page.prev_key, None);
        assert_eq!(page.items[0].id, 30);
    }

    #[test]
    fn test_short_page_ends_listing() {
        let page = paginator(25).load_page(Some(2)).unwrap();
        assert_eq!(page.len(), 5);
        assert_eq!(page.next_key, None);
        assert_eq!(page.prev_key, Some(1));
    }

    #[test]
    fn test_empty_index() {
        let page = paginator(0).load_page(Some(0)).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.next_key, None);
        assert_eq!(page.prev_key, None);
    }

    #[test]
    fn test_failure_is_not_an_empty_page() {
        let paginator = Paginator::new(Arc::new(FakeSource {
            total: 10,
            failure: Some(LoadError::PermissionDenied("no grant".into())),
        }));
        assert!(paginator.load_page(None).unwrap_err().is_permission_denied());
    }

    #[test]
    fn test_rows_without_dimensions_do_not_end_listing() {
        struct OneBadRow;
        impl MediaSource for OneBadRow {
            fn query(&self, _query: &MediaQuery) -> Result<Vec<MediaRow>, LoadError> {
                let mut rows: Vec<MediaRow> =
                    (0..PAGE_SIZE as i64).map(|i| MediaRow::new(i, "x.jpg", 10, 10)).collect();
                rows[3].width = 0;
                Ok(rows)
            }
        }

        let page = Paginator::new(Arc::new(OneBadRow)).load_page(None).unwrap();
        assert_eq!(page.len(), PAGE_SIZE - 1);
        assert_eq!(page.next_key, Some(1));
    }

    #[test]
    fn test_closest_page_to_position() {
        let pages = [
            meta(0, None, Some(1)),
            PageMeta {
                len: 4,
                ..meta(1, Some(0), None)
            },
        ];
        let state = PagingState {
            pages: &pages,
            anchor_position: None,
        };
        assert_eq!(state.closest_page_to_position(0).unwrap().key, 0);
        assert_eq!(state.closest_page_to_position(9).unwrap().key, 0);
        assert_eq!(state.closest_page_to_position(10).unwrap().key, 1);
        assert_eq!(state.closest_page_to_position(500).unwrap().key, 1);
    }

    #[test]
    fn test_refresh_key_prefers_prev_key() {
        let pages = [meta(2, Some(1), Some(3)), meta(3, Some(2), Some(4))];
        let state = PagingState {
            pages: &pages,
            anchor_position: Some(12),
        };
        assert_eq!(Paginator::refresh_key(&state), Some(3));
    }

    #[test]
    fn test_refresh_key_falls_back_to_next_key() {
        let pages = [meta(0, None, Some(1))];
        let state = PagingState {
            pages: &pages,
            anchor_position: Some(4),
        };
        assert_eq!(Paginator::refresh_key(&state), Some(0));
    }

    #[test]
    fn test_refresh_key_without_anchor_or_keys() {
        let pages = [meta(0, None, None)];
        let no_anchor = PagingState {
            pages: &pages,
            anchor_position: None,
        };
        assert_eq!(Paginator::refresh_key(&no_anchor), None);

        let single = PagingState {
            pages: &pages,
            anchor_position: Some(3),
        };
        assert_eq!(Paginator::refresh_key(&single), None);

        let nothing = PagingState {
            pages: &[],
            anchor_position: Some(3),
        };
        assert_eq!(Paginator::refresh_key(&nothing), None);
    }
}
