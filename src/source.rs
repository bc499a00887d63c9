//! Query interface onto the photo index.

use crate::error::LoadError;
use crate::models::{Item, ItemId, MediaUri};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recently added first.
    RecencyDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaQuery {
    pub sort: SortOrder,
    pub limit: usize,
    pub offset: usize,
}

/// A row exactly as the index returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRow {
    pub id: ItemId,
    pub name: String,
    pub width: i64,
    pub height: i64,
    pub location: MediaUri,
}

impl MediaRow {
    pub fn new(id: ItemId, name: impl Into<String>, width: i64, height: i64) -> Self {
        Self {
            id,
            name: name.into(),
            width,
            height,
            location: MediaUri::for_id(id),
        }
    }

    /// Converts to an [`Item`], rejecting rows without usable dimensions.
    pub fn into_item(self) -> Option<Item> {
        let width = u32::try_from(self.width).ok().filter(|w| *w > 0)?;
        let height = u32::try_from(self.height).ok().filter(|h| *h > 0)?;
        Some(Item {
            id: self.id,
            name: self.name,
            width,
            height,
            location: self.location,
        })
    }
}

/// Anything that can answer ordered, offset/limited queries over the photo index.
///
/// Implementations must report a missing read grant as
/// [`LoadError::PermissionDenied`] so callers can tell it apart from other
/// failures.
pub trait MediaSource: Send + Sync {
    fn query(&self, query: &MediaQuery) -> Result<Vec<MediaRow>, LoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_into_item() {
        let item = MediaRow::new(7, "a.jpg", 640, 480).into_item().unwrap();
        assert_eq!(item.id, 7);
        assert_eq!(item.location, MediaUri::for_id(7));
    }

    #[test]
    fn test_row_without_dimensions_is_rejected() {
        assert!(MediaRow::new(1, "a.jpg", 0, 480).into_item().is_none());
        assert!(MediaRow::new(2, "b.jpg", 640, -1).into_item().is_none());
    }
}
