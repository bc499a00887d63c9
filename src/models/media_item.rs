use std::fmt;

/// Base of every location reference handed out by the media index.
pub const EXTERNAL_CONTENT_URI: &str = "content://media/external/images/media";

/// Stable identifier assigned by the media index.
pub type ItemId = i64;

/// Opaque, resolvable reference to the resource behind an [`Item`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaUri(String);

impl MediaUri {
    /// Reference to the image with `id` in the external images collection.
    pub fn for_id(id: ItemId) -> Self {
        Self(format!("{EXTERNAL_CONTENT_URI}/{id}"))
    }

    /// Extracts the id back out of a reference produced by [`MediaUri::for_id`].
    pub fn id(&self) -> Option<ItemId> {
        self.0
            .strip_prefix(EXTERNAL_CONTENT_URI)?
            .strip_prefix('/')?
            .parse()
            .ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One photo as listed by the index.
///
/// Items are never mutated: when the index changes the store rebuilds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub location: MediaUri,
}

impl Item {
    pub fn new(id: ItemId, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id,
            name: name.into(),
            width,
            height,
            location: MediaUri::for_id(id),
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_round_trips_id() {
        let uri = MediaUri::for_id(42);
        assert_eq!(uri.as_str(), "content://media/external/images/media/42");
        assert_eq!(uri.id(), Some(42));
    }

    #[test]
    fn test_foreign_uri_has_no_id() {
        let uri = MediaUri("file:///tmp/a.jpg".to_string());
        assert_eq!(uri.id(), None);
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(Item::new(1, "a.jpg", 200, 100).aspect_ratio(), 2.0);
        assert_eq!(Item::new(2, "b.jpg", 200, 0).aspect_ratio(), 1.0);
    }
}
