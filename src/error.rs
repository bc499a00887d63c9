use thiserror::Error;

/// Why a page could not be loaded.
///
/// Reaching the end of the listing is not an error: it shows up as a page
/// without a `next_key`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The host has not been granted read access to the media index.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The index rejected or failed the query.
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl LoadError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

impl From<rusqlite::Error> for LoadError {
    fn from(e: rusqlite::Error) -> Self {
        Self::QueryFailed(e.to_string())
    }
}
