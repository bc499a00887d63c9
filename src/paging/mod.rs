//! Paged listing of the media index.

pub mod paginator;

pub use paginator::{Paginator, PagingState};
