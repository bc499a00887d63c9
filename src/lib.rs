//! Paged photo listing with a centered-item thumbnail strip.
//!
//! - `index` - Local SQLite media index, directory scanner and watcher
//! - `paging` - Page queries against a `MediaSource`
//! - `store` - Single-writer store publishing snapshots of the listing
//! - `selection` / `layout` - Strip geometry and centered-item tracking
//! - `session` - Composition of the above for one viewer

pub mod config;
pub mod error;
pub mod index;
pub mod layout;
pub mod models;
pub mod paging;
pub mod selection;
pub mod session;
pub mod source;
pub mod store;
pub mod watcher;

pub use config::GalleryConfig;
pub use error::LoadError;
pub use session::GallerySession;
pub use source::MediaSource;
