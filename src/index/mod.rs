//! Local photo index consumed through [`crate::source::MediaSource`].
//!
//! - `MediaIndex` - SQLite catalog with stable ids and change notifications
//! - `FileScanner` - Populates the catalog from a directory tree
//! - `DirectoryWatcher` - Reports filesystem changes that warrant a rescan

pub mod file_scanner;
pub mod media_index;
pub mod metadata;
pub mod watch;

pub use file_scanner::{FileScanner, ScanConfig, ScanResult};
pub use media_index::{MediaIndex, NewImage};
pub use watch::{DirectoryWatcher, FileAction, FileEvent};
