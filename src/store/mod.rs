//! Observable store for the paged gallery listing.
//!
//! This module provides:
//! - `GalleryStore` - Single-writer container that loads and publishes pages
//! - `GallerySnapshot` - Immutable view handed to readers
//! - `LoadState` / `GalleryStatus` - Per-operation progress and its summary

pub mod gallery_store;
pub mod snapshot;

pub use gallery_store::{GalleryStore, WeakGalleryStore};
pub use snapshot::{GallerySnapshot, GalleryStatus, LoadOp, LoadState, LoadStates};
