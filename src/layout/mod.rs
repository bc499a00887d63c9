//! Geometry of the thumbnail strip.

pub mod strip;

pub use strip::{StripLayout, TileSpan};
