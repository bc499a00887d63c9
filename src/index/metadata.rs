//! Header probing for image files.

use std::path::Path;

use image::ImageReader;
use tracing::{trace, warn};

/// Dimension reported for files whose header could not be read.
pub const ERROR_DIMENSION: u32 = 0;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif"];

/// Returns true if the extension belongs to an image the index lists.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Reads image dimensions from the header without decoding pixels.
///
/// Returns `(ERROR_DIMENSION, ERROR_DIMENSION)` for broken or unreadable files.
pub fn read_dimensions(path: &Path) -> (u32, u32) {
    trace!("Reading image dimensions from {:?}", path);

    let reader = match ImageReader::open(path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Failed to open image {:?}: {}", path, e);
            return (ERROR_DIMENSION, ERROR_DIMENSION);
        }
    };

    match reader.into_dimensions() {
        Ok((width, height)) => (width, height),
        Err(e) => {
            warn!("Failed to read image dimensions for {:?}: {}", path, e);
            (ERROR_DIMENSION, ERROR_DIMENSION)
        }
    }
}
