//! Directory scanner that keeps the media index in step with a photo folder.
//!
//! This module provides the `FileScanner` struct which handles:
//! - Recursive directory scanning using walkdir
//! - Image detection by file extension
//! - Skipping unchanged files based on mtime and size
//! - Batched SQLite writes and removal of vanished files
//!
//! A whole scan is one notification batch, so observers of the index hear
//! about it at most once.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use tokio::task;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use crate::index::media_index::{MediaIndex, NewImage};
use crate::index::metadata::{self, ERROR_DIMENSION};

/// Configuration for the file scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to scan directories recursively.
    pub recursive: bool,
    /// Maximum directory depth (0 = unlimited).
    pub max_depth: usize,
    /// Number of images to batch before writing to the index.
    pub batch_size: usize,
    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: 0, // unlimited
            batch_size: 100,
            follow_symlinks: false,
        }
    }
}

/// Result of a completed scan operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Total number of image files found.
    pub total_files: usize,
    /// Number of newly added or changed images written to the index.
    pub new_items: usize,
    /// Number of images whose index row was already current.
    pub unchanged_items: usize,
    /// Number of index rows dropped because their file disappeared.
    pub removed_items: usize,
    /// Number of files whose header could not be read.
    pub error_count: usize,
}

/// A file discovered during scanning.
#[derive(Debug, Clone)]
struct DiscoveredEntry {
    path: PathBuf,
    mtime: i64,
    size: i64,
}

/// Scanner that mirrors a directory tree into a [`MediaIndex`].
pub struct FileScanner {
    config: ScanConfig,
}

impl FileScanner {
    /// Creates a new file scanner with default configuration.
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    /// Creates a new file scanner with custom configuration.
    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scans `dir` into `index` on a blocking task.
    pub async fn scan_directory(&self, dir: &Path, index: Arc<MediaIndex>) -> Result<ScanResult> {
        let dir = dir.to_path_buf();
        let config = self.config.clone();

        task::spawn_blocking(move || Self::scan_directory_sync(&dir, &config, &index))
            .await
            .context("Scan task panicked")?
    }

    /// Synchronous directory scanning implementation.
    pub fn scan_directory_sync(
        dir: &Path,
        config: &ScanConfig,
        index: &MediaIndex,
    ) -> Result<ScanResult> {
        info!("Starting scan of {:?}", dir);
        let _batch = index.notifier().batch();

        let known = index.file_map()?;
        debug!("Loaded {} indexed files", known.len());

        let discovered = Self::discover_files(dir, config)?;
        info!("Discovered {} image files", discovered.len());

        let mut result = ScanResult {
            total_files: discovered.len(),
            ..Default::default()
        };
        let mut batch = Vec::with_capacity(config.batch_size);
        let mut seen = HashSet::with_capacity(discovered.len());

        for entry in discovered {
            seen.insert(entry.path.clone());

            if Self::is_unchanged(&entry, &known) {
                trace!("Unchanged {:?}", entry.path);
                result.unchanged_items += 1;
                continue;
            }

            match Self::process_entry(&entry) {
                Some(image) => {
                    batch.push(image);
                    result.new_items += 1;
                    if batch.len() >= config.batch_size {
                        index.upsert_batch(&batch)?;
                        batch.clear();
                    }
                }
                None => result.error_count += 1,
            }
        }

        if !batch.is_empty() {
            index.upsert_batch(&batch)?;
        }

        let vanished: Vec<PathBuf> = known
            .into_keys()
            .filter(|path| path.starts_with(dir) && !seen.contains(path))
            .collect();
        result.removed_items = index.delete_paths(&vanished)?;

        info!(
            "Scan complete: {} total, {} new, {} unchanged, {} removed, {} errors",
            result.total_files,
            result.new_items,
            result.unchanged_items,
            result.removed_items,
            result.error_count
        );

        Ok(result)
    }

    fn is_unchanged(entry: &DiscoveredEntry, known: &HashMap<PathBuf, (i64, i64)>) -> bool {
        known
            .get(&entry.path)
            .is_some_and(|&(mtime, size)| mtime == entry.mtime && size == entry.size)
    }

    /// Discovers all image files in a directory, sorted by path.
    fn discover_files(dir: &Path, config: &ScanConfig) -> Result<Vec<DiscoveredEntry>> {
        let mut walker = WalkDir::new(dir).follow_links(config.follow_symlinks);

        if !config.recursive {
            walker = walker.max_depth(1);
        } else if config.max_depth > 0 {
            walker = walker.max_depth(config.max_depth);
        }

        let mut entries = Vec::new();

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            if !metadata::is_supported_image(path) {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to read metadata for {:?}: {}", path, e);
                    continue;
                }
            };

            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            entries.push(DiscoveredEntry {
                path: path.to_path_buf(),
                mtime,
                size: meta.len() as i64,
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(entries)
    }

    /// Reads the header of a new or changed file into an index row.
    fn process_entry(entry: &DiscoveredEntry) -> Option<NewImage> {
        let (width, height) = metadata::read_dimensions(&entry.path);
        if width == ERROR_DIMENSION || height == ERROR_DIMENSION {
            return None;
        }

        let display_name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // The file's mtime doubles as its "date added" for recency ordering.
        Some(
            NewImage::new(display_name, width, height, entry.mtime).with_file(
                entry.path.clone(),
                entry.mtime,
                entry.size,
            ),
        )
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}
