//! SQLite-backed photo index.
//!
//! `MediaIndex` stands in for the platform media catalog: it hands out stable
//! ids and `content://` location references, answers recency-ordered paged
//! queries through [`MediaSource`], and tells registered observers about every
//! committed mutation batch through its [`ChangeNotifier`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::models::{ItemId, MediaUri};
use crate::source::{MediaQuery, MediaRow, MediaSource, SortOrder};
use crate::watcher::ChangeNotifier;

/// A row to be written into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    /// Backing file, if any. Upserts are keyed on it.
    pub path: Option<PathBuf>,
    pub display_name: String,
    pub width: u32,
    pub height: u32,
    /// Unix seconds; drives the recency ordering.
    pub date_added: i64,
    pub mtime: i64,
    pub size: i64,
}

impl NewImage {
    pub fn new(display_name: impl Into<String>, width: u32, height: u32, date_added: i64) -> Self {
        Self {
            path: None,
            display_name: display_name.into(),
            width,
            height,
            date_added,
            mtime: 0,
            size: 0,
        }
    }

    pub fn with_file(mut self, path: PathBuf, mtime: i64, size: i64) -> Self {
        self.path = Some(path);
        self.mtime = mtime;
        self.size = size;
        self
    }
}

/// SQLite-backed photo index.
///
/// The connection sits behind a mutex so the index can be shared with the
/// store's loader threads.
pub struct MediaIndex {
    conn: Mutex<Connection>,
    notifier: ChangeNotifier,
    read_granted: AtomicBool,
}

impl MediaIndex {
    /// Opens or creates the index at `XDG_DATA_HOME/gallery-strip/index.sqlite`.
    pub fn open_default() -> Result<Self> {
        let db_path = Self::default_db_path()?;
        Self::open(&db_path)
    }

    /// Returns the default database path based on XDG directories.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "gallery-strip")
            .context("Failed to determine project directories")?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        Ok(data_dir.join("index.sqlite"))
    }

    /// Opens or creates the index at the specified path.
    ///
    /// Configures SQLite for optimal performance:
    /// - journal_mode = WAL (write-ahead logging for concurrent access)
    /// - synchronous = NORMAL (balance between safety and speed)
    /// - temp_store = MEMORY (keep temp tables in RAM)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA cache_size = -16000;
            ",
        )
        .context("Failed to configure SQLite pragmas")?;

        let index = Self::with_connection(conn)?;
        info!("Opened media index at {:?}", path);
        Ok(index)
    }

    /// Opens a throwaway index that lives only as long as the value.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        Self::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            notifier: ChangeNotifier::new(),
            read_granted: AtomicBool::new(true),
        })
    }

    fn create_tables(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT UNIQUE,
                display_name TEXT NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                date_added INTEGER NOT NULL,
                mtime INTEGER NOT NULL DEFAULT 0,
                size INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_images_recency
                ON images(date_added DESC, id DESC);
            ",
        )
        .context("Failed to create database tables")?;

        debug!("Database tables created/verified");
        Ok(())
    }

    /// Observers registered here hear about every committed mutation batch.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Gates read access; while revoked, queries fail with `PermissionDenied`.
    pub fn set_read_granted(&self, granted: bool) {
        self.read_granted.store(granted, Ordering::SeqCst);
        debug!(granted, "Media index read access updated");
    }

    pub fn is_read_granted(&self) -> bool {
        self.read_granted.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Inserts a single image and returns its id.
    pub fn insert(&self, image: &NewImage) -> Result<ItemId> {
        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "
                INSERT INTO images (path, display_name, width, height, date_added, mtime, size)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
                params![
                    image.path.as_ref().map(|p| p.to_string_lossy().to_string()),
                    image.display_name,
                    image.width,
                    image.height,
                    image.date_added,
                    image.mtime,
                    image.size,
                ],
            )
            .context("Failed to insert image")?;
            conn.last_insert_rowid()
        };

        self.notifier.notify_changed();
        Ok(id)
    }

    /// Inserts or updates many file-backed images in one transaction.
    ///
    /// Rows are keyed on `path`, so an existing file keeps its id. Observers
    /// are notified once for the whole batch.
    pub fn upsert_batch(&self, images: &[NewImage]) -> Result<usize> {
        if images.is_empty() {
            return Ok(0);
        }

        let count = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let count = Self::upsert_batch_in_tx(&tx, images)?;
            tx.commit()?;
            count
        };

        debug!("Batch upserted {} images", count);
        self.notifier.notify_changed();
        Ok(count)
    }

    fn upsert_batch_in_tx(tx: &Transaction, images: &[NewImage]) -> Result<usize> {
        let mut stmt = tx.prepare_cached(
            "
            INSERT INTO images (path, display_name, width, height, date_added, mtime, size)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(path) DO UPDATE SET
                display_name = excluded.display_name,
                width = excluded.width,
                height = excluded.height,
                date_added = excluded.date_added,
                mtime = excluded.mtime,
                size = excluded.size
            ",
        )?;

        let mut count = 0;
        for image in images {
            stmt.execute(params![
                image.path.as_ref().map(|p| p.to_string_lossy().to_string()),
                image.display_name,
                image.width,
                image.height,
                image.date_added,
                image.mtime,
                image.size,
            ])?;
            count += 1;
        }

        Ok(count)
    }

    /// Deletes one image by id.
    pub fn delete(&self, id: ItemId) -> Result<bool> {
        let rows = self
            .conn
            .lock()
            .execute("DELETE FROM images WHERE id = ?1", params![id])
            .context("Failed to delete image")?;

        if rows > 0 {
            self.notifier.notify_changed();
        }
        Ok(rows > 0)
    }

    /// Deletes every image backed by one of `paths`.
    pub fn delete_paths(&self, paths: &[PathBuf]) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }

        let deleted = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let mut deleted = 0;
            {
                let mut stmt = tx.prepare_cached("DELETE FROM images WHERE path = ?1")?;
                for path in paths {
                    deleted += stmt.execute(params![path.to_string_lossy().as_ref()])?;
                }
            }
            tx.commit()?;
            deleted
        };

        if deleted > 0 {
            info!("Deleted {} images from the index", deleted);
            self.notifier.notify_changed();
        }
        Ok(deleted)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Returns the total number of images in the index.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Gets file-backed entries as a map from path to (mtime, size).
    ///
    /// The scanner compares these with the filesystem to decide which files
    /// need their headers read again.
    pub fn file_map(&self) -> Result<HashMap<PathBuf, (i64, i64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT path, mtime, size FROM images WHERE path IS NOT NULL")?;

        let map = stmt
            .query_map([], |row| {
                Ok((
                    PathBuf::from(row.get::<_, String>(0)?),
                    (row.get(1)?, row.get(2)?),
                ))
            })?
            .collect::<Result<HashMap<_, _>, _>>()
            .context("Failed to read file entries")?;

        Ok(map)
    }

    /// Resolves a location reference back to its backing file.
    pub fn resolve(&self, uri: &MediaUri) -> Result<Option<PathBuf>> {
        let Some(id) = uri.id() else {
            warn!(%uri, "Location reference is not from this index");
            return Ok(None);
        };

        let path: Option<Option<String>> = self
            .conn
            .lock()
            .query_row(
                "SELECT path FROM images WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to resolve location reference")?;

        Ok(path.flatten().map(PathBuf::from))
    }
}

impl MediaSource for MediaIndex {
    fn query(&self, query: &MediaQuery) -> Result<Vec<MediaRow>, LoadError> {
        if !self.is_read_granted() {
            return Err(LoadError::PermissionDenied(
                "read access to the media index has not been granted".to_string(),
            ));
        }

        let order_by = match query.sort {
            SortOrder::RecencyDesc => "date_added DESC, id DESC",
        };
        let sql = format!(
            "SELECT id, display_name, width, height FROM images ORDER BY {order_by} LIMIT ?1 OFFSET ?2"
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![query.limit as i64, query.offset as i64], |row| {
                let id: ItemId = row.get(0)?;
                Ok(MediaRow {
                    id,
                    name: row.get(1)?,
                    width: row.get(2)?,
                    height: row.get(3)?,
                    location: MediaUri::for_id(id),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
