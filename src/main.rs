use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::UserDirs;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use gallery_strip::index::{DirectoryWatcher, FileScanner, MediaIndex};
use gallery_strip::store::GalleryStatus;
use gallery_strip::{GalleryConfig, GallerySession, MediaSource};

/// Quiet period after the last file event before rescanning.
const RESCAN_DEBOUNCE: Duration = Duration::from_millis(500);

/// Strip length used to report the centered item.
const VIEWPORT_LENGTH: f32 = 360.0;

fn photo_dir() -> Result<PathBuf> {
    let dir = match std::env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => UserDirs::new()
            .and_then(|dirs| dirs.picture_dir().map(Path::to_path_buf))
            .context("No directory given and no pictures directory found")?,
    };
    dir.canonicalize()
        .with_context(|| format!("Cannot access {}", dir.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gallery_strip=info".parse()?))
        .init();

    let dir = photo_dir()?;
    let db_path = MediaIndex::default_db_path()?;
    let index = Arc::new(MediaIndex::open(&db_path)?);
    info!("Using index {:?} for {:?}", db_path, dir);

    let scanner = FileScanner::new();
    let result = scanner.scan_directory(&dir, Arc::clone(&index)).await?;
    info!(
        total = result.total_files,
        new = result.new_items,
        removed = result.removed_items,
        errors = result.error_count,
        "Initial scan complete"
    );

    let session = GallerySession::new(
        Arc::clone(&index) as Arc<dyn MediaSource>,
        index.notifier(),
        GalleryConfig::default(),
    );
    let snapshots = session.subscribe();
    session.set_read_permission(true);

    let (event_tx, event_rx) = flume::unbounded();
    let _watcher = DirectoryWatcher::start(std::slice::from_ref(&dir), event_tx)
        .context("Failed to watch photo directory")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("Failed to listen for Ctrl-C")?;
                info!("Shutting down");
                break;
            }
            Ok(snapshot) = snapshots.recv_async() => {
                match snapshot.status() {
                    GalleryStatus::Error { op, error } => {
                        warn!(?op, error = %error, "Load failed");
                    }
                    status => info!(
                        ?status,
                        pages = snapshot.pages.len(),
                        items = snapshot.len(),
                        "Gallery updated"
                    ),
                }
                if let Some(item) = session.on_viewport_changed(0.0, VIEWPORT_LENGTH) {
                    info!(id = item.id, name = %item.name, uri = %item.location, "Centered item");
                }
            }
            Ok(event) = event_rx.recv_async() => {
                debug!(?event, "File change");
                tokio::time::sleep(RESCAN_DEBOUNCE).await;
                let burst = event_rx.drain().count() + 1;
                debug!(burst, "Rescanning after file changes");
                match scanner.scan_directory(&dir, Arc::clone(&index)).await {
                    Ok(result) => info!(
                        new = result.new_items,
                        removed = result.removed_items,
                        "Rescan complete"
                    ),
                    Err(e) => warn!("Rescan failed: {:#}", e),
                }
            }
        }
    }

    session.store().shutdown();
    Ok(())
}
