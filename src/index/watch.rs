use std::path::{Path, PathBuf};

use flume::Sender;
use notify::{
    event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Result as NotifyResult, Watcher,
};
use tracing::{trace, warn};

use crate::index::metadata::is_supported_image;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileAction {
    Add,
    Remove,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEvent {
    pub action: FileAction,
    pub path: PathBuf,
}

/// Forwards image file changes under the watched directories to a channel.
///
/// The host drains the channel, waits for the burst to settle, then rescans.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    pub fn start(dirs: &[PathBuf], tx: Sender<FileEvent>) -> NotifyResult<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => handle_event(event, &tx),
            Err(e) => warn!(error = %e, "Directory watch error"),
        })?;

        watcher.configure(Config::default())?;

        for d in dirs {
            watcher.watch(d, RecursiveMode::Recursive)?;
        }
        Ok(Self { _watcher: watcher })
    }
}

fn handle_event(event: Event, tx: &Sender<FileEvent>) {
    for file_event in classify(event) {
        trace!(?file_event, "File change");
        let _ = tx.send(file_event);
    }
}

fn classify(event: Event) -> Vec<FileEvent> {
    use FileAction::*;

    let action = match &event.kind {
        EventKind::Create(CreateKind::File) => Add,
        // Rename: From (old path) -> Remove, To (new path) -> Add
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Remove,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Add,
        // Content changed (editors often write then replace)
        EventKind::Modify(ModifyKind::Data(_)) => Add,
        EventKind::Remove(RemoveKind::File) => Remove,
        _ => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .filter(|p| action == Remove || is_candidate_add(p))
        .map(|path| FileEvent { action, path })
        .collect()
}

fn is_candidate_add(p: &Path) -> bool {
    std::fs::metadata(p).map(|m| m.is_file()).unwrap_or(false) && is_supported_image(p)
}
