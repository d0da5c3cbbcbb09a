//! File watcher for a JSONL collection. Re-reads the source when it changes.
//!
//! The caller gets a fresh collection and builds a new index from it; a live
//! index is never updated in place.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use notify_debouncer_mini::notify;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tracing::warn;

use crate::collection::{CollectionError, JsonlCollection};

/// Watches `root` (a `.jsonl` file or a directory of them) and calls
/// `on_change` with the re-read collection whenever it changes (debounced).
/// Blocks until the watcher is stopped (e.g. Ctrl+C). Returns Err on setup failure.
pub fn watch_collection(
    root: &Path,
    on_change: impl Fn(Result<JsonlCollection, CollectionError>) + Send + 'static,
) -> Result<(), WatchError> {
    if !root.exists() {
        return Err(WatchError::NotFound(root.to_path_buf()));
    }
    let root = root.canonicalize().map_err(WatchError::Canonicalize)?;
    // A single file is watched through its directory so atomic replaces are seen.
    let (watched, mode) = match root.parent() {
        Some(parent) if root.is_file() => (parent.to_path_buf(), notify::RecursiveMode::NonRecursive),
        _ => (root.clone(), notify::RecursiveMode::Recursive),
    };
    let single_file = root.is_file();
    let root_for_callback = root.clone();

    let debounce = Duration::from_millis(400);
    let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
        Ok(events) => {
            if touches_source(events.iter().map(|e| e.path.as_path()), &root_for_callback, single_file) {
                on_change(JsonlCollection::open(&root_for_callback));
            }
        }
        Err(e) => warn!("watcher error: {}", e),
    })
    .map_err(|e| WatchError::Notify(e.to_string()))?;

    debouncer
        .watcher()
        .watch(&watched, mode)
        .map_err(|e| WatchError::Watch(e.to_string()))?;

    let (_tx, rx) = mpsc::channel::<()>();
    rx.recv().ok();
    Ok(())
}

/// Whether any changed path belongs to the source. A directory source takes
/// every event under it; a file source only events for that file.
fn touches_source<'a>(changed: impl IntoIterator<Item = &'a Path>, root: &Path, single_file: bool) -> bool {
    changed
        .into_iter()
        .any(|p| if single_file { p == root } else { p.starts_with(root) })
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("not found: {0}")]
    NotFound(std::path::PathBuf),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("watcher init: {0}")]
    Notify(String),
    #[error("watch failed: {0}")]
    Watch(String),
}
