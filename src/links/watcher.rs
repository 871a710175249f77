//! Change detection for loaded link files
//!
//! Each watched file gets a small polling task that compares the file's
//! modification time and length on every tick and emits a [`FileEvent`]
//! when either changes. Events from all watchers go through one channel,
//! drained by a single reload task, so reloads are applied one at a time
//! in the order they were observed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use super::loader::LinkLoader;

/// Modification time and length of a file, compared between polls.
pub type FileStamp = (SystemTime, u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Changed(PathBuf),
}

/// A running watch on one file. The polling task stops when the watcher is
/// closed or dropped.
#[derive(Debug)]
pub struct FileWatcher {
    handle: JoinHandle<()>,
}

impl FileWatcher {
    /// Start polling `path`. `initial` is the stamp taken before the file was
    /// last read; any difference from it is reported as a change.
    pub fn spawn(
        path: PathBuf,
        initial: Option<FileStamp>,
        interval: Duration,
        events: mpsc::Sender<FileEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let watched = path;
            let mut last = initial;
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let current = file_stamp(&watched).await;
                if current.is_none() || current == last {
                    continue;
                }
                last = current;

                if events.send(FileEvent::Changed(watched.clone())).await.is_err() {
                    debug!(path = %watched.display(), "Reload channel closed, stopping watcher");
                    break;
                }
            }
        });

        Self { handle }
    }

    pub fn close(self) {
        drop(self);
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn file_stamp(path: &Path) -> Option<FileStamp> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    Some((metadata.modified().ok()?, metadata.len()))
}

/// Apply file change events to the index until the channel closes.
pub fn spawn_reload_task(
    loader: Arc<LinkLoader>,
    mut events: mpsc::Receiver<FileEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(FileEvent::Changed(path)) = events.recv().await {
            let source = LinkLoader::source_name(&path);
            info!(source = %source, "Reloading link file");

            match loader.load_file(&path).await {
                Ok(count) => info!(source = %source, links = count, "Link file reloaded"),
                Err(e) => {
                    warn!(source = %source, error = %e, "Failed to reload link file, keeping previous links")
                }
            }
        }
    })
}
