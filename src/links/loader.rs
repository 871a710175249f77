use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::aliases::LinkAliases;
use super::index::LinkIndex;
use super::watcher::{file_stamp, spawn_reload_task, FileEvent, FileStamp, FileWatcher};
use crate::config::{FileEncoding, LinksConfig};
use crate::models::{Link, LinkDefinition};

const RELOAD_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid {encoding:?} text", .path.display())]
    Encoding {
        path: PathBuf,
        encoding: FileEncoding,
    },
    #[error("invalid link definitions in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of a directory load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Links dropped by a reset before loading
    pub removed: usize,
    pub files: usize,
    pub links: usize,
    pub failed: Vec<PathBuf>,
}

/// Loads link definition files into the shared [`LinkIndex`] and keeps them
/// fresh when hot reload is enabled.
pub struct LinkLoader {
    index: Arc<LinkIndex>,
    aliases: Arc<LinkAliases>,
    config: LinksConfig,
    watchers: Mutex<HashMap<PathBuf, FileWatcher>>,
    events: Option<mpsc::Sender<FileEvent>>,
    pending_events: StdMutex<Option<mpsc::Receiver<FileEvent>>>,
}

impl LinkLoader {
    pub fn new(index: Arc<LinkIndex>, aliases: Arc<LinkAliases>, config: LinksConfig) -> Self {
        let (events, pending_events) = if config.auto_reload {
            let (tx, rx) = mpsc::channel(RELOAD_CHANNEL_CAPACITY);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        Self {
            index,
            aliases,
            config,
            watchers: Mutex::new(HashMap::new()),
            events,
            pending_events: StdMutex::new(pending_events),
        }
    }

    pub fn index(&self) -> &Arc<LinkIndex> {
        &self.index
    }

    /// Start the task applying file change events. Returns `None` when hot
    /// reload is disabled or the task was already started.
    pub fn spawn_reloader(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let events = self
            .pending_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        Some(spawn_reload_task(Arc::clone(self), events))
    }

    /// Load every `*.json` file under the links directory.
    ///
    /// With `reset`, all watchers are closed and the index is emptied first.
    /// A file that fails to load is logged and skipped.
    pub async fn load(&self, reset: bool) -> LoadReport {
        let mut report = LoadReport::default();
        let directory = self.config.path.as_path();

        if !tokio::fs::try_exists(directory).await.unwrap_or(false) {
            warn!(directory = %directory.display(), "Links directory not found, no links were loaded");
            return report;
        }

        let files = match list_link_files(directory).await {
            Ok(files) => files,
            Err(e) => {
                error!(directory = %directory.display(), error = %e, "Failed to list links directory");
                return report;
            }
        };

        if reset {
            report.removed = self.reset().await;
        }

        debug!("Will load {} file(s)", files.len());

        for path in files {
            // Stamped before reading so a write racing the load is still seen
            let stamp = match &self.events {
                Some(_) => file_stamp(&path).await,
                None => None,
            };

            match self.load_file(&path).await {
                Ok(count) => {
                    report.files += 1;
                    report.links += count;
                    if let Some(events) = &self.events {
                        self.watch(path, stamp, events.clone()).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load link file");
                    report.failed.push(path);
                }
            }
        }

        if !self.aliases.is_empty() {
            info!(
                "{} link aliases ({} plurals)",
                self.aliases.len(),
                if self.aliases.has_plurals() { "with" } else { "no" }
            );
        }

        info!(
            files = report.files,
            links = report.links,
            failed = report.failed.len(),
            "Links loaded"
        );
        report
    }

    /// Parse one link file and upsert its entries, returning how many links it defined.
    pub async fn load_file(&self, path: &Path) -> Result<usize, LoadError> {
        let source = Self::source_name(path);
        let bytes = tokio::fs::read(path).await.map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let text = decode(bytes, self.config.encoding).ok_or_else(|| LoadError::Encoding {
            path: path.to_path_buf(),
            encoding: self.config.encoding,
        })?;
        let links = parse_links(&source, &text, self.config.wildcard()).map_err(|e| {
            LoadError::Json {
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        self.index.register_source(&source);

        let count = links.len();
        for link in links {
            debug!(
                id = %link.id,
                source = %link.source,
                "{} links for countries {}",
                link.url_count(),
                link.urls.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
            );
            self.index.insert(link);
        }

        Ok(count)
    }

    /// Close all watchers and empty the index, returning the number of removed links.
    pub async fn reset(&self) -> usize {
        let closed = self.close_watchers().await;
        let count = self.index.clear();
        info!(watchers = closed, "Reset, cleared {count} links");
        count
    }

    /// Stop watching every file, returning how many watchers were closed.
    pub async fn close_watchers(&self) -> usize {
        let mut watchers = self.watchers.lock().await;
        let count = watchers.len();
        for (_, watcher) in watchers.drain() {
            watcher.close();
        }
        count
    }

    pub async fn watcher_count(&self) -> usize {
        self.watchers.lock().await.len()
    }

    async fn watch(&self, path: PathBuf, stamp: Option<FileStamp>, events: mpsc::Sender<FileEvent>) {
        let mut watchers = self.watchers.lock().await;
        if watchers.contains_key(&path) {
            return;
        }

        let interval = Duration::from_millis(self.config.reload_interval_ms);
        let watcher = FileWatcher::spawn(path.clone(), stamp, interval, events);
        watchers.insert(path, watcher);
    }

    /// Source name for a link file: its lowercased file stem.
    pub fn source_name(path: &Path) -> String {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

async fn list_link_files(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(directory).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    // Sorted so that key collisions resolve the same way on every load.
    files.sort();
    Ok(files)
}

fn decode(bytes: Vec<u8>, encoding: FileEncoding) -> Option<String> {
    match encoding {
        FileEncoding::Utf8 => {
            let text = String::from_utf8(bytes).ok()?;
            Some(match text.strip_prefix('\u{feff}') {
                Some(stripped) => stripped.to_string(),
                None => text,
            })
        }
        FileEncoding::Latin1 => Some(bytes.into_iter().map(char::from).collect()),
    }
}

/// Parse the contents of one link file into links of `source`.
///
/// The file must be a JSON object. Entries with an unsupported shape or no
/// URLs at all are skipped with a warning.
pub fn parse_links(source: &str, text: &str, wildcard: &str) -> Result<Vec<Link>, serde_json::Error> {
    let entries: Map<String, Value> = serde_json::from_str(text)?;
    let mut links = Vec::with_capacity(entries.len());

    for (id, value) in entries {
        let id = id.to_lowercase();

        let definition: LinkDefinition = match serde_json::from_value(value) {
            Ok(definition) => definition,
            Err(e) => {
                warn!(source = %source, id = %id, error = %e, "Skipping invalid link definition");
                continue;
            }
        };

        let urls = definition.into_urls(wildcard);
        if urls.is_empty() {
            warn!(source = %source, id = %id, "Skipping link without URLs");
            continue;
        }

        links.push(Link {
            id,
            source: source.to_string(),
            urls,
        });
    }

    Ok(links)
}
