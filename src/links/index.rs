use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::models::Link;

/// In-memory link index keyed by `<source>-<id>` (or the bare source for a
/// source's own entry).
///
/// Links are stored behind `Arc` and only ever replaced whole, so a reader
/// racing a reload sees either the old or the new link.
#[derive(Debug, Default)]
pub struct LinkIndex {
    links: DashMap<String, Arc<Link>>,
    /// Known sources in the order they were first loaded
    sources: RwLock<Vec<String>>,
}

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Link>> {
        self.links.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Insert or replace a link, returning the key it was stored under.
    pub fn insert(&self, link: Link) -> String {
        let key = link.index_key();
        self.links.insert(key.clone(), Arc::new(link));
        key
    }

    pub fn register_source(&self, source: &str) {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }

    pub fn sources(&self) -> Vec<String> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop every link and known source, returning how many links were removed.
    pub fn clear(&self) -> usize {
        let count = self.links.len();
        self.links.clear();
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        count
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.links.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Point-in-time copy of the whole index, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Link> {
        self.links
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().as_ref().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
