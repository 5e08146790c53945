// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named response caches shared by every page of the origin.

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::message::Response;

/// Storage of named caches, each mapping URL to response.
///
/// Writes overwrite by URL, so repeated or concurrent puts of the same URL
/// only redo work.
pub trait CacheStorage: Send + Sync + 'static {
    /// Cache names in creation order.
    fn keys(&self) -> Vec<String>;

    /// Create the cache if it does not exist yet.
    fn open(&self, name: &str);

    /// Returns `true` if a cache was removed.
    fn delete(&self, name: &str) -> bool;

    /// Store `response` under `url`, creating the cache if needed.
    fn put(&self, name: &str, url: &str, response: Response);

    /// Store several entries.
    fn put_all(&self, name: &str, entries: Vec<(String, Response)>) {
        for (url, response) in entries {
            self.put(name, &url, response);
        }
    }

    /// Look `url` up in one cache.
    fn lookup(&self, name: &str, url: &str) -> Option<Response>;

    /// Look `url` up across all caches, oldest cache first.
    fn lookup_any(&self, url: &str) -> Option<Response>;

    /// URLs stored in one cache, in insertion order.
    fn urls(&self, name: &str) -> Vec<String>;
}

/// Process-local [`CacheStorage`].
#[derive(Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<IndexMap<String, IndexMap<String, Response>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn keys(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    fn open(&self, name: &str) {
        self.caches.write().entry(name.to_owned()).or_default();
    }

    fn delete(&self, name: &str) -> bool {
        self.caches.write().shift_remove(name).is_some()
    }

    fn put(&self, name: &str, url: &str, response: Response) {
        self.caches.write().entry(name.to_owned()).or_default().insert(url.to_owned(), response);
    }

    fn put_all(&self, name: &str, entries: Vec<(String, Response)>) {
        let mut caches = self.caches.write();
        let cache = caches.entry(name.to_owned()).or_default();
        cache.extend(entries);
    }

    fn lookup(&self, name: &str, url: &str) -> Option<Response> {
        self.caches.read().get(name).and_then(|c| c.get(url)).cloned()
    }

    fn lookup_any(&self, url: &str) -> Option<Response> {
        self.caches.read().values().find_map(|c| c.get(url)).cloned()
    }

    fn urls(&self, name: &str) -> Vec<String> {
        self.caches.read().get(name).map(|c| c.keys().cloned().collect()).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
