use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use shoresquad_core::CacheError;
use url::Url;

use super::{deleted, CacheBucket, CacheStore};
use crate::request::CachedResponse;

type Entries = Arc<Mutex<HashMap<String, CachedResponse>>>;
type Buckets = Arc<Mutex<BTreeMap<String, Entries>>>;

/// Process-local store, used in tests and when no database path is set.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buckets: Buckets,
    active: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Handle to one version. Only live while the store still maps the version
/// to this handle's entries.
#[derive(Debug, Clone)]
pub struct MemoryBucket {
    version: String,
    entries: Entries,
    buckets: Buckets,
}

impl MemoryBucket {
    /// Run `f` on the entries if this bucket is still in the store.
    /// The store lock is held throughout so a delete cannot interleave.
    fn with_live<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, CachedResponse>) -> T,
    ) -> Option<T> {
        let buckets = self.buckets.lock();
        match buckets.get(&self.version) {
            Some(current) if Arc::ptr_eq(current, &self.entries) => {
                Some(f(&mut self.entries.lock()))
            }
            _ => None,
        }
    }
}

impl CacheStore for MemoryStore {
    type Bucket = MemoryBucket;

    fn open(&self, version: &str) -> Result<MemoryBucket, CacheError> {
        let entries = self
            .buckets
            .lock()
            .entry(version.to_string())
            .or_default()
            .clone();
        Ok(MemoryBucket {
            version: version.to_string(),
            entries,
            buckets: Arc::clone(&self.buckets),
        })
    }

    fn get(&self, version: &str) -> Result<Option<MemoryBucket>, CacheError> {
        Ok(self.buckets.lock().get(version).map(|entries| MemoryBucket {
            version: version.to_string(),
            entries: Arc::clone(entries),
            buckets: Arc::clone(&self.buckets),
        }))
    }

    fn list_versions(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.buckets.lock().keys().cloned().collect())
    }

    fn delete(&self, version: &str) -> Result<bool, CacheError> {
        let removed = self.buckets.lock().remove(version).is_some();
        let mut active = self.active.lock();
        if active.as_deref() == Some(version) {
            *active = None;
        }
        Ok(removed)
    }

    fn set_active(&self, version: &str) -> Result<(), CacheError> {
        *self.active.lock() = Some(version.to_string());
        Ok(())
    }

    fn active(&self) -> Result<Option<String>, CacheError> {
        Ok(self.active.lock().clone())
    }
}

impl CacheBucket for MemoryBucket {
    fn version(&self) -> &str {
        &self.version
    }

    fn lookup(&self, url: &Url) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self
            .with_live(|map| map.get(url.as_str()).cloned())
            .flatten())
    }

    fn put(&self, url: &Url, response: &CachedResponse) -> Result<(), CacheError> {
        self.with_live(|map| {
            map.insert(url.to_string(), response.clone());
        })
        .ok_or_else(|| deleted(&self.version))
    }

    fn put_all(&self, entries: &[(Url, CachedResponse)]) -> Result<(), CacheError> {
        self.with_live(|map| {
            for (url, response) in entries {
                map.insert(url.to_string(), response.clone());
            }
        })
        .ok_or_else(|| deleted(&self.version))
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .with_live(|map| map.keys().cloned().collect())
            .unwrap_or_default())
    }
}
