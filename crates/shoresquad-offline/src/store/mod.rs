//! Versioned response storage.
//!
//! A store holds named buckets, one per cache version. Each bucket maps a
//! request URL to the response captured for it. The gateway only ever reads
//! and writes the bucket named by the current version; older buckets are
//! removed wholesale on activation.
//!
//! The store also records which version is active. A gateway whose version
//! is no longer active has been superseded and stops serving.
//!
//! Bucket handles outlive deletion of their bucket. Writes through such a
//! handle fail with [`CacheError::Unavailable`] and reads find nothing, so a
//! deleted version is never resurrected.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use shoresquad_core::CacheError;
use url::Url;

use crate::request::CachedResponse;

/// One named cache version.
pub trait CacheBucket: Send + Sync {
    fn version(&self) -> &str;

    fn lookup(&self, url: &Url) -> Result<Option<CachedResponse>, CacheError>;

    /// Insert or replace the entry for `url`. Fails once the bucket has been
    /// deleted.
    fn put(&self, url: &Url, response: &CachedResponse) -> Result<(), CacheError>;

    /// Store every entry or none of them
    fn put_all(&self, entries: &[(Url, CachedResponse)]) -> Result<(), CacheError>;

    /// Stored request URLs
    fn keys(&self) -> Result<Vec<String>, CacheError>;
}

/// A collection of buckets keyed by version name.
pub trait CacheStore: Send + Sync {
    type Bucket: CacheBucket;

    /// Open the bucket for `version`, creating it if needed
    fn open(&self, version: &str) -> Result<Self::Bucket, CacheError>;

    /// The bucket for `version` if it exists. Never creates one.
    fn get(&self, version: &str) -> Result<Option<Self::Bucket>, CacheError>;

    fn list_versions(&self) -> Result<Vec<String>, CacheError>;

    /// Remove a bucket and everything in it. Returns whether it existed.
    fn delete(&self, version: &str) -> Result<bool, CacheError>;

    /// Mark `version` as the one serving clients
    fn set_active(&self, version: &str) -> Result<(), CacheError>;

    /// The active version. Cleared when that version's bucket is deleted.
    fn active(&self) -> Result<Option<String>, CacheError>;
}

pub(crate) fn deleted(version: &str) -> CacheError {
    CacheError::Unavailable(format!("cache {} was deleted", version))
}

/// Delete every bucket except `current`, returning the removed names.
pub fn retain_only<S: CacheStore + ?Sized>(
    store: &S,
    current: &str,
) -> Result<Vec<String>, CacheError> {
    let mut removed = Vec::new();
    for version in store.list_versions()? {
        if version == current {
            continue;
        }
        if store.delete(&version)? {
            tracing::info!("Deleting old cache: {}", version);
            removed.push(version);
        }
    }
    Ok(removed)
}
