//! Offline support for ShoreSquad
//!
//! A cache-first gateway over a generation-tagged response store: install
//! seeds the current version's bucket, activate deletes every other version,
//! and same-origin GETs are answered from the bucket before the network.
//! Contact forms submitted offline wait in an outbox until the next sync.

pub mod gateway;
pub mod network;
pub mod outbox;
pub mod request;
pub mod store;

pub use gateway::{ControlMessage, Gateway, GatewayConfig, GatewayError, Interception, WorkerState};
pub use network::{FetchError, Fetcher, HttpFetcher};
pub use outbox::{ContactOutbox, ContactSubmission, FieldError, OutboxError, OutboxSync, SyncReport};
pub use request::{CachedResponse, Request, RequestMode};
pub use store::{retain_only, CacheBucket, CacheStore, MemoryStore, SqliteStore};
