//! SQLite-backed cache store.
//!
//! Buckets and their entries live in two tables, and the active version in
//! a key/value `cache_meta` table. Entries hang off the bucket's row id, so
//! a bucket recreated under an old name starts empty and handles to the old
//! one stay dead. Headers are stored as a JSON array of name/value pairs
//! next to the raw body.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use shoresquad_core::{CacheError, RusqliteErrorExt};
use url::Url;

use super::{deleted, CacheBucket, CacheStore};
use crate::request::CachedResponse;

const ACTIVE_KEY: &str = "active";

fn storage(e: rusqlite::Error) -> CacheError {
    e.into_cache_error()
}

fn bucket_id(conn: &Connection, version: &str) -> Result<Option<i64>, CacheError> {
    conn.query_row(
        "SELECT id FROM cache_buckets WHERE version = ?1",
        params![version],
        |row| row.get(0),
    )
    .optional()
    .map_err(storage)
}

fn bucket_exists(conn: &Connection, id: i64) -> Result<bool, CacheError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cache_buckets WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )
    .map_err(storage)
}

/// Persistent store shared between clones through one connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the cache database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_buckets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                version TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cache_entries (
                bucket_id INTEGER NOT NULL REFERENCES cache_buckets(id),
                request_url TEXT NOT NULL,
                response_url TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL DEFAULT '[]',
                body BLOB NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (bucket_id, request_url)
            );

            CREATE TABLE IF NOT EXISTS cache_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(storage)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

pub struct SqliteBucket {
    conn: Arc<Mutex<Connection>>,
    id: i64,
    version: String,
}

impl CacheStore for SqliteStore {
    type Bucket = SqliteBucket;

    fn open(&self, version: &str) -> Result<SqliteBucket, CacheError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO cache_buckets (version, created_at) VALUES (?1, ?2)",
            params![version, Utc::now().to_rfc3339()],
        )
        .map_err(storage)?;
        let id = bucket_id(&conn, version)?.ok_or_else(|| deleted(version))?;

        Ok(SqliteBucket {
            conn: Arc::clone(&self.conn),
            id,
            version: version.to_string(),
        })
    }

    fn get(&self, version: &str) -> Result<Option<SqliteBucket>, CacheError> {
        let id = bucket_id(&self.conn.lock(), version)?;
        Ok(id.map(|id| SqliteBucket {
            conn: Arc::clone(&self.conn),
            id,
            version: version.to_string(),
        }))
    }

    fn list_versions(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT version FROM cache_buckets ORDER BY created_at, version")
            .map_err(storage)?;
        let versions = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        Ok(versions)
    }

    fn delete(&self, version: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(storage)?;
        tx.execute(
            "DELETE FROM cache_entries
             WHERE bucket_id IN (SELECT id FROM cache_buckets WHERE version = ?1)",
            params![version],
        )
        .map_err(storage)?;
        let removed = tx
            .execute("DELETE FROM cache_buckets WHERE version = ?1", params![version])
            .map_err(storage)?;
        tx.execute(
            "DELETE FROM cache_meta WHERE key = ?1 AND value = ?2",
            params![ACTIVE_KEY, version],
        )
        .map_err(storage)?;
        tx.commit().map_err(storage)?;
        Ok(removed > 0)
    }

    fn set_active(&self, version: &str) -> Result<(), CacheError> {
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO cache_meta (key, value) VALUES (?1, ?2)",
                params![ACTIVE_KEY, version],
            )
            .map_err(storage)?;
        Ok(())
    }

    fn active(&self) -> Result<Option<String>, CacheError> {
        self.conn
            .lock()
            .query_row(
                "SELECT value FROM cache_meta WHERE key = ?1",
                params![ACTIVE_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage)
    }
}

fn insert_entry(
    conn: &Connection,
    bucket_id: i64,
    url: &Url,
    response: &CachedResponse,
) -> Result<(), CacheError> {
    let headers = serde_json::to_string(&response.headers)
        .map_err(|e| CacheError::OperationFailed(e.to_string()))?;

    conn.execute(
        r#"
        INSERT OR REPLACE INTO cache_entries
            (bucket_id, request_url, response_url, status, headers, body, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            bucket_id,
            url.as_str(),
            response.url.as_str(),
            response.status,
            headers,
            response.body,
            Utc::now().to_rfc3339()
        ],
    )
    .map_err(storage)?;
    Ok(())
}

impl CacheBucket for SqliteBucket {
    fn version(&self) -> &str {
        &self.version
    }

    fn lookup(&self, url: &Url) -> Result<Option<CachedResponse>, CacheError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT response_url, status, headers, body
                 FROM cache_entries WHERE bucket_id = ?1 AND request_url = ?2",
            )
            .map_err(storage)?;

        let mut rows = stmt
            .query(params![self.id, url.as_str()])
            .map_err(storage)?;

        let Some(row) = rows.next().map_err(storage)? else {
            return Ok(None);
        };

        let response_url: String = row.get(0).map_err(storage)?;
        let status: u16 = row.get(1).map_err(storage)?;
        let headers: String = row.get(2).map_err(storage)?;
        let body: Vec<u8> = row.get(3).map_err(storage)?;

        let url = Url::parse(&response_url)
            .map_err(|e| CacheError::Corruption(format!("{}: {}", response_url, e)))?;
        let headers = serde_json::from_str(&headers)
            .map_err(|e| CacheError::Corruption(format!("headers for {}: {}", url, e)))?;

        Ok(Some(CachedResponse {
            url,
            status,
            headers,
            body,
        }))
    }

    fn put(&self, url: &Url, response: &CachedResponse) -> Result<(), CacheError> {
        let conn = self.conn.lock();
        if !bucket_exists(&conn, self.id)? {
            return Err(deleted(&self.version));
        }
        insert_entry(&conn, self.id, url, response)
    }

    fn put_all(&self, entries: &[(Url, CachedResponse)]) -> Result<(), CacheError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(storage)?;
        if !bucket_exists(&tx, self.id)? {
            return Err(deleted(&self.version));
        }
        for (url, response) in entries {
            insert_entry(&tx, self.id, url, response)?;
        }
        tx.commit().map_err(storage)
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT request_url FROM cache_entries WHERE bucket_id = ?1 ORDER BY request_url")
            .map_err(storage)?;
        let keys = stmt
            .query_map(params![self.id], |row| row.get::<_, String>(0))
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        Ok(keys)
    }
}
