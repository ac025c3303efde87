//! Contact forms queued while offline and replayed on background sync.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use shoresquad_core::{AppError, CacheError, Config, RusqliteErrorExt};
use thiserror::Error;
use tracing::instrument;
use url::Url;

/// One rule a submission field failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("Invalid submission: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<FieldError>),

    #[error("Outbox storage error: {0}")]
    Storage(#[from] CacheError),

    #[error("Stored form {id} is unreadable: {message}")]
    Corrupt { id: i64, message: String },

    #[error("Invalid sync endpoint '{url}': {message}")]
    Endpoint { url: String, message: String },
}

impl From<OutboxError> for AppError {
    fn from(err: OutboxError) -> Self {
        match err {
            OutboxError::Storage(e) => AppError::Cache(e),
            other => AppError::Service(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .char_indices()
            .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

impl ContactSubmission {
    /// Check every field, reporting all failures at once.
    ///
    /// Values are trimmed before checking.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut fail = |field: &'static str, message: &'static str| {
            errors.push(FieldError { field, message });
        };

        let name = self.name.trim();
        if name.is_empty() {
            fail("name", "Name is required");
        } else if name.chars().count() < 2 {
            fail("name", "Name must be at least 2 characters");
        }

        let email = self.email.trim();
        if email.is_empty() {
            fail("email", "Email is required");
        } else if !is_email(email) {
            fail("email", "Please enter a valid email address");
        }

        if self.subject.trim().is_empty() {
            fail("subject", "Please select a subject");
        }

        let message = self.message.trim();
        if message.is_empty() {
            fail("message", "Message is required");
        } else if message.chars().count() < 10 {
            fail("message", "Message must be at least 10 characters");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A queued submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingForm {
    pub id: i64,
    pub submission: ContactSubmission,
    pub queued_at: DateTime<Utc>,
}

/// Result of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub sent: usize,
    pub failed: usize,
}

fn storage(e: rusqlite::Error) -> OutboxError {
    OutboxError::Storage(e.into_cache_error())
}

/// SQLite queue of contact submissions awaiting delivery.
#[derive(Clone)]
pub struct ContactOutbox {
    conn: Arc<Mutex<Connection>>,
}

impl ContactOutbox {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, OutboxError> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, OutboxError> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, OutboxError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pending_forms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                data TEXT NOT NULL,
                queued_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(storage)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Validate and queue a submission, returning its id
    pub fn enqueue(&self, submission: &ContactSubmission) -> Result<i64, OutboxError> {
        submission.validate().map_err(OutboxError::Invalid)?;

        let data = serde_json::to_string(submission)
            .map_err(|e| OutboxError::Storage(CacheError::OperationFailed(e.to_string())))?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO pending_forms (data, queued_at) VALUES (?1, ?2)",
            params![data, Utc::now().to_rfc3339()],
        )
        .map_err(storage)?;

        let id = conn.last_insert_rowid();
        tracing::info!("Queued contact form {} for sync", id);
        Ok(id)
    }

    /// Queued forms, oldest first
    pub fn pending(&self) -> Result<Vec<PendingForm>, OutboxError> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare("SELECT id, data, queued_at FROM pending_forms ORDER BY id")
                .map_err(storage)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(storage)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(storage)?;
            rows
        };

        rows.into_iter()
            .map(|(id, data, queued_at)| {
                let submission = serde_json::from_str(&data).map_err(|e| OutboxError::Corrupt {
                    id,
                    message: e.to_string(),
                })?;
                let queued_at = DateTime::parse_from_rfc3339(&queued_at)
                    .map_err(|e| OutboxError::Corrupt {
                        id,
                        message: e.to_string(),
                    })?
                    .with_timezone(&Utc);
                Ok(PendingForm {
                    id,
                    submission,
                    queued_at,
                })
            })
            .collect()
    }

    pub fn remove(&self, id: i64) -> Result<bool, OutboxError> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM pending_forms WHERE id = ?1", params![id])
            .map_err(storage)?;
        Ok(removed > 0)
    }

    pub fn len(&self) -> Result<usize, OutboxError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM pending_forms", [], |row| row.get(0))
            .map_err(storage)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool, OutboxError> {
        Ok(self.len()? == 0)
    }
}

/// Replays the outbox against the contact endpoint when its sync tag fires.
pub struct OutboxSync {
    outbox: ContactOutbox,
    client: Client,
    endpoint: Url,
    tag: String,
}

impl OutboxSync {
    pub fn new(outbox: ContactOutbox, client: Client, endpoint: Url, tag: impl Into<String>) -> Self {
        Self {
            outbox,
            client,
            endpoint,
            tag: tag.into(),
        }
    }

    /// Resolve the endpoint path against the configured origin
    pub fn from_config(
        config: &Config,
        outbox: ContactOutbox,
        client: Client,
    ) -> Result<Self, OutboxError> {
        let endpoint = Url::parse(&config.offline.origin)
            .and_then(|origin| origin.join(&config.outbox.endpoint))
            .map_err(|e| OutboxError::Endpoint {
                url: config.outbox.endpoint.clone(),
                message: e.to_string(),
            })?;
        Ok(Self::new(outbox, client, endpoint, config.outbox.sync_tag.clone()))
    }

    pub fn outbox(&self) -> &ContactOutbox {
        &self.outbox
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Handle a background sync event.
    ///
    /// Returns `None` for tags this outbox does not own. Each form is POSTed
    /// as JSON; a 2xx removes it, anything else leaves it queued.
    #[instrument(skip(self), level = "info")]
    pub async fn sync(&self, tag: &str) -> Result<Option<SyncReport>, OutboxError> {
        if tag != self.tag {
            tracing::debug!("Ignoring sync tag '{}'", tag);
            return Ok(None);
        }

        let mut report = SyncReport::default();
        for form in self.outbox.pending()? {
            let result = self
                .client
                .post(self.endpoint.clone())
                .json(&form.submission)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    self.outbox.remove(form.id)?;
                    report.sent += 1;
                    tracing::info!("Form {} synced successfully", form.id);
                }
                Ok(response) => {
                    report.failed += 1;
                    tracing::warn!("Form {} rejected with HTTP {}", form.id, response.status());
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Form {} sync failed: {}", form.id, e);
                }
            }
        }

        Ok(Some(report))
    }
}
