//! SQLite-backed document store
//!
//! Each collection is a table `(id TEXT PRIMARY KEY, body TEXT NOT NULL)`
//! holding the JSON document. The primary key constraint provides duplicate
//! detection. Separate processes may open the same file; writers wait on
//! SQLite's busy timeout rather than failing immediately.

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use statusbook_common::models::document_id;
use statusbook_common::{Document, StoreError};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::{strip_id, BulkWriteReport, Collection, Filter, UpdateResult, WriteErrorKind, WriteFailure};

/// How long a writer waits for another connection's lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Extended result code for a PRIMARY KEY constraint violation
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;

type SharedConnection = Arc<Mutex<Connection>>;

/// A database file holding any number of collections
#[derive(Clone)]
pub struct SqliteStore {
    db: SharedConnection,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::backend(format!("Failed to create database directory: {}", e)))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::backend(format!("Failed to open database {}: {}", path.display(), e)))?;
        Self::configure(conn)
    }

    /// A private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::backend(format!("Failed to create in-memory database: {}", e)))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(backend)?;
        // WAL lets readers proceed while a worker process is writing
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(backend)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get a collection, creating its table on first use
    pub fn collection(&self, name: &str) -> Result<SqliteCollection, StoreError> {
        if !is_identifier(name) {
            return Err(StoreError::backend(format!("Invalid collection name '{}'", name)));
        }

        let conn = self
            .db
            .lock()
            .map_err(|e| StoreError::backend(format!("Failed to acquire database lock: {}", e)))?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, body TEXT NOT NULL)",
                name
            ),
            [],
        )
        .map_err(backend)?;

        Ok(SqliteCollection {
            name: name.to_string(),
            db: Arc::clone(&self.db),
        })
    }
}

/// One collection stored as a table
#[derive(Clone)]
pub struct SqliteCollection {
    name: String,
    db: SharedConnection,
}

impl SqliteCollection {
    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let name = self.name.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| StoreError::backend(format!("Failed to acquire database lock: {}", e)))?;
            f(&mut conn, &name)
        })
        .await
        .map_err(|e| StoreError::backend(format!("Database task failed: {}", e)))?
    }
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, doc: Document) -> Result<(), StoreError> {
        let id = document_id(&doc)
            .map(str::to_string)
            .ok_or_else(|| StoreError::InvalidDocument("document has no string _id".to_string()))?;
        let body = serde_json::to_string(&doc)?;

        self.with_conn(move |conn, table| {
            conn.execute(
                &format!("INSERT INTO {} (id, body) VALUES (?1, ?2)", table),
                params![id, body],
            )
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::duplicate_key(table, id.clone())
                } else {
                    backend(e)
                }
            })?;
            Ok(())
        })
        .await
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<BulkWriteReport, StoreError> {
        self.with_conn(move |conn, table| {
            let tx = conn.transaction().map_err(backend)?;
            let mut report = BulkWriteReport::default();

            {
                let mut stmt = tx
                    .prepare(&format!("INSERT INTO {} (id, body) VALUES (?1, ?2)", table))
                    .map_err(backend)?;

                for (index, doc) in docs.iter().enumerate() {
                    let Some(id) = document_id(doc) else {
                        report.failures.push(WriteFailure {
                            index,
                            id: None,
                            kind: WriteErrorKind::Other("document has no string _id".to_string()),
                        });
                        continue;
                    };

                    let outcome = serde_json::to_string(doc)
                        .map_err(|e| Classified::Other(e.to_string()))
                        .and_then(|body| stmt.execute(params![id, body]).map_err(classify));

                    match outcome {
                        Ok(_) => report.inserted += 1,
                        Err(kind) => report.failures.push(WriteFailure {
                            index,
                            id: Some(id.to_string()),
                            kind: match kind {
                                Classified::Duplicate => WriteErrorKind::DuplicateKey,
                                Classified::Other(msg) => WriteErrorKind::Other(msg),
                            },
                        }),
                    }
                }
            }

            // A failed statement only rolls back itself, so earlier rows survive
            tx.commit().map_err(backend)?;
            debug!(
                collection = table,
                inserted = report.inserted,
                failed = report.failures.len(),
                "Unordered insert committed"
            );
            Ok(report)
        })
        .await
    }

    async fn update_one(&self, id: &str, fields: Document) -> Result<UpdateResult, StoreError> {
        let id = id.to_string();
        let patch = serde_json::to_string(&strip_id(fields))?;

        self.with_conn(move |conn, table| {
            let tx = conn.transaction().map_err(backend)?;
            let exists = tx
                .query_row(
                    &format!("SELECT 1 FROM {} WHERE id = ?1", table),
                    params![id],
                    |_| Ok(()),
                )
                .optional()
                .map_err(backend)?
                .is_some();

            if !exists {
                return Ok(UpdateResult::default());
            }

            let changed = tx
                .execute(
                    &format!(
                        "UPDATE {} SET body = json_patch(body, ?2) WHERE id = ?1 AND json_patch(body, ?2) != body",
                        table
                    ),
                    params![id, patch],
                )
                .map_err(backend)?;
            tx.commit().map_err(backend)?;

            Ok(UpdateResult {
                matched: 1,
                modified: changed as u64,
            })
        })
        .await
    }

    async fn delete_one(&self, id: &str) -> Result<u64, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn, table| {
            let deleted = conn
                .execute(&format!("DELETE FROM {} WHERE id = ?1", table), params![id])
                .map_err(backend)?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError> {
        let (path, value) = json_path(filter)?;
        self.with_conn(move |conn, table| {
            let deleted = conn
                .execute(
                    &format!("DELETE FROM {} WHERE json_extract(body, ?1) = ?2", table),
                    params![path, value],
                )
                .map_err(backend)?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let id = id.to_string();
        let body: Option<String> = self
            .with_conn(move |conn, table| {
                conn.query_row(
                    &format!("SELECT body FROM {} WHERE id = ?1", table),
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(backend)
            })
            .await?;

        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    async fn count_documents(&self, filter: Option<&Filter>) -> Result<u64, StoreError> {
        let filter = filter.map(json_path).transpose()?;
        self.with_conn(move |conn, table| {
            let count: i64 = match filter {
                Some((path, value)) => conn.query_row(
                    &format!("SELECT COUNT(*) FROM {} WHERE json_extract(body, ?1) = ?2", table),
                    params![path, value],
                    |row| row.get(0),
                ),
                None => conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0)),
            }
            .map_err(backend)?;
            Ok(count as u64)
        })
        .await
    }
}

enum Classified {
    Duplicate,
    Other(String),
}

fn classify(err: rusqlite::Error) -> Classified {
    if is_duplicate_key(&err) {
        Classified::Duplicate
    } else {
        Classified::Other(err.to_string())
    }
}

fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::backend(err.to_string())
}

/// Table and field names are interpolated into SQL, so only plain identifiers pass
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

fn json_path(filter: &Filter) -> Result<(String, String), StoreError> {
    if !is_identifier(&filter.field) {
        return Err(StoreError::backend(format!("Invalid filter field '{}'", filter.field)));
    }
    Ok((format!("$.{}", filter.field), filter.value.clone()))
}
