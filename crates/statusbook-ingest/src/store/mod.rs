//! Document store interface
//!
//! The loader and the record service only ever talk to a [`Collection`]. Two
//! backends implement it:
//!
//! - [`MemoryStore`]: process-local maps, used by tests and `:memory:` sessions
//! - [`SqliteStore`]: one table per collection, shareable between processes
//!
//! `insert_many` is always unordered: every document is attempted and the
//! per-document failures come back in a [`BulkWriteReport`] instead of
//! aborting the call.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use statusbook_common::{Document, StoreError};
use std::path::Path;
use std::sync::Arc;

pub use memory::{MemoryCollection, MemoryStore};
pub use sqlite::{SqliteCollection, SqliteStore};

/// Name of the user accounts collection
pub const USERS_COLLECTION: &str = "user_accounts";

/// Name of the status updates collection
pub const STATUSES_COLLECTION: &str = "status_updates";

/// Location that selects the in-memory backend
pub const MEMORY_LOCATION: &str = ":memory:";

/// Equality filter on a single top-level string field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

impl Filter {
    pub fn field_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.field).and_then(|v| v.as_str()) == Some(self.value.as_str())
    }
}

/// Why a single document in an unordered insert was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteErrorKind {
    DuplicateKey,
    Other(String),
}

/// One rejected document of an unordered insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// Position of the document in the submitted batch
    pub index: usize,
    pub id: Option<String>,
    pub kind: WriteErrorKind,
}

impl WriteFailure {
    pub fn is_duplicate_key(&self) -> bool {
        self.kind == WriteErrorKind::DuplicateKey
    }
}

/// Outcome of an unordered multi-insert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteReport {
    pub inserted: usize,
    pub failures: Vec<WriteFailure>,
}

impl BulkWriteReport {
    pub fn duplicate_count(&self) -> usize {
        self.failures.iter().filter(|f| f.is_duplicate_key()).count()
    }

    /// Failures not caused by a duplicate key
    pub fn hard_failures(&self) -> impl Iterator<Item = &WriteFailure> {
        self.failures.iter().filter(|f| !f.is_duplicate_key())
    }

    pub fn has_hard_failures(&self) -> bool {
        self.hard_failures().next().is_some()
    }
}

/// Matched/modified counts of an update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

/// A named set of documents keyed by `_id`
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert one document; `StoreError::DuplicateKey` if `_id` exists
    async fn insert_one(&self, doc: Document) -> Result<(), StoreError>;

    /// Unordered multi-insert; attempts every document
    ///
    /// `Err` means the call as a whole failed (for example the backend is
    /// unreachable); per-document rejections are reported in the `Ok` value.
    async fn insert_many(&self, docs: Vec<Document>) -> Result<BulkWriteReport, StoreError>;

    /// Set `fields` on the document with the given id
    async fn update_one(&self, id: &str, fields: Document) -> Result<UpdateResult, StoreError>;

    async fn delete_one(&self, id: &str) -> Result<u64, StoreError>;

    async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError>;

    async fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError>;

    async fn count_documents(&self, filter: Option<&Filter>) -> Result<u64, StoreError>;
}

/// Handles to the two collections statusbook works with
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn Collection>,
    pub statuses: Arc<dyn Collection>,
    /// Whether another process can open the same data (SQLite files only)
    pub shareable: bool,
}

impl Store {
    /// Open the store at `location`; `:memory:` selects [`MemoryStore`]
    pub fn open(location: &Path) -> Result<Self, StoreError> {
        if location.as_os_str() == MEMORY_LOCATION {
            let store = MemoryStore::new();
            return Ok(Self {
                users: Arc::new(store.collection(USERS_COLLECTION)),
                statuses: Arc::new(store.collection(STATUSES_COLLECTION)),
                shareable: false,
            });
        }

        let store = SqliteStore::open(location)?;
        Ok(Self {
            users: Arc::new(store.collection(USERS_COLLECTION)?),
            statuses: Arc::new(store.collection(STATUSES_COLLECTION)?),
            shareable: true,
        })
    }
}

/// Remove `_id` from an update so a document can never change identity
pub(crate) fn strip_id(mut fields: Document) -> Document {
    fields.remove(statusbook_common::models::ID_FIELD);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("test documents are objects"),
        }
    }

    #[test]
    fn test_filter_matches_string_fields_only() {
        let filter = Filter::field_eq("user_id", "SC");
        assert!(filter.matches(&doc(json!({"_id": "1", "user_id": "SC"}))));
        assert!(!filter.matches(&doc(json!({"_id": "2", "user_id": "XX"}))));
        assert!(!filter.matches(&doc(json!({"_id": "3"}))));
    }

    #[test]
    fn test_report_classification() {
        let report = BulkWriteReport {
            inserted: 3,
            failures: vec![
                WriteFailure {
                    index: 1,
                    id: Some("a".into()),
                    kind: WriteErrorKind::DuplicateKey,
                },
                WriteFailure {
                    index: 4,
                    id: None,
                    kind: WriteErrorKind::Other("missing _id".into()),
                },
            ],
        };

        assert_eq!(report.duplicate_count(), 1);
        assert!(report.has_hard_failures());
        assert_eq!(report.hard_failures().count(), 1);
    }

    #[test]
    fn test_strip_id() {
        let fields = strip_id(doc(json!({"_id": "x", "status_text": "hi"})));
        assert!(!fields.contains_key("_id"));
        assert_eq!(fields["status_text"], "hi");
    }
}
