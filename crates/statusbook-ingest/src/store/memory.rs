//! In-memory document store

use async_trait::async_trait;
use statusbook_common::models::document_id;
use statusbook_common::{Document, StoreError};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{strip_id, BulkWriteReport, Collection, Filter, UpdateResult, WriteErrorKind, WriteFailure};

type Documents = BTreeMap<String, Document>;

/// A set of in-memory collections
///
/// Collections obtained from the same store under the same name share data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<HashMap<String, Arc<Mutex<Documents>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, name: &str) -> MemoryCollection {
        let docs = match self.collections.lock() {
            Ok(mut map) => Arc::clone(map.entry(name.to_string()).or_default()),
            // A poisoned registry still holds valid data
            Err(poisoned) => Arc::clone(poisoned.into_inner().entry(name.to_string()).or_default()),
        };

        MemoryCollection {
            name: name.to_string(),
            docs,
        }
    }
}

/// One in-memory collection
#[derive(Clone)]
pub struct MemoryCollection {
    name: String,
    docs: Arc<Mutex<Documents>>,
}

impl MemoryCollection {
    /// A standalone collection not registered in any store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: Arc::default(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Documents>, StoreError> {
        self.docs
            .lock()
            .map_err(|e| StoreError::backend(format!("Failed to acquire collection lock: {}", e)))
    }

    fn require_id(doc: &Document) -> Result<String, StoreError> {
        document_id(doc)
            .map(str::to_string)
            .ok_or_else(|| StoreError::InvalidDocument("document has no string _id".to_string()))
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, doc: Document) -> Result<(), StoreError> {
        let id = Self::require_id(&doc)?;
        let mut docs = self.lock()?;

        if docs.contains_key(&id) {
            return Err(StoreError::duplicate_key(&self.name, id));
        }
        docs.insert(id, doc);
        Ok(())
    }

    async fn insert_many(&self, batch: Vec<Document>) -> Result<BulkWriteReport, StoreError> {
        let mut docs = self.lock()?;
        let mut report = BulkWriteReport::default();

        for (index, doc) in batch.into_iter().enumerate() {
            let id = match Self::require_id(&doc) {
                Ok(id) => id,
                Err(e) => {
                    report.failures.push(WriteFailure {
                        index,
                        id: None,
                        kind: WriteErrorKind::Other(e.to_string()),
                    });
                    continue;
                }
            };

            if docs.contains_key(&id) {
                report.failures.push(WriteFailure {
                    index,
                    id: Some(id),
                    kind: WriteErrorKind::DuplicateKey,
                });
                continue;
            }

            docs.insert(id, doc);
            report.inserted += 1;
        }

        Ok(report)
    }

    async fn update_one(&self, id: &str, fields: Document) -> Result<UpdateResult, StoreError> {
        let mut docs = self.lock()?;
        let Some(existing) = docs.get_mut(id) else {
            return Ok(UpdateResult::default());
        };

        let mut modified = false;
        for (key, value) in strip_id(fields) {
            if existing.get(&key) != Some(&value) {
                existing.insert(key, value);
                modified = true;
            }
        }

        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete_one(&self, id: &str) -> Result<u64, StoreError> {
        Ok(u64::from(self.lock()?.remove(id).is_some()))
    }

    async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError> {
        let mut docs = self.lock()?;
        let before = docs.len();
        docs.retain(|_, doc| !filter.matches(doc));
        Ok((before - docs.len()) as u64)
    }

    async fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn count_documents(&self, filter: Option<&Filter>) -> Result<u64, StoreError> {
        let docs = self.lock()?;
        let count = match filter {
            Some(filter) => docs.values().filter(|doc| filter.matches(doc)).count(),
            None => docs.len(),
        };
        Ok(count as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_one_rejects_duplicates() {
        let users = MemoryCollection::new("users");
        users.insert_one(doc(json!({"_id": "SC"}))).await.unwrap();

        let err = users.insert_one(doc(json!({"_id": "SC"}))).await.unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(users.count_documents(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_many_is_unordered() {
        let users = MemoryCollection::new("users");
        users.insert_one(doc(json!({"_id": "b"}))).await.unwrap();

        let report = users
            .insert_many(vec![
                doc(json!({"_id": "a"})),
                doc(json!({"_id": "b"})),
                doc(json!({"name": "no id"})),
                doc(json!({"_id": "c"})),
            ])
            .await
            .unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicate_count(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[1].index, 2);
        assert!(matches!(report.failures[1].kind, WriteErrorKind::Other(_)));
        assert_eq!(users.count_documents(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_keeps_identity() {
        let statuses = MemoryCollection::new("statuses");
        statuses
            .insert_one(doc(json!({"_id": "s1", "status_text": "old"})))
            .await
            .unwrap();

        let result = statuses
            .update_one("s1", doc(json!({"_id": "s2", "status_text": "new"})))
            .await
            .unwrap();
        assert_eq!(result, UpdateResult { matched: 1, modified: 1 });

        let stored = statuses.find_one("s1").await.unwrap().unwrap();
        assert_eq!(stored["_id"], "s1");
        assert_eq!(stored["status_text"], "new");

        let missing = statuses.update_one("nope", Document::new()).await.unwrap();
        assert_eq!(missing.matched, 0);
    }

    #[tokio::test]
    async fn test_delete_many_by_filter() {
        let statuses = MemoryCollection::new("statuses");
        for (id, owner) in [("1", "a"), ("2", "a"), ("3", "b")] {
            statuses
                .insert_one(doc(json!({"_id": id, "user_id": owner})))
                .await
                .unwrap();
        }

        assert_eq!(statuses.delete_many(&Filter::field_eq("user_id", "a")).await.unwrap(), 2);
        assert_eq!(statuses.count_documents(None).await.unwrap(), 1);
        assert_eq!(statuses.delete_one("3").await.unwrap(), 1);
        assert_eq!(statuses.delete_one("3").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_shares_collections_by_name() {
        let store = MemoryStore::new();
        store
            .collection("users")
            .insert_one(doc(json!({"_id": "x"})))
            .await
            .unwrap();

        assert!(store.collection("users").find_one("x").await.unwrap().is_some());
        assert!(store.collection("other").find_one("x").await.unwrap().is_none());
    }
}
