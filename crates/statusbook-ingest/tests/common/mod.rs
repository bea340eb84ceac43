//! Shared helpers for statusbook-ingest integration tests
//!
//! [`ProbeCollection`] wraps an in-memory collection, records which writes
//! reached it and can be told to fail specific calls.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use statusbook_common::models::document_id;
use statusbook_common::{Document, StoreError};
use statusbook_ingest::store::{BulkWriteReport, Collection, Filter, MemoryCollection, UpdateResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct ProbeCollection {
    inner: MemoryCollection,
    /// Any insert_many batch containing this id fails as a whole
    poison_id: Option<String>,
    fail_delete_many: bool,
    insert_one_calls: AtomicUsize,
    batches_seen: Mutex<Vec<Vec<String>>>,
}

impl ProbeCollection {
    pub fn new(name: &str) -> Self {
        Self {
            inner: MemoryCollection::new(name),
            poison_id: None,
            fail_delete_many: false,
            insert_one_calls: AtomicUsize::new(0),
            batches_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn poisoned_by(mut self, id: &str) -> Self {
        self.poison_id = Some(id.to_string());
        self
    }

    pub fn failing_delete_many(mut self) -> Self {
        self.fail_delete_many = true;
        self
    }

    pub fn insert_one_calls(&self) -> usize {
        self.insert_one_calls.load(Ordering::SeqCst)
    }

    /// Ids of every batch passed to insert_many, in call order
    pub fn batches_seen(&self) -> Vec<Vec<String>> {
        self.batches_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Collection for ProbeCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn insert_one(&self, doc: Document) -> Result<(), StoreError> {
        self.insert_one_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_one(doc).await
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<BulkWriteReport, StoreError> {
        let ids: Vec<String> = docs
            .iter()
            .filter_map(|d| document_id(d).map(str::to_string))
            .collect();
        self.batches_seen.lock().unwrap().push(ids.clone());

        if let Some(poison) = &self.poison_id {
            if ids.contains(poison) {
                return Err(StoreError::backend("connection reset"));
            }
        }
        self.inner.insert_many(docs).await
    }

    async fn update_one(&self, id: &str, fields: Document) -> Result<UpdateResult, StoreError> {
        self.inner.update_one(id, fields).await
    }

    async fn delete_one(&self, id: &str) -> Result<u64, StoreError> {
        self.inner.delete_one(id).await
    }

    async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError> {
        if self.fail_delete_many {
            return Err(StoreError::backend("connection reset"));
        }
        self.inner.delete_many(filter).await
    }

    async fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.find_one(id).await
    }

    async fn count_documents(&self, filter: Option<&Filter>) -> Result<u64, StoreError> {
        self.inner.count_documents(filter).await
    }
}

pub const USERS_HEADER: &str = "USER_ID,EMAIL,NAME,LASTNAME";
pub const STATUSES_HEADER: &str = "STATUS_ID,USER_ID,STATUS_TEXT";

/// Write a CSV file with the given header and rows into `dir`
pub fn write_csv(dir: &Path, name: &str, header: &str, rows: &[String]) -> PathBuf {
    let mut content = String::from(header);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }

    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// `count` well-formed user rows with ids `U0000..`
pub fn user_rows(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("U{i:04},user{i}@uw.edu,Name{i},Last{i}"))
        .collect()
}
