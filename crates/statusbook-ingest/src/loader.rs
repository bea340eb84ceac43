//! Bulk loader
//!
//! Each batch is one unordered multi-insert. Duplicate keys are tolerated:
//! the conflicting documents are already stored, so the batch still counts
//! as loaded. Any other rejection, or an error for the whole call, fails the
//! batch. A load succeeds only if every batch it attempted succeeded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use statusbook_common::Document;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::shard::{run_shards, ShardHandler};
use crate::store::Collection;

/// How batches are submitted to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// One batch at a time; the first failed batch stops the load
    Sequential,
    /// Every batch runs, at most `max_workers` at once
    Concurrent { max_workers: NonZeroUsize },
}

/// Verdict for a single batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub index: usize,
    pub size: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Documents rejected for a reason other than a duplicate key
    pub rejected: usize,
    /// Set when the insert call itself failed
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.rejected == 0 && self.error.is_none()
    }
}

/// Aggregate result of a load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub batches_total: usize,
    pub batches_attempted: usize,
    pub batches_failed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Input rows dropped during normalization
    pub rows_rejected: usize,
}

impl LoadReport {
    pub fn new(batches_total: usize) -> Self {
        Self {
            batches_total,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.batches_failed == 0
    }

    pub fn record(&mut self, outcome: &BatchOutcome) {
        self.batches_attempted += 1;
        self.inserted += outcome.inserted;
        self.duplicates += outcome.duplicates;
        if !outcome.is_success() {
            self.batches_failed += 1;
        }
    }

    /// Fold another report into this one
    pub fn absorb(&mut self, other: &LoadReport) {
        self.batches_total += other.batches_total;
        self.batches_attempted += other.batches_attempted;
        self.batches_failed += other.batches_failed;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.rows_rejected += other.rows_rejected;
    }
}

/// Submit one batch and classify the result
pub async fn load_batch(collection: &dyn Collection, index: usize, batch: Vec<Document>) -> BatchOutcome {
    let size = batch.len();
    let mut outcome = BatchOutcome {
        index,
        size,
        ..BatchOutcome::default()
    };

    let report = match collection.insert_many(batch).await {
        Ok(report) => report,
        Err(e) => {
            error!(collection = collection.name(), batch = index, error = %e, "Batch insert failed");
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };

    outcome.inserted = report.inserted;
    outcome.duplicates = report.duplicate_count();
    outcome.rejected = report.hard_failures().count();

    if outcome.duplicates > 0 {
        let ids: Vec<&str> = report
            .failures
            .iter()
            .filter(|f| f.is_duplicate_key())
            .filter_map(|f| f.id.as_deref())
            .collect();
        warn!(
            collection = collection.name(),
            batch = index,
            duplicates = outcome.duplicates,
            ids = ?ids,
            "Skipped documents with existing keys"
        );
    }

    for failure in report.hard_failures() {
        error!(
            collection = collection.name(),
            batch = index,
            position = failure.index,
            id = failure.id.as_deref().unwrap_or("<none>"),
            cause = ?failure.kind,
            "Document rejected"
        );
    }

    debug!(
        collection = collection.name(),
        batch = index,
        size,
        inserted = outcome.inserted,
        duplicates = outcome.duplicates,
        "Batch loaded"
    );

    outcome
}

/// Load batches one after another, stopping at the first failed batch
pub async fn load_sequential(collection: &dyn Collection, batches: Vec<Vec<Document>>) -> LoadReport {
    let mut report = LoadReport::new(batches.len());

    for (index, batch) in batches.into_iter().enumerate() {
        let outcome = load_batch(collection, index, batch).await;
        report.record(&outcome);

        if !outcome.is_success() {
            warn!(
                collection = collection.name(),
                batch = index,
                skipped = report.batches_total - report.batches_attempted,
                "Stopping load after failed batch"
            );
            break;
        }
    }

    report
}

struct BatchHandler {
    collection: Arc<dyn Collection>,
}

#[async_trait]
impl ShardHandler for BatchHandler {
    type Shard = Vec<Document>;
    type Output = BatchOutcome;

    async fn handle(&self, index: usize, batch: Vec<Document>) -> BatchOutcome {
        load_batch(self.collection.as_ref(), index, batch).await
    }

    fn aborted(&self, index: usize, reason: String) -> BatchOutcome {
        BatchOutcome {
            index,
            error: Some(reason),
            ..BatchOutcome::default()
        }
    }
}

/// Load every batch on a bounded pool of tasks and wait for all of them
pub async fn load_concurrent(
    collection: Arc<dyn Collection>,
    batches: Vec<Vec<Document>>,
    max_workers: NonZeroUsize,
) -> LoadReport {
    let mut report = LoadReport::new(batches.len());
    let handler = Arc::new(BatchHandler { collection });

    for outcome in run_shards(handler, batches, max_workers).await {
        report.record(&outcome);
    }

    report
}

/// Load batches with the given strategy
pub async fn load(collection: Arc<dyn Collection>, batches: Vec<Vec<Document>>, strategy: LoadStrategy) -> LoadReport {
    let name = collection.name().to_string();
    let report = match strategy {
        LoadStrategy::Sequential => load_sequential(collection.as_ref(), batches).await,
        LoadStrategy::Concurrent { max_workers } => load_concurrent(collection, batches, max_workers).await,
    };

    info!(
        collection = %name,
        batches = report.batches_total,
        failed = report.batches_failed,
        inserted = report.inserted,
        duplicates = report.duplicates,
        "Load finished"
    );

    report
}
