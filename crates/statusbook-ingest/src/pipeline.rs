//! File-level load entry points
//!
//! Reads a CSV file, normalizes every row, partitions the documents and hands
//! them to the loader. The file is opened and its header read before anything
//! touches the store, so a missing or unreadable file fails with no writes.

use statusbook_common::{Document, Result, Status, StatusbookError, User};
use futures::stream::{self, Stream};
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::loader::{self, LoadReport, LoadStrategy};
use crate::normalize::{missing_columns, normalize_document, RawRow, RowRecord};
use crate::partition::{csv_reader, partition, worker_batch_size, RowChunk, RowChunks};
use crate::shard::{run_shard_stream, ProcessShardHandler, WorkerCommand};
use crate::store::Collection;

/// Normalized documents read from one CSV source
#[derive(Debug, Default)]
pub struct ParsedRows {
    pub documents: Vec<Document>,
    pub rejected: usize,
}

/// Read and normalize every row of a CSV source
pub fn read_documents<R: RowRecord, S: Read>(source: S) -> Result<ParsedRows> {
    let mut reader = csv_reader(source);
    let headers = reader.headers()?.clone();

    let missing = missing_columns::<R>(&headers);
    if !missing.is_empty() {
        warn!(kind = R::KIND, missing = ?missing, "Input lacks required columns; every row will be rejected");
    }

    let mut parsed = ParsedRows::default();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        match normalize_document::<R>(&RawRow::from_record(&headers, &record))? {
            Some(doc) => parsed.documents.push(doc),
            None => {
                debug!(kind = R::KIND, row = line + 1, "Rejected row with missing values");
                parsed.rejected += 1;
            }
        }
    }

    Ok(parsed)
}

/// Run blocking file work off the async runtime
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StatusbookError::worker(format!("CSV reader task failed: {}", e)))?
}

async fn read_file<R: RowRecord>(path: &Path) -> Result<ParsedRows> {
    let path = path.to_path_buf();
    blocking(move || read_documents::<R, _>(std::fs::File::open(path)?)).await
}

/// Stream the chunks of `chunks` from a blocking reader task
///
/// At most `capacity` chunks are buffered ahead of the consumer.
fn chunk_stream<S>(chunks: RowChunks<S>, capacity: NonZeroUsize) -> impl Stream<Item = Result<RowChunk>>
where
    S: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.get());
    tokio::task::spawn_blocking(move || {
        for chunk in chunks {
            if tx.blocking_send(chunk).is_err() {
                break;
            }
        }
    });

    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|chunk| (chunk, rx)) })
}

/// Load one record type from a CSV file
pub async fn load_file<R: RowRecord>(
    path: &Path,
    collection: Arc<dyn Collection>,
    batch_size: NonZeroUsize,
    strategy: LoadStrategy,
) -> Result<LoadReport> {
    info!(kind = R::KIND, path = %path.display(), batch_size = batch_size.get(), ?strategy, "Loading file");

    let parsed = read_file::<R>(path).await?;
    if parsed.rejected > 0 {
        warn!(kind = R::KIND, rejected = parsed.rejected, "Dropped rows with missing values");
    }

    let batches = partition(parsed.documents, batch_size);
    let mut report = loader::load(collection, batches, strategy).await;
    report.rows_rejected = parsed.rejected;

    Ok(report)
}

/// Load user accounts from a CSV file
pub async fn load_users(
    path: &Path,
    users: Arc<dyn Collection>,
    batch_size: NonZeroUsize,
    strategy: LoadStrategy,
) -> Result<LoadReport> {
    load_file::<User>(path, users, batch_size, strategy).await
}

/// Load status updates from a CSV file
///
/// Owners are not checked here; bulk loads trust the input file.
pub async fn load_status_updates(
    path: &Path,
    statuses: Arc<dyn Collection>,
    batch_size: NonZeroUsize,
    strategy: LoadStrategy,
) -> Result<LoadReport> {
    load_file::<Status>(path, statuses, batch_size, strategy).await
}

/// Settings of a multi-process load
#[derive(Debug, Clone)]
pub struct ProcessPool {
    pub command: WorkerCommand,
    /// Rows handed to each worker process
    pub shard_rows: NonZeroUsize,
    pub max_processes: NonZeroUsize,
}

/// Load a CSV file through a pool of worker processes, one per row chunk
///
/// Succeeds only if every worker exits successfully.
pub async fn load_multiprocess<R: RowRecord>(path: &Path, pool: ProcessPool) -> Result<LoadReport> {
    let chunks = {
        let path = path.to_path_buf();
        let shard_rows = pool.shard_rows;
        blocking(move || RowChunks::open(&path, shard_rows)).await?
    };

    let missing = missing_columns::<R>(chunks.headers());
    if !missing.is_empty() {
        warn!(kind = R::KIND, missing = ?missing, "Input lacks required columns; every row will be rejected");
    }

    info!(
        kind = R::KIND,
        path = %path.display(),
        shard_rows = pool.shard_rows.get(),
        max_processes = pool.max_processes.get(),
        "Loading file with worker processes"
    );

    let handler = Arc::new(ProcessShardHandler::new(pool.command));
    let shards = chunk_stream(chunks, pool.max_processes);
    let results = run_shard_stream(handler, shards, pool.max_processes).await;

    let mut report = LoadReport::default();
    let mut failed_workers = 0;
    for result in &results {
        match &result.report {
            Some(child) => report.absorb(child),
            None => {
                report.batches_total += 1;
                report.batches_attempted += 1;
            }
        }
        // The exit status is authoritative even when the printed report disagrees
        if !result.success {
            failed_workers += 1;
            if result.report.as_ref().is_none_or(LoadReport::is_success) {
                report.batches_failed += 1;
            }
        }
    }

    info!(
        kind = R::KIND,
        workers = results.len(),
        failed_workers,
        inserted = report.inserted,
        duplicates = report.duplicates,
        "Worker processes finished"
    );

    Ok(report)
}

/// Load user accounts through worker processes
pub async fn load_users_multiprocess(path: &Path, pool: ProcessPool) -> Result<LoadReport> {
    load_multiprocess::<User>(path, pool).await
}

/// Load status updates through worker processes
pub async fn load_status_updates_multiprocess(path: &Path, pool: ProcessPool) -> Result<LoadReport> {
    load_multiprocess::<Status>(path, pool).await
}

/// Body of a `shard-worker` process: load one CSV chunk read from `source`
///
/// The chunk is re-split so each of `max_workers` tasks gets one batch.
pub async fn run_shard_worker<R, S>(
    source: S,
    collection: Arc<dyn Collection>,
    max_workers: NonZeroUsize,
) -> Result<LoadReport>
where
    R: RowRecord,
    S: Read + Send + 'static,
{
    let parsed = blocking(move || read_documents::<R, _>(source)).await?;

    let batch_size = worker_batch_size(parsed.documents.len(), max_workers);
    debug!(
        kind = R::KIND,
        rows = parsed.documents.len(),
        batch_size = batch_size.get(),
        "Shard worker loading chunk"
    );

    let batches = partition(parsed.documents, batch_size);
    let mut report = loader::load_concurrent(collection, batches, max_workers).await;
    report.rows_rejected = parsed.rejected;

    Ok(report)
}

/// Path of the running executable, for spawning workers of the same binary
pub fn current_program() -> Result<PathBuf> {
    Ok(std::env::current_exe()?)
}
