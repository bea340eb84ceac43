//! Shard driver
//!
//! [`run_shards`] fans independent units of work out over a bounded pool and
//! waits for every one of them. The batch loader plugs in a task-level handler
//! and the process pool plugs in [`ProcessShardHandler`], which hands each row
//! chunk to a separate `shard-worker` process.

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use statusbook_common::{Result, StatusbookError};
use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::loader::LoadReport;
use crate::partition::RowChunk;
use crate::store::MEMORY_LOCATION;

/// Processes one shard of a larger job
#[async_trait]
pub trait ShardHandler: Send + Sync + 'static {
    type Shard: Send + 'static;
    type Output: Send + 'static;

    async fn handle(&self, index: usize, shard: Self::Shard) -> Self::Output;

    /// Output recorded for a shard whose task died before producing one
    fn aborted(&self, index: usize, reason: String) -> Self::Output;
}

/// Run every shard through `handler`, at most `max_in_flight` at a time
///
/// Each shard runs on its own tokio task. Results come back in completion
/// order and there is no short-circuit: a failing shard never stops the
/// others.
pub async fn run_shards<H, I>(handler: Arc<H>, shards: I, max_in_flight: NonZeroUsize) -> Vec<H::Output>
where
    H: ShardHandler,
    I: IntoIterator<Item = H::Shard>,
{
    run_shard_stream(handler, stream::iter(shards), max_in_flight).await
}

/// [`run_shards`] over shards produced asynchronously
pub async fn run_shard_stream<H, S>(handler: Arc<H>, shards: S, max_in_flight: NonZeroUsize) -> Vec<H::Output>
where
    H: ShardHandler,
    S: Stream<Item = H::Shard>,
{
    shards
        .enumerate()
        .map(|(index, shard)| {
            let handler = Arc::clone(&handler);
            async move {
                let task = tokio::spawn({
                    let handler = Arc::clone(&handler);
                    async move { handler.handle(index, shard).await }
                });

                match task.await {
                    Ok(output) => output,
                    Err(e) => {
                        error!(shard = index, error = %e, "Shard task aborted");
                        handler.aborted(index, e.to_string())
                    }
                }
            }
        })
        .buffer_unordered(max_in_flight.get())
        .collect()
        .await
}

/// Record kinds a shard worker can load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardKind {
    Users,
    Statuses,
}

impl ShardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardKind::Users => "users",
            ShardKind::Statuses => "statuses",
        }
    }
}

/// How to launch one shard worker process
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `<program> shard-worker --kind <kind> --database <path> --max-workers <n>`
    ///
    /// Workers open the database themselves, so it must be a file that other
    /// processes can reach.
    pub fn shard_worker(
        program: impl Into<PathBuf>,
        kind: ShardKind,
        database: &Path,
        max_workers: NonZeroUsize,
    ) -> Result<Self> {
        if database.as_os_str() == MEMORY_LOCATION {
            return Err(StatusbookError::config(
                "multi-process loading needs a database file; the in-memory store is private to one process",
            ));
        }

        Ok(Self::new(program)
            .arg("shard-worker")
            .arg("--kind")
            .arg(kind.as_str())
            .arg("--database")
            .arg(database.as_os_str())
            .arg("--max-workers")
            .arg(max_workers.get().to_string()))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// Result of one worker process
#[derive(Debug, Clone)]
pub struct ShardResult {
    pub index: usize,
    pub rows: usize,
    /// The worker exited with status 0
    pub success: bool,
    /// Load report the worker printed, if it got that far
    pub report: Option<LoadReport>,
}

impl ShardResult {
    fn failed(index: usize, rows: usize) -> Self {
        Self {
            index,
            rows,
            success: false,
            report: None,
        }
    }
}

/// Hands each row chunk to a fresh worker process over stdin
pub struct ProcessShardHandler {
    command: WorkerCommand,
}

impl ProcessShardHandler {
    pub fn new(command: WorkerCommand) -> Self {
        Self { command }
    }

    async fn run_worker(&self, chunk: &RowChunk) -> Result<(bool, Option<LoadReport>)> {
        let payload = chunk.to_csv()?;

        let mut child = self
            .command
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A worker that exits early closes the pipe; its exit status tells the rest
            if let Err(e) = stdin.write_all(&payload).await {
                warn!(shard = chunk.index, error = %e, "Worker closed stdin early");
            }
        }

        let output = child.wait_with_output().await?;
        let report = serde_json::from_slice::<LoadReport>(&output.stdout).ok();

        Ok((output.status.success(), report))
    }
}

#[async_trait]
impl ShardHandler for ProcessShardHandler {
    type Shard = Result<RowChunk>;
    type Output = ShardResult;

    async fn handle(&self, index: usize, shard: Self::Shard) -> ShardResult {
        let chunk = match shard {
            Ok(chunk) => chunk,
            Err(e) => {
                error!(shard = index, error = %e, "Failed to read shard from source file");
                return ShardResult::failed(index, 0);
            }
        };
        let rows = chunk.rows.len();

        debug!(shard = index, rows, program = %self.command.program().display(), "Starting worker");

        match self.run_worker(&chunk).await {
            Ok((success, report)) => {
                if success {
                    info!(shard = index, rows, "Worker finished");
                } else {
                    error!(shard = index, rows, "Worker reported a failed load");
                }
                ShardResult {
                    index,
                    rows,
                    success,
                    report,
                }
            }
            Err(e) => {
                error!(shard = index, error = %e, "Failed to run worker");
                ShardResult::failed(index, rows)
            }
        }
    }

    fn aborted(&self, index: usize, _reason: String) -> ShardResult {
        ShardResult::failed(index, 0)
    }
}
