//! `statusbook load-users` / `statusbook load-statuses`

use colored::Colorize;
use statusbook_ingest::pipeline::{self, current_program, ProcessPool};
use statusbook_ingest::shard::{ShardKind, WorkerCommand};
use statusbook_ingest::{LoadReport, LoadStrategy};
use std::num::NonZeroUsize;
use std::path::Path;

use crate::context::Context;
use crate::error::{CliError, Result};
use crate::{LoadArgs, Strategy};

/// Run a load command and print its summary
pub async fn run(ctx: &Context, kind: ShardKind, args: &LoadArgs) -> Result<()> {
    let report = load(ctx, kind, &args.file, args.strategy, args.batch_size, args.max_workers).await?;
    print_report(kind, &report);

    if !report.is_success() {
        return Err(CliError::LoadFailed {
            kind: kind.as_str().to_string(),
            file: args.file.display().to_string(),
            failed: report.batches_failed,
            total: report.batches_total,
        });
    }
    Ok(())
}

/// Load `file` into the collection for `kind`
pub async fn load(
    ctx: &Context,
    kind: ShardKind,
    file: &Path,
    strategy: Strategy,
    batch_size: Option<NonZeroUsize>,
    max_workers: Option<NonZeroUsize>,
) -> Result<LoadReport> {
    let max_workers = ctx.max_workers(max_workers)?;

    if strategy == Strategy::Processes {
        let pool = ProcessPool {
            command: WorkerCommand::shard_worker(current_program()?, kind, &ctx.config.database, max_workers)?,
            shard_rows: ctx.config.shard_rows()?,
            max_processes: ctx.config.max_processes()?,
        };
        let report = match kind {
            ShardKind::Users => pipeline::load_users_multiprocess(file, pool).await?,
            ShardKind::Statuses => pipeline::load_status_updates_multiprocess(file, pool).await?,
        };
        return Ok(report);
    }

    let strategy = match strategy {
        Strategy::Sequential => LoadStrategy::Sequential,
        _ => LoadStrategy::Concurrent { max_workers },
    };
    let batch_size = ctx.batch_size(kind, batch_size)?;
    let collection = ctx.collection(kind);

    let report = match kind {
        ShardKind::Users => pipeline::load_users(file, collection, batch_size, strategy).await?,
        ShardKind::Statuses => pipeline::load_status_updates(file, collection, batch_size, strategy).await?,
    };
    Ok(report)
}

/// Print a one-line colored summary of a load
pub fn print_report(kind: ShardKind, report: &LoadReport) {
    let summary = format!(
        "{} inserted, {} already present, {} rows rejected ({}/{} batches)",
        report.inserted,
        report.duplicates,
        report.rows_rejected,
        report.batches_attempted.saturating_sub(report.batches_failed),
        report.batches_total,
    );

    if report.is_success() {
        println!("{} Loaded {}: {}", "✓".green(), kind.as_str().cyan(), summary);
    } else {
        println!("{} Failed to load {}: {}", "✗".red(), kind.as_str().cyan(), summary);
    }
}
