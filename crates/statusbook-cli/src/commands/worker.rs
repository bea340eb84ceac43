//! `statusbook shard-worker`
//!
//! Reads one CSV chunk from stdin, loads it and prints the load report as a
//! single JSON line on stdout. Logs go to stderr.

use statusbook_common::{Status, User};
use statusbook_ingest::pipeline::run_shard_worker;
use statusbook_ingest::shard::ShardKind;
use statusbook_ingest::LoadReport;
use std::num::NonZeroUsize;

use crate::context::Context;
use crate::error::Result;

/// Load the chunk on stdin; the returned report decides the exit status
pub async fn run(ctx: &Context, kind: ShardKind, max_workers: Option<NonZeroUsize>) -> Result<LoadReport> {
    let max_workers = ctx.max_workers(max_workers)?;
    let collection = ctx.collection(kind);
    let stdin = std::io::stdin();

    let report = match kind {
        ShardKind::Users => run_shard_worker::<User, _>(stdin, collection, max_workers).await?,
        ShardKind::Statuses => run_shard_worker::<Status, _>(stdin, collection, max_workers).await?,
    };

    println!("{}", serde_json::to_string(&report)?);
    Ok(report)
}
