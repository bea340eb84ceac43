//! Statusbook Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Bulk CSV loading and record operations for user accounts and status
//! updates.
//!
//! # Components
//!
//! - **Store**: the [`Collection`](store::Collection) interface with in-memory
//!   and SQLite backends
//! - **Normalizer**: raw CSV rows to persisted documents
//! - **Partitioner**: fixed-size batches and lazy file chunks
//! - **Loader**: duplicate-tolerant unordered batch inserts, run sequentially
//!   or on a bounded pool of tasks
//! - **Shard driver**: the shared fan-out used by the task pool and the
//!   worker-process pool
//! - **Record service**: single-record CRUD with the owner rule and cascade
//!   delete
//!
//! # Example
//!
//! ```no_run
//! use statusbook_ingest::loader::LoadStrategy;
//! use statusbook_ingest::pipeline;
//! use statusbook_ingest::store::Store;
//! use std::num::NonZeroUsize;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Store::open(Path::new("statusbook.db"))?;
//!     let report = pipeline::load_users(
//!         Path::new("accounts.csv"),
//!         store.users.clone(),
//!         NonZeroUsize::new(32).unwrap(),
//!         LoadStrategy::Sequential,
//!     )
//!     .await?;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod loader;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod service;
pub mod shard;
pub mod store;

pub use loader::{LoadReport, LoadStrategy};
pub use service::{RecordService, WriteOutcome};
