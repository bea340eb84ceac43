//! Statusbook CLI Library
//!
//! Command-line interface for loading and editing user accounts and status
//! updates.
//!
//! # Overview
//!
//! - **Interactive menu**: every record operation behind a prompt (`statusbook menu`)
//! - **Bulk loading**: `statusbook load-users` / `statusbook load-statuses`
//! - **Worker processes**: the hidden `shard-worker` command the process pool spawns

pub mod commands;
pub mod context;
pub mod error;
pub mod menu;

pub use context::Context;
pub use error::{CliError, Result};

use clap::{Parser, Subcommand, ValueEnum};
use statusbook_ingest::shard::ShardKind;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Statusbook - user accounts and status updates
#[derive(Parser, Debug)]
#[command(name = "statusbook")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute (defaults to the interactive menu)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database file, or ":memory:" for a store that lives only as long as the process
    #[arg(long, env = "STATUSBOOK_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Print the command reference as markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive menu
    Menu,

    /// Load user accounts from a CSV file
    LoadUsers(LoadArgs),

    /// Load status updates from a CSV file
    LoadStatuses(LoadArgs),

    /// Load one CSV chunk read from stdin (spawned by the process pool)
    #[command(hide = true)]
    ShardWorker {
        /// Record kind of the chunk
        #[arg(long, value_enum)]
        kind: KindArg,

        /// Batches in flight at once
        #[arg(long)]
        max_workers: Option<NonZeroUsize>,
    },
}

/// Options shared by the load commands
#[derive(clap::Args, Debug, Clone)]
pub struct LoadArgs {
    /// CSV file with a header row
    pub file: PathBuf,

    /// How batches are submitted
    #[arg(short, long, value_enum, default_value_t = Strategy::Concurrent)]
    pub strategy: Strategy,

    /// Records per insert batch
    #[arg(short, long)]
    pub batch_size: Option<NonZeroUsize>,

    /// Batches in flight at once (concurrent) or per worker process (processes)
    #[arg(long)]
    pub max_workers: Option<NonZeroUsize>,
}

/// Load strategy selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One batch at a time; stops at the first failed batch
    Sequential,
    /// Bounded pool of tasks in this process
    Concurrent,
    /// One worker process per file chunk (needs a database file)
    Processes,
}

/// Record kind accepted by `shard-worker`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Users,
    Statuses,
}

impl From<KindArg> for ShardKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Users => ShardKind::Users,
            KindArg::Statuses => ShardKind::Statuses,
        }
    }
}
