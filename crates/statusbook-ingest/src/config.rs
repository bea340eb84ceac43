//! Configuration management

use statusbook_common::{Result, StatusbookError};
use std::num::NonZeroUsize;
use std::path::PathBuf;

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Default database file.
pub const DEFAULT_DATABASE: &str = "statusbook.db";

/// Default number of user accounts per insert batch.
pub const DEFAULT_USER_BATCH_SIZE: usize = 32;

/// Default number of status updates per insert batch.
pub const DEFAULT_STATUS_BATCH_SIZE: usize = 100;

/// Default number of batches in flight at once.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default number of rows handed to each worker process.
pub const DEFAULT_SHARD_ROWS: usize = 1000;

/// Ingestion configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Database file, or `:memory:` for the in-memory store
    pub database: PathBuf,
    pub user_batch_size: usize,
    pub status_batch_size: usize,
    pub max_workers: usize,
    pub shard_rows: usize,
    pub max_processes: usize,
}

impl IngestConfig {
    /// Load configuration from `.env`, environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = IngestConfig {
            database: std::env::var("STATUSBOOK_DATABASE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATABASE)),
            user_batch_size: env_usize("STATUSBOOK_USER_BATCH_SIZE").unwrap_or(DEFAULT_USER_BATCH_SIZE),
            status_batch_size: env_usize("STATUSBOOK_STATUS_BATCH_SIZE").unwrap_or(DEFAULT_STATUS_BATCH_SIZE),
            max_workers: env_usize("STATUSBOOK_MAX_WORKERS").unwrap_or(DEFAULT_MAX_WORKERS),
            shard_rows: env_usize("STATUSBOOK_SHARD_ROWS").unwrap_or(DEFAULT_SHARD_ROWS),
            max_processes: env_usize("STATUSBOOK_MAX_PROCESSES").unwrap_or_else(default_max_processes),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.as_os_str().is_empty() {
            return Err(StatusbookError::config("Database location cannot be empty"));
        }

        for (name, value) in [
            ("user_batch_size", self.user_batch_size),
            ("status_batch_size", self.status_batch_size),
            ("max_workers", self.max_workers),
            ("shard_rows", self.shard_rows),
            ("max_processes", self.max_processes),
        ] {
            if value == 0 {
                return Err(StatusbookError::config(format!("{} must be greater than 0", name)));
            }
        }

        Ok(())
    }

    pub fn user_batch_size(&self) -> Result<NonZeroUsize> {
        non_zero("user_batch_size", self.user_batch_size)
    }

    pub fn status_batch_size(&self) -> Result<NonZeroUsize> {
        non_zero("status_batch_size", self.status_batch_size)
    }

    pub fn max_workers(&self) -> Result<NonZeroUsize> {
        non_zero("max_workers", self.max_workers)
    }

    pub fn shard_rows(&self) -> Result<NonZeroUsize> {
        non_zero("shard_rows", self.shard_rows)
    }

    pub fn max_processes(&self) -> Result<NonZeroUsize> {
        non_zero("max_processes", self.max_processes)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            user_batch_size: DEFAULT_USER_BATCH_SIZE,
            status_batch_size: DEFAULT_STATUS_BATCH_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            shard_rows: DEFAULT_SHARD_ROWS,
            max_processes: default_max_processes(),
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn default_max_processes() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

fn non_zero(name: &str, value: usize) -> Result<NonZeroUsize> {
    NonZeroUsize::new(value).ok_or_else(|| StatusbookError::config(format!("{} must be greater than 0", name)))
}
