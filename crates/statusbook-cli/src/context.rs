//! Shared state for one CLI invocation

use statusbook_ingest::config::IngestConfig;
use statusbook_ingest::shard::ShardKind;
use statusbook_ingest::store::{Collection, Store};
use statusbook_ingest::RecordService;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

/// Configuration plus the opened store
pub struct Context {
    pub config: IngestConfig,
    pub store: Store,
}

impl Context {
    /// Load configuration, apply the `--database` override and open the store
    pub fn open(database: Option<PathBuf>) -> Result<Self> {
        let mut config = IngestConfig::load()?;
        if let Some(database) = database {
            config.database = database;
        }
        Self::with_config(config)
    }

    pub fn with_config(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        let store = Store::open(&config.database)?;
        debug!(database = %config.database.display(), shareable = store.shareable, "Opened store");
        Ok(Self { config, store })
    }

    pub fn collection(&self, kind: ShardKind) -> Arc<dyn Collection> {
        match kind {
            ShardKind::Users => Arc::clone(&self.store.users),
            ShardKind::Statuses => Arc::clone(&self.store.statuses),
        }
    }

    pub fn records(&self) -> RecordService {
        RecordService::new(Arc::clone(&self.store.users), Arc::clone(&self.store.statuses))
    }

    /// Batch size for `kind`, or the command-line override
    pub fn batch_size(&self, kind: ShardKind, requested: Option<NonZeroUsize>) -> Result<NonZeroUsize> {
        if let Some(size) = requested {
            return Ok(size);
        }
        let size = match kind {
            ShardKind::Users => self.config.user_batch_size()?,
            ShardKind::Statuses => self.config.status_batch_size()?,
        };
        Ok(size)
    }

    pub fn max_workers(&self, requested: Option<NonZeroUsize>) -> Result<NonZeroUsize> {
        match requested {
            Some(workers) => Ok(workers),
            None => Ok(self.config.max_workers()?),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn memory_context() -> Context {
        Context::with_config(IngestConfig {
            database: PathBuf::from(":memory:"),
            user_batch_size: 7,
            status_batch_size: 11,
            max_workers: 3,
            ..IngestConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_batch_size_follows_config_per_kind() {
        let ctx = memory_context();
        assert_eq!(ctx.batch_size(ShardKind::Users, None).unwrap().get(), 7);
        assert_eq!(ctx.batch_size(ShardKind::Statuses, None).unwrap().get(), 11);
        assert_eq!(ctx.max_workers(None).unwrap().get(), 3);
    }

    #[test]
    fn test_command_line_overrides_config() {
        let ctx = memory_context();
        let five = NonZeroUsize::new(5);
        assert_eq!(ctx.batch_size(ShardKind::Users, five).unwrap().get(), 5);
        assert_eq!(ctx.max_workers(five).unwrap().get(), 5);
    }

    #[test]
    fn test_zero_config_value_is_rejected() {
        let result = Context::with_config(IngestConfig {
            database: PathBuf::from(":memory:"),
            max_workers: 0,
            ..IngestConfig::default()
        });
        assert!(result.is_err());
    }
}
