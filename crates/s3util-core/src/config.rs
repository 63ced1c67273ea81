//! Transfer configuration
//!
//! Passed explicitly into the orchestrator; nothing here is process-global.

use serde::{Deserialize, Serialize};

use crate::storage::StorageConfig;

// ============================================================================
// Transfer Configuration Constants
// ============================================================================

/// Default number of concurrent transfer workers.
pub const DEFAULT_PARALLELISM: usize = 8;

/// Environment variable overriding the worker count.
pub const PARALLELISM_ENV: &str = "S3UTIL_PARALLELISM";

/// Settings for one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Maximum number of jobs in flight at once
    pub parallelism: usize,

    /// Settings used when constructing the S3 client
    pub storage: StorageConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            storage: StorageConfig::default(),
        }
    }
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment and defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let parallelism = match std::env::var(PARALLELISM_ENV) {
            Ok(value) => value.trim().parse().map_err(|_| {
                anyhow::anyhow!("{} must be a positive integer, got '{}'", PARALLELISM_ENV, value)
            })?,
            Err(_) => DEFAULT_PARALLELISM,
        };

        let config = Self {
            parallelism,
            storage: StorageConfig::from_env(),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Worker count actually used by the pool, never below one
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.max(1)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.parallelism == 0 {
            anyhow::bail!("Parallelism must be greater than 0");
        }

        self.storage.validate()
    }
}
