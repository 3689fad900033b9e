//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! The graph and diff stages never see these types; `Config` is converted into
//! the plain settings each stage needs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{concurrency, diff, retry, storage};
use crate::pipeline::PipelineSettings;
use crate::storage::{PoolConfig, RetryPolicy};
use crate::types::{RegenError, Result};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Database location and connection pool
    pub storage: StorageConfig,

    /// Batch sizing and worker limits
    pub pipeline: PipelineConfig,

    /// Backoff for transient write failures
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            storage: StorageConfig::default(),
            pipeline: PipelineConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `RegenError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            return Err(RegenError::Config(
                "pipeline.batch_size must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.max_concurrency == 0 {
            return Err(RegenError::Config(
                "pipeline.max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.retry.factor < 1.0 {
            return Err(RegenError::Config(format!(
                "retry.factor must be at least 1.0, got {}",
                self.retry.factor
            )));
        }

        if self.retry.min_delay_ms > self.retry.max_delay_ms {
            return Err(RegenError::Config(format!(
                "retry.min_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.min_delay_ms, self.retry.max_delay_ms
            )));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            min_delay: Duration::from_millis(self.retry.min_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            factor: self.retry.factor,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            batch_size: self.pipeline.batch_size,
            max_concurrency: self.pipeline.max_concurrency,
            retry: self.retry_policy(),
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::with_size(self.storage.pool_size).busy_timeout_ms(self.storage.busy_timeout_ms)
    }
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file, relative paths resolve against the project root
    pub database: PathBuf,

    /// Connection pool size (0 = based on CPU count)
    pub pool_size: u32,

    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(storage::DATA_DIR).join(storage::DATABASE_FILE),
            pool_size: 0,
            busy_timeout_ms: storage::BUSY_TIMEOUT_MS,
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Changed ids per neighbour query in the graph diff
    pub batch_size: usize,

    /// Concurrent diff batches and renderer calls
    pub max_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: diff::DEFAULT_BATCH_SIZE,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(concurrency::FALLBACK_MAX_CONCURRENCY),
        }
    }
}

// =============================================================================
// Retry
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: usize,

    /// First backoff delay
    pub min_delay_ms: u64,

    /// Upper bound for a single delay
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub factor: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: retry::MAX_RETRIES,
            min_delay_ms: retry::MIN_DELAY_MS,
            max_delay_ms: retry::MAX_DELAY_MS,
            factor: retry::FACTOR,
        }
    }
}
