//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Graph diff expansion constants
pub mod diff {
    /// Number of changed ids per neighbour query
    pub const DEFAULT_BATCH_SIZE: usize = 500;
}

/// Retry schedule for transient write failures (lock contention)
pub mod retry {
    /// Retries after the first attempt (delays 1s, 2s, 4s)
    pub const MAX_RETRIES: usize = 3;

    /// Delay before the first retry (milliseconds)
    pub const MIN_DELAY_MS: u64 = 1_000;

    /// Upper bound on a single delay (milliseconds)
    pub const MAX_DELAY_MS: u64 = 4_000;

    /// Backoff multiplier
    pub const FACTOR: f32 = 2.0;
}

/// Storage constants
pub mod storage {
    /// Project data directory
    pub const DATA_DIR: &str = ".siteregen";

    /// Database file name inside the data directory
    pub const DATABASE_FILE: &str = "regen.db";

    /// SQLite busy timeout (milliseconds)
    pub const BUSY_TIMEOUT_MS: u64 = 5_000;
}

/// Concurrency constants
pub mod concurrency {
    /// Fallback worker limit when available parallelism is unknown
    pub const FALLBACK_MAX_CONCURRENCY: usize = 4;

    /// Capacity of the progress broadcast channel
    pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;
}
