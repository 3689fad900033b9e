//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, ConfigLoader};
use crate::storage::{Database, SharedDatabase};
use crate::types::{RegenError, Result};

/// Command execution context
///
/// Provides unified access to common resources needed by CLI commands.
#[derive(Clone)]
pub struct CommandContext {
    /// Loader rooted at the project directory
    pub loader: ConfigLoader,
    /// Shared database handle
    pub db: SharedDatabase,
    /// Loaded configuration
    pub config: Config,
}

impl CommandContext {
    /// Load full command context
    ///
    /// Validates initialization, loads config, and opens the database.
    pub fn load() -> Result<Self> {
        let loader = ConfigLoader::current()?;
        require_initialized(&loader)?;
        let config = loader.load()?;
        let db = open_database(&loader.database_path(&config), &config)?;

        Ok(Self {
            loader,
            db: Arc::new(db),
            config,
        })
    }

    pub fn project_root(&self) -> &Path {
        self.loader.project_root()
    }

    pub fn db_path(&self) -> PathBuf {
        self.loader.database_path(&self.config)
    }
}

/// Require the project to be initialized
///
/// Returns the `.siteregen` directory, or `RegenError::NotInitialized`.
pub fn require_initialized(loader: &ConfigLoader) -> Result<PathBuf> {
    let data_dir = loader.project_dir();
    if !data_dir.exists() {
        return Err(RegenError::NotInitialized);
    }
    Ok(data_dir)
}

/// Open an existing database, applying pending migrations
pub fn open_database(path: &Path, config: &Config) -> Result<Database> {
    if !path.exists() {
        return Err(RegenError::NotInitialized);
    }

    let db = Database::open_with_config(path, config.pool_config())?;
    db.initialize()?;
    Ok(db)
}

/// Create and initialize the database
pub fn create_database(path: &Path, config: &Config) -> Result<Database> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::open_with_config(path, config.pool_config())?;
    db.initialize()?;
    Ok(db)
}
