//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (platform config dir, e.g. ~/.config/siteregen/config.toml)
//! 3. Project config (.siteregen/config.toml)
//! 4. Environment variables (SITEREGEN_* prefix, `__` between sections)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::constants::storage;
use crate::types::{RegenError, Result};

/// Environment variable prefix, e.g. `SITEREGEN_PIPELINE__BATCH_SIZE`
pub const ENV_PREFIX: &str = "SITEREGEN_";

const CONFIG_FILE: &str = "config.toml";

/// Configuration loader rooted at one project directory
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    project_root: PathBuf,
    global_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            global_path: Self::global_config_path(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Loader for the current directory
    pub fn current() -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// Skip the user-wide config file
    pub fn without_global(mut self) -> Self {
        self.global_path = None;
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load(&self) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = &self.global_path
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        let project_path = self.project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // SITEREGEN_RETRY__MAX_RETRIES -> retry.max_retries
        figment = figment.merge(Env::prefixed(&self.env_prefix).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| RegenError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| RegenError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Platform config directory for siteregen
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "siteregen").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Project data directory (.siteregen)
    pub fn project_dir(&self) -> PathBuf {
        self.project_root.join(storage::DATA_DIR)
    }

    pub fn project_config_path(&self) -> PathBuf {
        self.project_dir().join(CONFIG_FILE)
    }

    /// Resolve the configured database path against the project root
    pub fn database_path(&self, config: &Config) -> PathBuf {
        if config.storage.database.is_absolute() {
            config.storage.database.clone()
        } else {
            self.project_root.join(&config.storage.database)
        }
    }

    pub fn is_project_initialized(&self) -> bool {
        self.project_dir().exists()
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Create the project data directory and a default config file
    pub fn init_project(&self, force: bool) -> Result<PathBuf> {
        let project_dir = self.project_dir();
        fs::create_dir_all(&project_dir)?;

        let config_path = self.project_config_path();
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config_toml()?)?;
            info!("Created project config: {}", config_path.display());
        }

        Ok(project_dir)
    }

    /// Create the global config file
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            RegenError::Config("Cannot determine global config directory".to_string())
        })?;
        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join(CONFIG_FILE);
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config_toml()?)?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Default configuration rendered as commented TOML
    fn default_config_toml() -> Result<String> {
        let body = toml::to_string_pretty(&Config::default())
            .map_err(|e| RegenError::Config(e.to_string()))?;
        Ok(format!(
            "# siteregen configuration\n\
             # Environment variables override this file, e.g. SITEREGEN_PIPELINE__BATCH_SIZE=1000\n\n{}",
            body
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::new(dir.path())
            .without_global()
            .with_env_prefix("SITEREGEN_TEST_UNUSED_")
    }

    #[test]
    fn test_load_default_config() {
        let dir = TempDir::new().unwrap();
        let config = loader(&dir).load().unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.pipeline.batch_size, 500);
    }

    #[test]
    fn test_init_project_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let loader = loader(&dir);

        let project_dir = loader.init_project(false).unwrap();
        assert!(project_dir.ends_with(".siteregen"));
        assert!(loader.project_config_path().exists());
        assert!(loader.is_project_initialized());

        let config = ConfigLoader::load_from_file(&loader.project_config_path()).unwrap();
        assert_eq!(config.retry, Config::default().retry);
    }

    #[test]
    fn test_project_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let loader = loader(&dir);
        fs::create_dir_all(loader.project_dir()).unwrap();
        fs::write(
            loader.project_config_path(),
            "[pipeline]\nbatch_size = 50\n\n[storage]\ndatabase = \"data/site.db\"\n",
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.pipeline.batch_size, 50);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(loader.database_path(&config), dir.path().join("data/site.db"));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let loader = loader(&dir);
        fs::create_dir_all(loader.project_dir()).unwrap();
        fs::write(loader.project_config_path(), "[pipeline]\nbatch_size = 0\n").unwrap();

        assert!(matches!(loader.load(), Err(RegenError::Config(_))));
    }

    #[test]
    fn test_env_override() {
        let dir = TempDir::new().unwrap();
        // SAFETY: the prefix is unique to this test
        unsafe {
            std::env::set_var("SITEREGEN_TEST_ENV_RETRY__MAX_RETRIES", "7");
        }
        let config = ConfigLoader::new(dir.path())
            .without_global()
            .with_env_prefix("SITEREGEN_TEST_ENV_")
            .load()
            .unwrap();
        unsafe {
            std::env::remove_var("SITEREGEN_TEST_ENV_RETRY__MAX_RETRIES");
        }
        assert_eq!(config.retry.max_retries, 7);
    }
}
