//! Config Command
//!
//! Manage siteregen configuration.
//!
//! Usage:
//!   siteregen config show [-g] [-f json]
//!   siteregen config path
//!   siteregen config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::{ConfigLoader, ENV_PREFIX};
use crate::types::{RegenError, Result};

/// Show configuration
pub fn show(global: bool, format: &str) -> Result<()> {
    if global {
        match ConfigLoader::global_config_path() {
            Some(path) if path.exists() => {
                println!("# Global Config: {}\n", path.display());
                println!("{}", std::fs::read_to_string(&path)?);
            }
            Some(_) => {
                println!("No global config found.");
                println!("Run 'siteregen config init --global' to create one.");
            }
            None => println!("Cannot determine global config directory."),
        }
        return Ok(());
    }

    // Merged effective config
    let config = ConfigLoader::current()?.load()?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let rendered =
            toml::to_string_pretty(&config).map_err(|e| RegenError::Config(e.to_string()))?;
        println!("{}", rendered);
    }
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    let loader = ConfigLoader::current()?;
    let config = loader.load()?;
    let out = Output::new();

    out.section("Configuration paths");
    match ConfigLoader::global_config_path() {
        Some(path) => out.field("Global", mark_exists(&path)),
        None => out.field("Global", "unavailable"),
    }
    out.field("Project", mark_exists(&loader.project_config_path()));
    out.field("Database", mark_exists(&loader.database_path(&config)));
    out.field("Env prefix", format!("{}*", ENV_PREFIX));
    Ok(())
}

fn mark_exists(path: &std::path::Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (missing)", path.display())
    }
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let path = ConfigLoader::init_global(force)?;
    Output::new().success(&format!("Global configuration at {}", path.display()));
    Ok(())
}

/// Initialize project configuration
pub fn init_project(force: bool) -> Result<()> {
    let loader = ConfigLoader::current()?;
    loader.init_project(force)?;
    Output::new().success(&format!(
        "Project configuration at {}",
        loader.project_config_path().display()
    ));
    Ok(())
}
