//! Init Command
//!
//! Initialize siteregen in the current directory.

use crate::cli::ui::Output;
use crate::cli::util::create_database;
use crate::config::ConfigLoader;
use crate::types::{RegenError, Result};

pub fn run(force: bool) -> Result<()> {
    let loader = ConfigLoader::current()?;

    if loader.is_project_initialized() && !force {
        return Err(RegenError::Config(
            "Already initialized. Use --force to overwrite.".to_string(),
        ));
    }

    let data_dir = loader.init_project(force)?;

    // Global config is optional; never overwrite it here
    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    let config = loader.load()?;
    let db_path = loader.database_path(&config);
    create_database(&db_path, &config)?;

    let out = Output::new();
    out.success(&format!("Initialized siteregen in {}", data_dir.display()));
    out.field("Database", db_path.display());
    out.field("Config", loader.project_config_path().display());
    println!();
    println!("Next steps:");
    println!("  1. Run 'siteregen import <file.json>' to load content");
    println!("  2. Run 'siteregen run' to compute what needs regenerating");

    Ok(())
}
