//! Status Command
//!
//! Display content counts, the latest run and the committed changed set.

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::kinds;
use crate::storage::{ChangeSetStore, GenerationLog, TagStore};
use crate::types::Result;

pub fn run(format: &str) -> Result<()> {
    let json_output = format == "json";

    let loader = ConfigLoader::current()?;
    if !loader.is_project_initialized() {
        if json_output {
            println!("{{\"status\": \"not_initialized\"}}");
        } else {
            Output::new().info("Not initialized. Run 'siteregen init' first.");
        }
        // Informational command, not an error
        return Ok(());
    }

    let ctx = CommandContext::load()?;
    let db = &ctx.db;

    let mut content = Vec::with_capacity(kinds::all().len());
    for descriptor in kinds::all() {
        content.push((descriptor.kind, db.count(descriptor.table)?));
    }
    let edges = db.count("reference_edge")?;
    let latest = GenerationLog::new(db).latest()?;
    let changed = ChangeSetStore::new(db).load()?;
    let excluded_tags = TagStore::new(db)
        .labels()?
        .into_iter()
        .filter(|(_, excluded)| *excluded)
        .count();

    if json_output {
        let status = serde_json::json!({
            "status": "initialized",
            "database": ctx.db_path(),
            "content": content
                .iter()
                .map(|(kind, count)| (kind.as_str(), count))
                .collect::<std::collections::BTreeMap<_, _>>(),
            "edges": edges,
            "latest_run": latest.map(|run| run.get()),
            "changed": changed.len(),
            "gallery_dates": changed.gallery_dates.len(),
            "excluded_tags": excluded_tags,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let out = Output::new();
    out.section("siteregen status");
    out.field("Database", ctx.db_path().display());
    out.field(
        "Latest run",
        latest
            .map(|run| format!("{} ({})", run, run.as_datetime().to_rfc3339()))
            .unwrap_or_else(|| "never".to_string()),
    );
    out.field("Reference edges", edges);
    out.field("Changed items", changed.len());
    out.field("Gallery dates", changed.gallery_dates.len());
    out.field("Excluded tags", excluded_tags);

    out.section("Content");
    for (kind, count) in content.iter().filter(|(_, count)| *count > 0) {
        out.field(kind.as_str(), count);
    }

    Ok(())
}
