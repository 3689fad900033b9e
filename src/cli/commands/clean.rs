//! Clean Command
//!
//! Prunes history older than the most recent runs, or removes all data.
//! The latest committed run is always kept since the next run diffs against it.

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::cli::util::require_initialized;
use crate::config::ConfigLoader;
use crate::storage::{Database, GenerationLog, GraphStore, TagStore};
use crate::types::{Result, RunId};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PruneSummary {
    /// Oldest run kept, if anything was pruned
    pub kept_from: Option<RunId>,
    pub runs: usize,
    pub edges: usize,
    pub tag_records: usize,
}

/// Keep the `keep` newest runs (at least one) and their snapshots.
pub fn prune_history(db: &Database, keep: usize) -> Result<PruneSummary> {
    let keep = keep.max(1);
    let recent = GenerationLog::new(db).runs(keep)?;
    let Some(oldest_kept) = recent.last().map(|logged| logged.run) else {
        return Ok(PruneSummary::default());
    };

    let edges = GraphStore::new(db).prune_before(oldest_kept)?;
    let tag_records = TagStore::new(db).prune_before(oldest_kept)?;
    let runs = GenerationLog::new(db).prune_before(oldest_kept)?;

    tracing::debug!(
        "Pruned {} runs, {} edges, {} tag records before {}",
        runs,
        edges,
        tag_records,
        oldest_kept
    );

    Ok(PruneSummary {
        kept_from: Some(oldest_kept),
        runs,
        edges,
        tag_records,
    })
}

pub async fn run(all: bool, keep: usize) -> Result<()> {
    let out = Output::new();

    if all {
        let loader = ConfigLoader::current()?;
        let data_dir = require_initialized(&loader)?;
        tokio::fs::remove_dir_all(&data_dir).await?;
        out.success(&format!("Removed {}", data_dir.display()));
        return Ok(());
    }

    let ctx = CommandContext::load()?;
    let db = ctx.db.clone();
    let summary = tokio::task::spawn_blocking(move || prune_history(&db, keep)).await??;

    match summary.kept_from {
        Some(run) => out.success(&format!(
            "Pruned {} runs, {} edges, {} tag records older than {}",
            summary.runs, summary.edges, summary.tag_records, run
        )),
        None => out.info("No runs committed yet"),
    }

    Ok(())
}
