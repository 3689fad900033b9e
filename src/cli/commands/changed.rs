//! Changed Command
//!
//! Print the committed changed set, optionally as the obligations it implies.

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::pipeline::RegenerationDispatcher;
use crate::storage::{ChangeSetStore, ContentStore, GenerationLog};
use crate::types::{Result, RunId};

pub async fn run(format: &str, plan: bool) -> Result<()> {
    let ctx = CommandContext::load()?;

    let db = ctx.db.clone();
    let (changed, latest, kinds) = tokio::task::spawn_blocking(move || -> Result<_> {
        let changed = ChangeSetStore::new(&db).load()?;
        let latest = GenerationLog::new(&db).latest()?;
        let store = ContentStore::new(&db);
        let mut kinds = Vec::with_capacity(changed.ids.len());
        for id in &changed.ids {
            kinds.push((*id, store.kind_of(*id)?));
        }
        Ok((changed, latest, kinds))
    })
    .await??;

    if format == "json" {
        let listing = serde_json::json!({
            "run": latest.map(|run| run.get()),
            "ids": kinds
                .iter()
                .map(|(id, kind)| serde_json::json!({ "id": id, "kind": kind }))
                .collect::<Vec<_>>(),
            "gallery_dates": changed
                .gallery_dates
                .iter()
                .map(|date| date.to_string())
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    let out = Output::new();
    if changed.is_empty() && changed.gallery_dates.is_empty() {
        out.info("Changed set is empty");
        return Ok(());
    }

    if plan {
        let run = latest.unwrap_or(RunId::new(0));
        let plan = RegenerationDispatcher::new(ctx.db.clone())
            .plan(run, &changed)
            .await?;
        out.section(&format!("{} obligations", plan.len()));
        for obligation in plan.obligations() {
            out.item(obligation);
        }
        return Ok(());
    }

    out.section(&format!("{} changed items", changed.len()));
    for (id, kind) in &kinds {
        match kind {
            Some(kind) => out.item(format!("{:<10} {}", kind.as_str(), id)),
            None => out.item(format!("{:<10} {}", "removed", id)),
        }
    }
    if !changed.gallery_dates.is_empty() {
        out.section("Gallery dates");
        for date in &changed.gallery_dates {
            out.item(date);
        }
    }

    Ok(())
}
