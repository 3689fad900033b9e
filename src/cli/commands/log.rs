//! Log Command
//!
//! List committed runs, newest first.

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::storage::GenerationLog;
use crate::types::Result;

pub fn run(limit: usize) -> Result<()> {
    let ctx = CommandContext::load()?;
    let runs = GenerationLog::new(&ctx.db).runs(limit)?;

    let out = Output::new();
    if runs.is_empty() {
        out.info("No runs committed yet");
        return Ok(());
    }

    out.section("Generation log");
    for logged in runs {
        out.item(format!(
            "{}  started {}  completed {}",
            logged.run,
            logged.run.as_datetime().format("%Y-%m-%d %H:%M:%S"),
            logged.completed_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    Ok(())
}
