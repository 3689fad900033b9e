//! Run Command
//!
//! Executes one regeneration run and prints the resulting plan.
//! Ctrl-C cancels the run before it commits.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::CommandContext;
use crate::cli::progress::ConsoleRenderer;
use crate::cli::ui::Output;
use crate::pipeline::{
    BroadcastProgress, NullProgress, ProgressSink, RegenerationPipeline, RunMode, RunOptions,
    RunReport,
};
use crate::types::{RegenError, Result};

pub async fn run(dry_run: bool, full: bool, quiet: bool, show_plan: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let options = RunOptions {
        mode: if dry_run { RunMode::DryRun } else { RunMode::Commit },
        full,
    };

    let cancel = CancellationToken::new();
    let signal = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        }
    });

    let mut renderer = None;
    let sink: Arc<dyn ProgressSink> = if quiet {
        Arc::new(NullProgress)
    } else {
        let progress = BroadcastProgress::new();
        renderer = Some(ConsoleRenderer::new(&progress).spawn());
        Arc::new(progress)
    };

    let pipeline = RegenerationPipeline::new(ctx.db.clone(), ctx.config.pipeline_settings())
        .with_progress(sink);
    let result = pipeline.run(options, &cancel).await;

    // Dropping the last sender lets the renderer drain and exit
    drop(pipeline);
    if let Some(renderer) = renderer {
        let _ = renderer.await;
    }
    signal.abort();

    let out = Output::quiet(quiet);
    let report = match result {
        Ok(report) => report,
        Err(RegenError::Cancelled) => {
            out.error("Run cancelled, the previous changed set is unchanged");
            return Err(RegenError::Cancelled);
        }
        Err(e) => return Err(e),
    };
    print_report(&out, &report, show_plan);
    Ok(())
}

fn print_report(out: &Output, report: &RunReport, show_plan: bool) {
    out.section(&format!("Run {}", report.run));
    out.field(
        "Previous run",
        report
            .previous
            .map(|run| run.to_string())
            .unwrap_or_else(|| "none".to_string()),
    );
    out.field(
        "Graph",
        format!(
            "{} items, {} edges",
            report.graph.items(),
            report.graph.edges
        ),
    );
    out.field("Seeds", report.seeds);
    out.field("Flipped sources", report.flipped);
    out.field("Feed neighbours", report.feed_neighbours);
    if !report.tag_flips.is_empty() {
        out.field(
            "Tag flips",
            report.tag_flips.iter().cloned().collect::<Vec<_>>().join(", "),
        );
    }
    out.field("Changed items", report.changed.len());
    out.field("Gallery dates", report.changed.gallery_dates.len());
    out.field("Obligations", report.plan.len());

    if show_plan {
        out.section("Plan");
        for obligation in report.plan.obligations() {
            out.item(obligation);
        }
    }

    if report.committed {
        out.success("Changed set committed");
    } else {
        out.info("Dry run: nothing committed");
    }
}
