//! Regeneration Pipeline
//!
//! One run is a strict barrier sequence:
//!
//! 1. Rebuild the run's reference graph (per-kind fan-out)
//! 2. Collect seeds, then diff the graph and audit tags
//! 3. Widen the set with feed and gallery neighbours
//! 4. Dispatch obligations and commit
//!
//! The changed set only exists in memory until step 4. The commit replaces the
//! persisted set and appends the run to the generation log in one
//! transaction, so a failed or cancelled run leaves the previous result intact.

pub mod adjacency;
pub mod dispatch;
pub mod progress;
pub mod seed;
pub mod tags;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

pub use adjacency::{Adjacency, FeedAdjacencyResolver};
pub use dispatch::{
    Artifact, ExecutionReport, Obligation, RegenerationDispatcher, RegenerationPlan, Renderer,
    RendererRegistry,
};
pub use progress::{BroadcastProgress, NullProgress, ProgressSink, TracingProgress};
pub use seed::{ChangeSeedCollector, SeedSet};
pub use tags::{TagAudit, TagVisibilityAuditor};

use crate::constants::{concurrency, diff};
use crate::graph::{BuildSummary, GraphDiffExpander, ReferenceGraphBuilder};
use crate::storage::{
    ChangedContentSet, GenerationLog, GraphStore, RetryPolicy, SharedDatabase, TagStore,
    change_set, run_log, with_retry,
};
use crate::types::{RegenError, Result, RunId};

/// Whether a run persists its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Commit,
    /// Compute everything, commit nothing.
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Seed every published item instead of only recent edits.
    pub full: bool,
}

/// Tuning knobs handed to the stages. Never the whole `Config`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: diff::DEFAULT_BATCH_SIZE,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(concurrency::FALLBACK_MAX_CONCURRENCY),
            retry: RetryPolicy::default(),
        }
    }
}

/// What one run found and did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: RunId,
    pub previous: Option<RunId>,
    pub options: RunOptions,
    pub graph: BuildSummary,
    pub seeds: usize,
    pub flipped: usize,
    pub tag_flips: BTreeSet<String>,
    pub feed_neighbours: usize,
    pub changed: ChangedContentSet,
    pub plan: RegenerationPlan,
    pub committed: bool,
}

pub struct RegenerationPipeline {
    db: SharedDatabase,
    settings: PipelineSettings,
    progress: Arc<dyn ProgressSink>,
}

impl RegenerationPipeline {
    pub fn new(db: SharedDatabase, settings: PipelineSettings) -> Self {
        Self {
            db,
            settings,
            progress: Arc::new(TracingProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Allocate a fresh run id and execute the run.
    pub async fn run(&self, options: RunOptions, cancel: &CancellationToken) -> Result<RunReport> {
        let db = Arc::clone(&self.db);
        let run = tokio::task::spawn_blocking(move || GenerationLog::new(&db).allocate(Utc::now()))
            .await??;
        self.run_with_id(run, options, cancel).await
    }

    /// Execute a run under a caller-chosen id.
    ///
    /// The id must be newer than every committed run.
    pub async fn run_with_id(
        &self,
        run: RunId,
        options: RunOptions,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let previous = self.prepare(run).await?;
        self.progress.report(&match previous {
            Some(prev) => format!("Run {} (previous {})", run, prev),
            None => format!("Run {} (first run)", run),
        });
        ensure_active(cancel)?;

        // Stage 1: graph
        self.progress.report("Building reference graph");
        let graph = ReferenceGraphBuilder::new(Arc::clone(&self.db), self.settings.retry)
            .build(run)
            .await?;
        ensure_active(cancel)?;

        // Stage 2: seeds, then graph diff and tag audit side by side
        self.progress.report("Collecting changed content");
        let since = if options.full { None } else { previous };
        let seeds = ChangeSeedCollector::new(Arc::clone(&self.db))
            .collect(since)
            .await?
            .ids();
        ensure_active(cancel)?;

        self.progress.report("Diffing reference graph and tag visibility");
        let expander = GraphDiffExpander::new(
            Arc::clone(&self.db),
            self.settings.batch_size,
            self.settings.max_concurrency,
        );
        let auditor = TagVisibilityAuditor::new(Arc::clone(&self.db), self.settings.retry);
        let (diff, tags) = futures::try_join!(
            expander.expand(run, previous, &seeds),
            auditor.audit(run, previous)
        )?;
        ensure_active(cancel)?;

        let mut ids = diff.changed;
        ids.extend(tags.affected.iter().copied());

        // Stage 3: adjacency
        self.progress.report("Resolving feed and gallery adjacency");
        let adjacency = FeedAdjacencyResolver::new(Arc::clone(&self.db))
            .resolve(&ids)
            .await?;
        ensure_active(cancel)?;

        let feed_neighbours = adjacency.feed_neighbours.len();
        ids.extend(adjacency.feed_neighbours);
        let changed = ChangedContentSet {
            ids,
            gallery_dates: adjacency.gallery_dates,
        };

        // Stage 4: dispatch and commit
        self.progress.report("Planning regeneration");
        let plan = RegenerationDispatcher::new(Arc::clone(&self.db))
            .plan(run, &changed)
            .await?;
        ensure_active(cancel)?;

        let committed = match options.mode {
            RunMode::Commit => {
                self.commit(run, &changed).await?;
                true
            }
            RunMode::DryRun => false,
        };

        self.progress.report(&format!(
            "{} {} changed items, {} gallery dates, {} obligations",
            if committed { "Committed" } else { "Dry run:" },
            changed.len(),
            changed.gallery_dates.len(),
            plan.len()
        ));

        Ok(RunReport {
            run,
            previous,
            options,
            graph,
            seeds: seeds.len(),
            flipped: diff.flipped.len(),
            tag_flips: tags.flipped_labels,
            feed_neighbours,
            changed,
            plan,
            committed,
        })
    }

    /// Drop leftovers of uncommitted runs and resolve the previous run.
    async fn prepare(&self, run: RunId) -> Result<Option<RunId>> {
        let db = Arc::clone(&self.db);
        let pruned = with_retry(&self.settings.retry, "prune uncommitted runs", move || {
            Ok(GraphStore::new(&db).prune_uncommitted()? + TagStore::new(&db).prune_uncommitted()?)
        })
        .await?;
        if pruned > 0 {
            tracing::debug!("Pruned {} rows left by uncommitted runs", pruned);
        }

        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let log = GenerationLog::new(&db);
            if let Some(latest) = log.latest()?
                && run <= latest
            {
                return Err(RegenError::NonMonotonicRun { run, latest });
            }
            log.previous_run(run)
        })
        .await?
    }

    async fn commit(&self, run: RunId, changed: &ChangedContentSet) -> Result<()> {
        let db = Arc::clone(&self.db);
        let changed = Arc::new(changed.clone());
        with_retry(&self.settings.retry, "commit", move || {
            db.transaction(|conn| {
                change_set::replace_in(conn, &changed)?;
                run_log::record_in(conn, run, Utc::now())
            })
        })
        .await?;
        tracing::info!("Committed run {}", run);
        Ok(())
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        tracing::warn!("Run cancelled; previous results stay authoritative");
        return Err(RegenError::Cancelled);
    }
    Ok(())
}
