//! One-hop expansion of the changed set over two graph snapshots.
//!
//! Only the existence of outbound edges is compared between runs. A source
//! whose target set changes while staying non-empty is caught by its
//! modification marker, not here.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::storage::{Database, GraphStore, SharedDatabase};
use crate::types::{ContentId, Result, RunId};

/// Result of the diff stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    /// Sources that gained their first edge or lost their last one.
    pub flipped: BTreeSet<ContentId>,
    /// Seeds, flipped sources and their one-hop neighbours in either run.
    pub changed: BTreeSet<ContentId>,
}

/// Symmetric difference of two runs' source sets.
pub fn flipped_sources(previous: &HashSet<ContentId>, current: &HashSet<ContentId>) -> BTreeSet<ContentId> {
    previous.symmetric_difference(current).copied().collect()
}

pub struct GraphDiffExpander {
    db: SharedDatabase,
    batch_size: usize,
    max_concurrency: usize,
}

impl GraphDiffExpander {
    pub fn new(db: SharedDatabase, batch_size: usize, max_concurrency: usize) -> Self {
        Self {
            db,
            batch_size: batch_size.max(1),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Expand `seeds` against the edges of `current` and `previous`.
    pub async fn expand(
        &self,
        current: RunId,
        previous: Option<RunId>,
        seeds: &BTreeSet<ContentId>,
    ) -> Result<DiffOutcome> {
        let db = Arc::clone(&self.db);
        let (sources_prev, sources_current) = tokio::task::spawn_blocking(move || {
            let graph = GraphStore::new(&db);
            let prev = match previous {
                Some(run) => graph.sources(run)?,
                None => HashSet::new(),
            };
            Ok::<_, crate::types::RegenError>((prev, graph.sources(current)?))
        })
        .await??;

        let flipped = flipped_sources(&sources_prev, &sources_current);
        tracing::debug!(
            "Edge sources: {} previous, {} current, {} flipped",
            sources_prev.len(),
            sources_current.len(),
            flipped.len()
        );

        let mut changed: BTreeSet<ContentId> = seeds.union(&flipped).copied().collect();
        if changed.is_empty() {
            return Ok(DiffOutcome::default());
        }

        let runs: Arc<Vec<RunId>> = Arc::new(previous.into_iter().chain([current]).collect());
        let ids: Vec<ContentId> = changed.iter().copied().collect();
        let batches: Vec<Vec<ContentId>> = ids.chunks(self.batch_size).map(<[_]>::to_vec).collect();
        let batch_count = batches.len();

        let neighbours: Vec<HashSet<ContentId>> = stream::iter(batches)
            .map(|batch| {
                let db = Arc::clone(&self.db);
                let runs = Arc::clone(&runs);
                async move {
                    tokio::task::spawn_blocking(move || expand_batch(&db, &runs, &batch)).await?
                }
            })
            .buffer_unordered(self.max_concurrency)
            .try_collect()
            .await?;

        // Membership is only updated once every batch has returned.
        let before = changed.len();
        for found in neighbours {
            changed.extend(found);
        }
        tracing::debug!(
            "Expanded {} ids over {} batches: {} neighbours added",
            before,
            batch_count,
            changed.len() - before
        );

        Ok(DiffOutcome { flipped, changed })
    }
}

/// Sources citing, and targets cited by, any id in `batch` across `runs`.
fn expand_batch(db: &Database, runs: &[RunId], batch: &[ContentId]) -> Result<HashSet<ContentId>> {
    let graph = GraphStore::new(db);
    let mut found = graph.sources_citing(runs, batch)?;
    found.extend(graph.targets_cited_by(runs, batch)?);
    Ok(found)
}
