//! Rebuilds one run's slice of the reference graph.
//!
//! Every kind is scanned on its own blocking worker. Each worker returns its
//! own edge list; the lists are concatenated only after all workers finish,
//! and the run's slice is then replaced in a single transaction.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;

use super::parser;
use crate::kinds::{self, KindDescriptor};
use crate::storage::{ContentStore, Database, GraphStore, RetryPolicy, SharedDatabase, with_retry};
use crate::types::{ContentId, ContentItem, ContentKind, ReferenceEdge, RegenError, Result, RunId};

/// Outcome of one graph rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Published items scanned, per kind.
    pub scanned: Vec<(ContentKind, usize)>,
    /// Distinct edges written for the run.
    pub edges: usize,
}

impl BuildSummary {
    pub fn items(&self) -> usize {
        self.scanned.iter().map(|(_, n)| n).sum()
    }
}

/// Everything `item` cites: its main picture (unless it is the item itself),
/// its structured links, and every id named in its searchable text.
pub fn outbound_references(descriptor: &KindDescriptor, item: &ContentItem) -> HashSet<ContentId> {
    let mut refs = HashSet::new();

    if let Some(picture) = item.main_picture
        && picture != item.id
    {
        refs.insert(picture);
    }

    refs.extend(descriptor.structured_references(item).iter().copied());

    for text in descriptor.searchable_text(item) {
        parser::collect_into(text, &mut refs);
    }

    refs
}

pub struct ReferenceGraphBuilder {
    db: SharedDatabase,
    retry: RetryPolicy,
}

impl ReferenceGraphBuilder {
    pub fn new(db: SharedDatabase, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Scan every kind and replace `run`'s edges.
    ///
    /// A failed scan of any kind fails the whole build and nothing is written.
    pub async fn build(&self, run: RunId) -> Result<BuildSummary> {
        let scans = kinds::all().iter().map(|descriptor| {
            let db = Arc::clone(&self.db);
            async move {
                let kind = descriptor.kind;
                match tokio::task::spawn_blocking(move || scan_kind(&db, descriptor, run)).await {
                    Ok(scan) => scan.map_err(|e| RegenError::kind_scan(kind, e.to_string())),
                    Err(join) => Err(RegenError::kind_scan(kind, join.to_string())),
                }
            }
        });

        let per_kind = try_join_all(scans).await?;

        let mut scanned = Vec::with_capacity(per_kind.len());
        let mut edges = Vec::new();
        for (kind, items, kind_edges) in per_kind {
            tracing::debug!("{}: {} items, {} edges", kind, items, kind_edges.len());
            scanned.push((kind, items));
            edges.extend(kind_edges);
        }

        let edges = Arc::new(edges);
        let db = Arc::clone(&self.db);
        let written = with_retry(&self.retry, "edge rebuild", move || {
            GraphStore::new(&db).replace_run_edges(run, &edges)
        })
        .await?;

        let summary = BuildSummary {
            scanned,
            edges: written,
        };
        tracing::info!(
            "Reference graph for run {}: {} items, {} edges",
            run,
            summary.items(),
            summary.edges
        );
        Ok(summary)
    }
}

fn scan_kind(
    db: &Database,
    descriptor: &KindDescriptor,
    run: RunId,
) -> Result<(ContentKind, usize, Vec<ReferenceEdge>)> {
    let items = ContentStore::new(db).load_published(descriptor)?;

    let edges = items
        .iter()
        .flat_map(|item| {
            outbound_references(descriptor, item)
                .into_iter()
                .map(move |target| ReferenceEdge::new(item.id, target, run))
        })
        .collect();

    Ok((descriptor.kind, items.len(), edges))
}
