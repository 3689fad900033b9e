//! Seed collection: what changed since the last completed run.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::try_join_all;

use crate::kinds;
use crate::storage::{ContentStore, SharedDatabase};
use crate::types::{ContentId, ContentKind, RegenError, Result, RunId};

/// Per-kind seeds plus removals, before they are unioned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSet {
    pub per_kind: Vec<(ContentKind, BTreeSet<ContentId>)>,
    pub removed: BTreeSet<ContentId>,
}

impl SeedSet {
    pub fn ids(&self) -> BTreeSet<ContentId> {
        self.per_kind
            .iter()
            .flat_map(|(_, ids)| ids.iter().copied())
            .chain(self.removed.iter().copied())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.per_kind.iter().all(|(_, ids)| ids.is_empty())
    }
}

pub struct ChangeSeedCollector {
    db: SharedDatabase,
}

impl ChangeSeedCollector {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Published items modified after `since`, and items removed after it.
    ///
    /// `since = None` seeds every published item.
    pub async fn collect(&self, since: Option<RunId>) -> Result<SeedSet> {
        let workers = kinds::all().iter().map(|descriptor| {
            let db = Arc::clone(&self.db);
            async move {
                let kind = descriptor.kind;
                let scan = tokio::task::spawn_blocking(move || {
                    ContentStore::new(&db).published_modified_after(descriptor, since)
                })
                .await;
                match scan {
                    Ok(ids) => ids
                        .map(|ids| (kind, ids.into_iter().collect::<BTreeSet<_>>()))
                        .map_err(|e| RegenError::kind_scan(kind, e.to_string())),
                    Err(join) => Err(RegenError::kind_scan(kind, join.to_string())),
                }
            }
        });

        let db = Arc::clone(&self.db);
        let removed = async move {
            tokio::task::spawn_blocking(move || ContentStore::new(&db).removed_after(since)).await?
        };

        let (per_kind, removed) = futures::try_join!(try_join_all(workers), removed)?;

        for (kind, ids) in per_kind.iter().filter(|(_, ids)| !ids.is_empty()) {
            tracing::debug!("{} seeds: {}", kind, ids.len());
        }

        Ok(SeedSet {
            per_kind,
            removed: removed.into_iter().collect(),
        })
    }
}
