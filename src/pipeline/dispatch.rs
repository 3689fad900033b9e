//! Regeneration dispatch.
//!
//! Turns the final changed set into per-kind obligations. Nothing is rendered
//! here; a `RendererRegistry` executes a plan against whatever renderers the
//! caller registers.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::try_join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::kinds;
use crate::storage::{ChangedContentSet, ContentStore, SharedDatabase};
use crate::types::{ContentId, ContentKind, RegenError, Result, RunId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    /// The item's own page.
    Page,
    /// The kind's list and search page.
    List,
    /// The kind's feed and export files.
    Feed,
    /// One daily-gallery page.
    DailyGallery(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Obligation {
    pub kind: ContentKind,
    pub artifact: Artifact,
    pub content_id: Option<ContentId>,
}

impl Obligation {
    pub fn page(kind: ContentKind, id: ContentId) -> Self {
        Self {
            kind,
            artifact: Artifact::Page,
            content_id: Some(id),
        }
    }

    pub fn kind_wide(kind: ContentKind, artifact: Artifact) -> Self {
        Self {
            kind,
            artifact,
            content_id: None,
        }
    }
}

impl fmt::Display for Obligation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.artifact, self.content_id) {
            (Artifact::Page, Some(id)) => write!(f, "{} page {}", self.kind, id),
            (Artifact::Page, None) => write!(f, "{} page", self.kind),
            (Artifact::List, _) => write!(f, "{} list", self.kind),
            (Artifact::Feed, _) => write!(f, "{} feed", self.kind),
            (Artifact::DailyGallery(date), _) => write!(f, "{} gallery {}", self.kind, date),
        }
    }
}

/// How the changed set touches one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindMatch {
    /// Changed ids that are published items of this kind.
    pub own: Vec<ContentId>,
    /// Changed ids that are unpublished items of this kind. They get no page.
    pub drafts: Vec<ContentId>,
    /// Items of this kind whose main picture changed.
    pub picture_owners: Vec<ContentId>,
    /// Changed ids that were items of this kind before removal.
    pub removed: Vec<ContentId>,
}

impl KindMatch {
    pub fn is_triggered(&self) -> bool {
        !(self.own.is_empty()
            && self.drafts.is_empty()
            && self.picture_owners.is_empty()
            && self.removed.is_empty())
    }
}

/// Sorted, de-duplicated obligations for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegenerationPlan {
    pub run: RunId,
    obligations: BTreeSet<Obligation>,
}

impl RegenerationPlan {
    pub fn empty(run: RunId) -> Self {
        Self {
            run,
            obligations: BTreeSet::new(),
        }
    }

    /// Build a plan from per-kind matches and the gallery dates to refresh.
    pub fn from_matches(
        run: RunId,
        matches: &[(ContentKind, KindMatch)],
        gallery_dates: &BTreeSet<NaiveDate>,
    ) -> Self {
        let mut obligations = BTreeSet::new();

        for (kind, found) in matches.iter().filter(|(_, m)| m.is_triggered()) {
            for id in found.own.iter().chain(&found.picture_owners) {
                obligations.insert(Obligation::page(*kind, *id));
            }
            obligations.insert(Obligation::kind_wide(*kind, Artifact::List));
            obligations.insert(Obligation::kind_wide(*kind, Artifact::Feed));
        }

        for descriptor in kinds::all().iter().filter(|d| d.daily_gallery) {
            for date in gallery_dates {
                obligations.insert(Obligation::kind_wide(
                    descriptor.kind,
                    Artifact::DailyGallery(*date),
                ));
            }
        }

        Self { run, obligations }
    }

    pub fn obligations(&self) -> impl Iterator<Item = &Obligation> {
        self.obligations.iter()
    }

    pub fn len(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }

    pub fn contains(&self, obligation: &Obligation) -> bool {
        self.obligations.contains(obligation)
    }

    /// Kinds with at least one obligation.
    pub fn kinds(&self) -> BTreeSet<ContentKind> {
        self.obligations.iter().map(|o| o.kind).collect()
    }
}

pub struct RegenerationDispatcher {
    db: SharedDatabase,
}

impl RegenerationDispatcher {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    pub async fn plan(&self, run: RunId, changed: &ChangedContentSet) -> Result<RegenerationPlan> {
        if changed.is_empty() {
            return Ok(RegenerationPlan::empty(run));
        }

        let ids: Arc<Vec<ContentId>> = Arc::new(changed.ids.iter().copied().collect());

        let db = Arc::clone(&self.db);
        let removed_ids = Arc::clone(&ids);
        let removed = tokio::task::spawn_blocking(move || {
            ContentStore::new(&db).removed_items(&removed_ids)
        })
        .await??;

        let lookups = kinds::all().iter().map(|descriptor| {
            let db = Arc::clone(&self.db);
            let ids = Arc::clone(&ids);
            async move {
                tokio::task::spawn_blocking(move || {
                    let store = ContentStore::new(&db);
                    let own = store.published_ids_of_kind(descriptor, &ids)?;
                    let published: BTreeSet<ContentId> = own.iter().copied().collect();
                    let drafts = store
                        .ids_of_kind(descriptor, &ids)?
                        .into_iter()
                        .filter(|id| !published.contains(id))
                        .collect();
                    Ok::<_, RegenError>((
                        descriptor.kind,
                        KindMatch {
                            own,
                            drafts,
                            picture_owners: store.main_picture_owners(descriptor, &ids)?,
                            removed: Vec::new(),
                        },
                    ))
                })
                .await?
            }
        });

        let matches: Vec<(ContentKind, KindMatch)> = try_join_all(lookups)
            .await?
            .into_iter()
            .map(|(kind, found)| {
                let removed = removed
                    .iter()
                    .filter(|r| r.kind == kind)
                    .map(|r| r.id)
                    .collect();
                (kind, KindMatch { removed, ..found })
            })
            .collect();

        let plan = RegenerationPlan::from_matches(run, &matches, &changed.gallery_dates);
        tracing::info!(
            "Dispatch for run {}: {} obligations across {} kinds",
            run,
            plan.len(),
            plan.kinds().len()
        );
        Ok(plan)
    }
}

// =============================================================================
// Renderer collaborators
// =============================================================================

/// Renders the artifacts of one content kind.
#[async_trait]
pub trait Renderer: Send + Sync {
    fn kind(&self) -> ContentKind;

    async fn render(&self, obligation: &Obligation, run: RunId) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub rendered: usize,
    /// Obligations with no registered renderer.
    pub unhandled: Vec<Obligation>,
    pub failed: Vec<(Obligation, String)>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default, Clone)]
pub struct RendererRegistry {
    renderers: HashMap<ContentKind, Arc<dyn Renderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a renderer, replacing any earlier one for the same kind.
    pub fn register(&mut self, renderer: Arc<dyn Renderer>) -> &mut Self {
        self.renderers.insert(renderer.kind(), renderer);
        self
    }

    pub fn get(&self, kind: ContentKind) -> Option<&Arc<dyn Renderer>> {
        self.renderers.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Render every obligation, at most `max_concurrency` at a time.
    ///
    /// Failures are collected, not propagated, so one broken page does not
    /// hold back the rest.
    pub async fn execute(&self, plan: &RegenerationPlan, max_concurrency: usize) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let mut work = Vec::new();
        for obligation in plan.obligations() {
            match self.get(obligation.kind) {
                Some(renderer) => work.push((Arc::clone(renderer), *obligation)),
                None => report.unhandled.push(*obligation),
            }
        }

        let run = plan.run;
        let outcomes: Vec<(Obligation, Result<()>)> = stream::iter(work)
            .map(|(renderer, obligation)| async move {
                (obligation, renderer.render(&obligation, run).await)
            })
            .buffer_unordered(max_concurrency.max(1))
            .collect()
            .await;

        for (obligation, outcome) in outcomes {
            match outcome {
                Ok(()) => report.rendered += 1,
                Err(e) => {
                    tracing::warn!("Rendering {} failed: {}", obligation, e);
                    report.failed.push((obligation, e.to_string()));
                }
            }
        }

        report.failed.sort();
        report
    }
}
