//! Tag-exclusion audit.
//!
//! Compares each label's `excluded_from_search` flag between the previous and
//! current snapshots. Content carrying a flipped label is appended to the
//! changed set regardless of its own edits.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::storage::{RetryPolicy, SharedDatabase, TagStore, with_retry};
use crate::types::{ContentId, Result, RunId, TagVisibilityRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagAudit {
    pub flipped_labels: BTreeSet<String>,
    pub affected: BTreeSet<ContentId>,
}

/// Labels present in both snapshots whose exclusion flag differs.
pub fn flipped_labels(
    previous: &[TagVisibilityRecord],
    current: &[TagVisibilityRecord],
) -> BTreeSet<String> {
    let before = flags_by_label(previous);
    flags_by_label(current)
        .into_iter()
        .filter(|(label, excluded)| before.get(label).is_some_and(|was| was != excluded))
        .map(|(label, _)| label.to_string())
        .collect()
}

/// Content associated with any of `labels` in `snapshot`.
pub fn affected_content(
    snapshot: &[TagVisibilityRecord],
    labels: &BTreeSet<String>,
) -> BTreeSet<ContentId> {
    snapshot
        .iter()
        .filter(|record| labels.contains(&record.label))
        .filter_map(|record| record.content_id)
        .collect()
}

fn flags_by_label(snapshot: &[TagVisibilityRecord]) -> HashMap<&str, bool> {
    snapshot
        .iter()
        .map(|record| (record.label.as_str(), record.excluded_from_search))
        .collect()
}

pub struct TagVisibilityAuditor {
    db: SharedDatabase,
    retry: RetryPolicy,
}

impl TagVisibilityAuditor {
    pub fn new(db: SharedDatabase, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Snapshot tag state under `current` and diff it against `previous`.
    pub async fn audit(&self, current: RunId, previous: Option<RunId>) -> Result<TagAudit> {
        let db = Arc::clone(&self.db);
        let rows = with_retry(&self.retry, "tag snapshot", move || {
            TagStore::new(&db).snapshot(current)
        })
        .await?;
        tracing::debug!("Tag snapshot for run {}: {} rows", current, rows);

        let Some(previous) = previous else {
            return Ok(TagAudit::default());
        };

        let db = Arc::clone(&self.db);
        let (before, after) = tokio::task::spawn_blocking(move || {
            let tags = TagStore::new(&db);
            Ok::<_, crate::types::RegenError>((tags.load_snapshot(previous)?, tags.load_snapshot(current)?))
        })
        .await??;

        let flipped_labels = flipped_labels(&before, &after);
        let affected = affected_content(&after, &flipped_labels);
        if !flipped_labels.is_empty() {
            tracing::info!(
                "Tag exclusion flipped for {} labels, {} items affected",
                flipped_labels.len(),
                affected.len()
            );
        }

        Ok(TagAudit {
            flipped_labels,
            affected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ContentStore, Database};
    use crate::types::{ContentItem, ContentKind};
    use chrono::Utc;

    fn record(run: i64, label: &str, id: Option<ContentId>, excluded: bool) -> TagVisibilityRecord {
        TagVisibilityRecord {
            run: RunId::new(run),
            label: label.to_string(),
            content_id: id,
            excluded_from_search: excluded,
        }
    }

    #[test]
    fn test_only_labels_in_both_snapshots_can_flip() {
        let previous = vec![record(1, "kept", None, false), record(1, "gone", None, false)];
        let current = vec![record(2, "kept", None, true), record(2, "new", None, true)];

        assert_eq!(flipped_labels(&previous, &current), BTreeSet::from(["kept".to_string()]));
    }

    #[test]
    fn test_affected_uses_current_membership() {
        let (a, b) = (ContentId::new(), ContentId::new());
        let current = vec![
            record(2, "hiking", Some(a), true),
            record(2, "hiking", Some(b), true),
            record(2, "food", Some(b), false),
            record(2, "empty", None, true),
        ];
        let labels = BTreeSet::from(["hiking".to_string(), "empty".to_string()]);
        assert_eq!(affected_content(&current, &labels), BTreeSet::from([a, b]));
    }

    #[tokio::test]
    async fn test_hiking_flip_marks_every_tagged_item() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let db = Arc::new(db);

        let store = ContentStore::new(&db);
        let items: Vec<_> = [ContentKind::Post, ContentKind::Photo, ContentKind::Line]
            .into_iter()
            .map(|kind| ContentItem::new(kind, Utc::now()).with_tags(["hiking"]))
            .collect();
        for item in &items {
            store.save(item).unwrap();
        }
        let tags = TagStore::new(&db);
        tags.set_exclusion("hiking", false).unwrap();

        let auditor = TagVisibilityAuditor::new(Arc::clone(&db), RetryPolicy::none());
        let first = auditor.audit(RunId::new(1), None).await.unwrap();
        assert!(first.affected.is_empty());

        tags.set_exclusion("hiking", true).unwrap();
        let second = auditor.audit(RunId::new(2), Some(RunId::new(1))).await.unwrap();

        assert_eq!(second.flipped_labels, BTreeSet::from(["hiking".to_string()]));
        assert_eq!(second.affected, items.iter().map(|i| i.id).collect());
    }
}
