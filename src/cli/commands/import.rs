//! Import Command
//!
//! Applies authoring changes from a JSON file:
//!
//! ```json
//! {
//!   "items": [{ "id": "…", "kind": "post", "body": "{{photo 1f0e…}}" }],
//!   "exclusions": { "hiking": true },
//!   "removed": ["…"]
//! }
//! ```
//!
//! Every imported item counts as edited now, whatever `modified_at` the file
//! carries.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::storage::{ContentStore, Database, TagStore};
use crate::types::{ContentId, ContentItem, Result, ValidationOutcome};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportBatch {
    pub items: Vec<ContentItem>,
    /// Tag label → excluded from search
    pub exclusions: BTreeMap<String, bool>,
    pub removed: Vec<ContentId>,
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub saved: usize,
    pub rejected: Vec<ValidationOutcome>,
    pub exclusions: usize,
    pub removed: usize,
    pub unknown_removals: Vec<ContentId>,
}

/// Apply a batch: items first, then tag flags, then removals.
pub fn apply(db: &Database, batch: ImportBatch, now: DateTime<Utc>) -> Result<ImportSummary> {
    let content = ContentStore::new(db);
    let tags = TagStore::new(db);
    let mut summary = ImportSummary::default();

    for mut item in batch.items {
        item.touch(now);
        let outcome = content.save(&item)?;
        if outcome.ok {
            summary.saved += 1;
        } else {
            summary.rejected.push(outcome);
        }
    }

    for (label, excluded) in &batch.exclusions {
        tags.set_exclusion(label, *excluded)?;
        summary.exclusions += 1;
    }

    for id in batch.removed {
        if content.remove(id, now)? {
            summary.removed += 1;
        } else {
            summary.unknown_removals.push(id);
        }
    }

    Ok(summary)
}

pub fn run(path: &Path) -> Result<()> {
    let ctx = CommandContext::load()?;
    let out = Output::new();

    let raw = std::fs::read_to_string(path)?;
    let batch: ImportBatch = serde_json::from_str(&raw)?;
    let summary = apply(&ctx.db, batch, Utc::now())?;

    out.success(&format!(
        "Imported {} items, {} tag flags, {} removals from {}",
        summary.saved,
        summary.exclusions,
        summary.removed,
        path.display()
    ));
    for outcome in &summary.rejected {
        out.warning(&format!("Rejected: {}", outcome));
    }
    for id in &summary.unknown_removals {
        out.warning(&format!("Nothing to remove for {}", id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentKind;
    use chrono::TimeZone;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_batch_parses_with_defaults() {
        let batch: ImportBatch = serde_json::from_str(
            r#"{"items": [{"id": "6f1c2a9e-3b7d-4c1e-9a0f-2d5b8e7c4a11", "kind": "post"}]}"#,
        )
        .unwrap();
        assert_eq!(batch.items.len(), 1);
        assert!(batch.exclusions.is_empty());
        assert!(batch.removed.is_empty());
    }

    #[test]
    fn test_apply_stamps_items_and_records_everything() {
        let db = setup();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let old = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();

        let doomed = ContentItem::new(ContentKind::Photo, old);
        ContentStore::new(&db).save(&doomed).unwrap();

        let post = ContentItem::new(ContentKind::Post, old).with_tags(["hiking"]);
        let stray = ContentId::new();
        let batch = ImportBatch {
            items: vec![post.clone()],
            exclusions: BTreeMap::from([("hiking".to_string(), true)]),
            removed: vec![doomed.id, stray],
        };

        let summary = apply(&db, batch, now).unwrap();
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.exclusions, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.unknown_removals, vec![stray]);

        let stored = ContentStore::new(&db).get(post.id).unwrap().unwrap();
        assert_eq!(stored.modified_at, now);
        assert_eq!(
            TagStore::new(&db).labels().unwrap(),
            vec![("hiking".to_string(), true)]
        );
        assert!(ContentStore::new(&db).get(doomed.id).unwrap().is_none());
    }

    #[test]
    fn test_apply_reports_kind_conflicts() {
        let db = setup();
        let now = Utc::now();
        let post = ContentItem::new(ContentKind::Post, now);
        ContentStore::new(&db).save(&post).unwrap();

        let mut clash = ContentItem::new(ContentKind::Photo, now);
        clash.id = post.id;
        let summary = apply(
            &db,
            ImportBatch {
                items: vec![clash],
                ..Default::default()
            },
            now,
        )
        .unwrap();

        assert_eq!(summary.saved, 0);
        assert_eq!(summary.rejected.len(), 1);
        assert!(!summary.rejected[0].ok);
    }
}
