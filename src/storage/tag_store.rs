use rusqlite::params;

use super::Database;
use crate::types::{ContentId, Result, ResultExt, RunId, TagVisibilityRecord, log_filter_warn};

/// Tag exclusion flags and their per-run snapshots.
pub struct TagStore<'a> {
    db: &'a Database,
}

impl<'a> TagStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create the label if needed and set its exclusion flag.
    pub fn set_exclusion(&self, label: &str, excluded: bool) -> Result<()> {
        self.db.execute(
            "INSERT INTO tag (label, excluded_from_search) VALUES (?1, ?2)
             ON CONFLICT(label) DO UPDATE SET excluded_from_search = excluded.excluded_from_search",
            &[&label.trim(), &excluded],
        )?;
        Ok(())
    }

    /// Current `(label, excluded)` pairs, by label.
    pub fn labels(&self) -> Result<Vec<(String, bool)>> {
        let conn = self.db.connection()?;
        let mut stmt =
            conn.prepare("SELECT label, excluded_from_search FROM tag ORDER BY label")?;

        let labels = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| log_filter_warn(r, "reading tag"))
            .collect();

        Ok(labels)
    }

    /// Record the current tag state under `run`, replacing any earlier
    /// snapshot for the same run. Returns the number of rows written.
    pub fn snapshot(&self, run: RunId) -> Result<usize> {
        self.db.transaction(|conn| {
            conn.execute(
                "DELETE FROM tag_visibility_record WHERE run_id = ?1",
                params![run],
            )
            .with_context("Failed to clear tag snapshot")?;

            conn.execute(
                "INSERT INTO tag_visibility_record (run_id, label, content_id, excluded_from_search)
                 SELECT ?1, t.label, ct.content_id, t.excluded_from_search
                 FROM tag t LEFT JOIN content_tag ct ON ct.label = t.label",
                params![run],
            )
            .with_context("Failed to write tag snapshot")
        })
    }

    pub fn load_snapshot(&self, run: RunId) -> Result<Vec<TagVisibilityRecord>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT label, content_id, excluded_from_search FROM tag_visibility_record
             WHERE run_id = ?1 ORDER BY label",
        )?;

        let records = stmt
            .query_map(params![run], |row| {
                Ok(TagVisibilityRecord {
                    run,
                    label: row.get(0)?,
                    content_id: row.get::<_, Option<ContentId>>(1)?,
                    excluded_from_search: row.get(2)?,
                })
            })?
            .filter_map(|r| log_filter_warn(r, "reading tag snapshot"))
            .collect();

        Ok(records)
    }

    /// Drop snapshots of runs that never reached the generation log.
    pub fn prune_uncommitted(&self) -> Result<usize> {
        self.db.execute(
            "DELETE FROM tag_visibility_record
             WHERE run_id NOT IN (SELECT run_id FROM generation_log)",
            &[],
        )
    }

    pub fn prune_before(&self, keep_from: RunId) -> Result<usize> {
        self.db.execute(
            "DELETE FROM tag_visibility_record WHERE run_id < ?1",
            &[&keep_from],
        )
    }
}
