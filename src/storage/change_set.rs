//! The persisted output of the last committed run.
//!
//! Overwritten wholesale on commit; never appended to.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::{Connection, params};

use super::Database;
use crate::types::{ContentId, Result, ResultExt, log_filter_warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Ids and gallery dates that must be regenerated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedContentSet {
    pub ids: BTreeSet<ContentId>,
    pub gallery_dates: BTreeSet<NaiveDate>,
}

impl ChangedContentSet {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.gallery_dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

pub struct ChangeSetStore<'a> {
    db: &'a Database,
}

impl<'a> ChangeSetStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// The set written by the most recent commit.
    pub fn load(&self) -> Result<ChangedContentSet> {
        let conn = self.db.connection()?;

        let mut stmt = conn.prepare("SELECT content_id FROM changed_content_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| log_filter_warn(r, "reading changed content id"))
            .collect();

        let mut stmt = conn.prepare("SELECT captured_on FROM changed_gallery_date")?;
        let gallery_dates = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| log_filter_warn(r, "reading changed gallery date"))
            .filter_map(|d| {
                log_filter_warn(
                    NaiveDate::parse_from_str(&d, DATE_FORMAT),
                    "parsing changed gallery date",
                )
            })
            .collect();

        Ok(ChangedContentSet { ids, gallery_dates })
    }
}

/// Replace the persisted set inside an open transaction.
pub fn replace_in(conn: &Connection, set: &ChangedContentSet) -> Result<()> {
    conn.execute("DELETE FROM changed_content_id", [])
        .with_context("Failed to clear changed ids")?;
    conn.execute("DELETE FROM changed_gallery_date", [])
        .with_context("Failed to clear changed gallery dates")?;

    let mut stmt = conn
        .prepare_cached("INSERT INTO changed_content_id (content_id) VALUES (?1)")
        .with_context("Failed to prepare changed id statement")?;
    for id in &set.ids {
        stmt.execute(params![id])
            .with_context("Failed to insert changed id")?;
    }

    let mut stmt = conn
        .prepare_cached("INSERT INTO changed_gallery_date (captured_on) VALUES (?1)")
        .with_context("Failed to prepare gallery date statement")?;
    for date in &set.gallery_dates {
        stmt.execute(params![date.format(DATE_FORMAT).to_string()])
            .with_context("Failed to insert gallery date")?;
    }

    Ok(())
}
