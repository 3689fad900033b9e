//! Content tables, one per kind.
//!
//! Writes here stand in for the authoring workflow; the regeneration stages
//! only read. Every query is driven by a `KindDescriptor`, never by a match
//! on `ContentKind`.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Error::FromSqlConversionFailure;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use super::Database;
use crate::kinds::{self, KindDescriptor};
use crate::types::{
    ContentId, ContentItem, ContentKind, Result, ResultExt, RunId, ValidationOutcome,
    log_filter_error, log_filter_warn, placeholders,
};

const ITEM_COLUMNS: &str = "id, modified_at, draft, main_picture, feed_at, captured_on, \
                            body, summary, update_notes, search_text, links";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Upper bound on ids bound into a single `IN (...)` clause.
const MAX_IDS_PER_QUERY: usize = 500;

/// A published, feed-eligible item and its feed position (Unix millis).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: ContentId,
    pub feed_at: i64,
}

/// A removal record with the feed and gallery positions the item held
/// while published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedItem {
    pub id: ContentId,
    pub kind: ContentKind,
    pub feed_at: Option<i64>,
    pub captured_on: Option<NaiveDate>,
}

pub struct ContentStore<'a> {
    db: &'a Database,
}

impl<'a> ContentStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    // =========================================================================
    // Authoring
    // =========================================================================

    /// Insert or update an item together with its tag links.
    ///
    /// An id already used by an item of a different kind is rejected with a
    /// failed outcome and nothing is written.
    pub fn save(&self, item: &ContentItem) -> Result<ValidationOutcome> {
        let descriptor = kinds::descriptor(item.kind);
        let links = serde_json::to_string(&item.links)
            .with_context("Failed to serialize structured links")?;

        self.db.transaction(|conn| {
            if let Some(existing) = kind_of_in(conn, item.id)?
                && existing != item.kind
            {
                return Ok(ValidationOutcome::failure(
                    format!("id already belongs to a {} item", existing),
                    Some(item.id),
                ));
            }

            conn.execute(
                &format!(
                    r#"INSERT INTO {table} ({columns})
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                       ON CONFLICT(id) DO UPDATE SET
                           modified_at = excluded.modified_at,
                           draft = excluded.draft,
                           main_picture = excluded.main_picture,
                           feed_at = excluded.feed_at,
                           captured_on = excluded.captured_on,
                           body = excluded.body,
                           summary = excluded.summary,
                           update_notes = excluded.update_notes,
                           search_text = excluded.search_text,
                           links = excluded.links"#,
                    table = descriptor.table,
                    columns = ITEM_COLUMNS
                ),
                params![
                    item.id,
                    item.modified_at.timestamp_millis(),
                    item.draft,
                    item.main_picture,
                    item.feed_at.map(|at| at.timestamp_millis()),
                    item.captured_on.map(|d| d.format(DATE_FORMAT).to_string()),
                    item.body,
                    item.summary,
                    item.update_notes,
                    item.search_text,
                    links,
                ],
            )
            .with_context("Failed to upsert content item")?;

            conn.execute(
                "DELETE FROM content_tag WHERE content_id = ?1",
                params![item.id],
            )?;
            for label in item.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
                conn.execute(
                    "INSERT OR IGNORE INTO tag (label) VALUES (?1)",
                    params![label],
                )?;
                conn.execute(
                    "INSERT OR IGNORE INTO content_tag (content_id, label) VALUES (?1, ?2)",
                    params![item.id, label],
                )?;
            }

            conn.execute(
                "DELETE FROM removed_content WHERE content_id = ?1",
                params![item.id],
            )?;

            Ok(ValidationOutcome::success(
                format!("saved {}", item.kind),
                Some(item.id),
            ))
        })
    }

    /// Delete an item and record the removal at `at`.
    ///
    /// The record keeps the feed position and capture date the item held if
    /// it was published, so its former neighbours can still be found.
    /// Returns `false` if no item has this id.
    pub fn remove(&self, id: ContentId, at: DateTime<Utc>) -> Result<bool> {
        self.db.transaction(|conn| {
            let Some(kind) = kind_of_in(conn, id)? else {
                return Ok(false);
            };
            let descriptor = kinds::descriptor(kind);

            let (feed_at, captured_on) = conn
                .query_row(
                    &format!(
                        "SELECT feed_at, captured_on FROM {} WHERE id = ?1 AND {}",
                        descriptor.table,
                        descriptor.published_predicate()
                    ),
                    params![id],
                    |row| Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, Option<String>>(1)?)),
                )
                .optional()?
                .unwrap_or((None, None));
            let feed_at = feed_at.filter(|_| descriptor.feed_eligible);
            let captured_on = captured_on.filter(|_| descriptor.daily_gallery);

            conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", descriptor.table),
                params![id],
            )?;
            conn.execute("DELETE FROM content_tag WHERE content_id = ?1", params![id])?;
            conn.execute(
                "INSERT OR REPLACE INTO removed_content
                     (content_id, kind, removed_at, feed_at, captured_on)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, kind.as_str(), at.timestamp_millis(), feed_at, captured_on],
            )?;

            tracing::debug!("Removed {} {}", kind, id);
            Ok(true)
        })
    }

    /// Look up an item of any kind, tags included.
    pub fn get(&self, id: ContentId) -> Result<Option<ContentItem>> {
        let conn = self.db.connection()?;
        let Some(kind) = kind_of_in(&conn, id)? else {
            return Ok(None);
        };
        let descriptor = kinds::descriptor(kind);

        let item = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE id = ?1",
                    ITEM_COLUMNS, descriptor.table
                ),
                params![id],
                |row| row_to_item(kind, row),
            )
            .optional()?;

        let Some(mut item) = item else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT label FROM content_tag WHERE content_id = ?1 ORDER BY label",
        )?;
        item.tags = stmt
            .query_map(params![id], |row| row.get(0))?
            .filter_map(|r| log_filter_error(r, "reading content tag"))
            .collect();

        Ok(Some(item))
    }

    /// Find which kind an id belongs to.
    pub fn kind_of(&self, id: ContentId) -> Result<Option<ContentKind>> {
        let conn = self.db.connection()?;
        kind_of_in(&conn, id)
    }

    // =========================================================================
    // Regeneration reads
    // =========================================================================

    /// Every published item of one kind. Tags are not loaded.
    pub fn load_published(&self, descriptor: &KindDescriptor) -> Result<Vec<ContentItem>> {
        let conn = self.db.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM {} WHERE {}",
                ITEM_COLUMNS,
                descriptor.table,
                descriptor.published_predicate()
            ))
            .with_context_fn(|| format!("Failed to prepare scan of {}", descriptor.table))?;

        let items = stmt
            .query_map([], |row| row_to_item(descriptor.kind, row))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context_fn(|| format!("Failed to read {} rows", descriptor.kind))?;

        Ok(items)
    }

    /// Published ids of one kind modified strictly after `since`.
    ///
    /// `None` means no run has completed yet, so every published item counts.
    pub fn published_modified_after(
        &self,
        descriptor: &KindDescriptor,
        since: Option<RunId>,
    ) -> Result<Vec<ContentId>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} WHERE {} AND modified_at > ?1",
            descriptor.table,
            descriptor.published_predicate()
        ))?;

        let cutoff = since.map(RunId::get).unwrap_or(i64::MIN);
        let ids = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .filter_map(|r| log_filter_warn(r, "reading modified content id"))
            .collect();

        Ok(ids)
    }

    /// Every published id of one kind.
    pub fn published_ids(&self, descriptor: &KindDescriptor) -> Result<Vec<ContentId>> {
        self.published_modified_after(descriptor, None)
    }

    /// Ids removed strictly after `since`.
    pub fn removed_after(&self, since: Option<RunId>) -> Result<Vec<ContentId>> {
        let conn = self.db.connection()?;
        let mut stmt =
            conn.prepare("SELECT content_id FROM removed_content WHERE removed_at > ?1")?;

        let cutoff = since.map(RunId::get).unwrap_or(i64::MIN);
        let ids = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .filter_map(|r| log_filter_warn(r, "reading removed content id"))
            .collect();

        Ok(ids)
    }

    /// Removal records for the removed items among `ids`.
    pub fn removed_items(&self, ids: &[ContentId]) -> Result<Vec<RemovedItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.db.connection()?;
        let mut found = Vec::new();
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let mut stmt = conn.prepare(&format!(
                "SELECT content_id, kind, feed_at, captured_on FROM removed_content
                 WHERE content_id IN ({})",
                placeholders(1, chunk.len())
            ))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((
                        row.get::<_, ContentId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                })?
                .filter_map(|r| log_filter_warn(r, "reading removed content"));

            for (id, kind, feed_at, captured_on) in rows {
                let Some(kind) =
                    log_filter_warn(kind.parse::<ContentKind>(), "parsing removed kind")
                else {
                    continue;
                };
                let captured_on = captured_on.and_then(|date| {
                    log_filter_warn(
                        NaiveDate::parse_from_str(&date, DATE_FORMAT),
                        "parsing removed capture date",
                    )
                });
                found.push(RemovedItem {
                    id,
                    kind,
                    feed_at,
                    captured_on,
                });
            }
        }
        Ok(found)
    }

    /// Published, dated items of every feed-eligible kind, unordered.
    pub fn feed_entries(&self) -> Result<Vec<FeedEntry>> {
        let conn = self.db.connection()?;
        let mut entries = Vec::new();

        for descriptor in kinds::all().iter().filter(|d| d.feed_eligible) {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, feed_at FROM {} WHERE {} AND feed_at IS NOT NULL",
                descriptor.table,
                descriptor.published_predicate()
            ))?;

            entries.extend(
                stmt.query_map([], |row| {
                    Ok(FeedEntry {
                        id: row.get(0)?,
                        feed_at: row.get(1)?,
                    })
                })?
                .filter_map(|r| log_filter_warn(r, "reading feed entry")),
            );
        }

        Ok(entries)
    }

    /// Published items with a capture date, from every daily-gallery kind.
    pub fn gallery_entries(&self) -> Result<Vec<(ContentId, NaiveDate)>> {
        let conn = self.db.connection()?;
        let mut entries = Vec::new();

        for descriptor in kinds::all().iter().filter(|d| d.daily_gallery) {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, captured_on FROM {} WHERE {} AND captured_on IS NOT NULL",
                descriptor.table,
                descriptor.published_predicate()
            ))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, ContentId>(0)?, row.get::<_, String>(1)?))
                })?
                .filter_map(|r| log_filter_warn(r, "reading gallery entry"));

            for (id, date) in rows {
                if let Some(date) = log_filter_warn(
                    NaiveDate::parse_from_str(&date, DATE_FORMAT),
                    "parsing capture date",
                ) {
                    entries.push((id, date));
                }
            }
        }

        Ok(entries)
    }

    /// Which of `ids` are items of this kind (published or not).
    pub fn ids_of_kind(
        &self,
        descriptor: &KindDescriptor,
        ids: &[ContentId],
    ) -> Result<Vec<ContentId>> {
        self.select_in(
            &format!("SELECT id FROM {} WHERE id IN", descriptor.table),
            ids,
        )
    }

    /// Which of `ids` are published items of this kind.
    pub fn published_ids_of_kind(
        &self,
        descriptor: &KindDescriptor,
        ids: &[ContentId],
    ) -> Result<Vec<ContentId>> {
        self.select_in(
            &format!(
                "SELECT id FROM {} WHERE {} AND id IN",
                descriptor.table,
                descriptor.published_predicate()
            ),
            ids,
        )
    }

    /// Published items of this kind whose main picture is one of `pictures`.
    pub fn main_picture_owners(
        &self,
        descriptor: &KindDescriptor,
        pictures: &[ContentId],
    ) -> Result<Vec<ContentId>> {
        self.select_in(
            &format!(
                "SELECT id FROM {} WHERE {} AND main_picture IN",
                descriptor.table,
                descriptor.published_predicate()
            ),
            pictures,
        )
    }

    /// Run `prefix (?, ?, ...)` over `ids` in bounded chunks.
    fn select_in(&self, prefix: &str, ids: &[ContentId]) -> Result<Vec<ContentId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.db.connection()?;
        let mut found = Vec::new();
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let sql = format!("{} ({})", prefix, placeholders(1, chunk.len()));
            let mut stmt = conn.prepare(&sql)?;
            found.extend(
                stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    row.get::<_, ContentId>(0)
                })?
                    .filter_map(|r| log_filter_warn(r, "reading content id")),
            );
        }
        Ok(found)
    }
}

fn kind_of_in(conn: &Connection, id: ContentId) -> Result<Option<ContentKind>> {
    for descriptor in kinds::all() {
        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE id = ?1", descriptor.table),
                params![id],
                |_| Ok(()),
            )
            .optional()?;
        if found.is_some() {
            return Ok(Some(descriptor.kind));
        }
    }
    Ok(None)
}

fn row_to_item(kind: ContentKind, row: &rusqlite::Row<'_>) -> rusqlite::Result<ContentItem> {
    let modified_at: i64 = row.get(1)?;
    let feed_at: Option<i64> = row.get(4)?;
    let captured_on: Option<String> = row.get(5)?;
    let links: String = row.get(10)?;

    let links: Vec<ContentId> = serde_json::from_str(&links)
        .map_err(|e| FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;
    let captured_on = captured_on
        .map(|date| NaiveDate::parse_from_str(&date, DATE_FORMAT))
        .transpose()
        .map_err(|e| FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(ContentItem {
        id: row.get(0)?,
        kind,
        modified_at: millis_to_datetime(modified_at),
        draft: row.get(2)?,
        main_picture: row.get(3)?,
        feed_at: feed_at.map(millis_to_datetime),
        captured_on,
        body: row.get(6)?,
        summary: row.get(7)?,
        update_notes: row.get(8)?,
        search_text: row.get(9)?,
        links,
        tags: Vec::new(),
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn setup() -> Database {
        let db = Database::open_in_memory().expect("Failed to open database");
        db.initialize().expect("Failed to initialize");
        db
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_save_and_get_round_trip() {
        let db = setup();
        let store = ContentStore::new(&db);
        let picture = ContentId::new();
        let item = ContentItem::new(ContentKind::Post, at(1_000))
            .with_body("hello")
            .with_main_picture(picture)
            .with_feed_at(at(500))
            .with_tags(["hiking", " travel "]);

        let outcome = store.save(&item).unwrap();
        assert!(outcome.ok);

        let loaded = store.get(item.id).unwrap().expect("item should exist");
        assert_eq!(loaded.kind, ContentKind::Post);
        assert_eq!(loaded.body, "hello");
        assert_eq!(loaded.main_picture, Some(picture));
        assert_eq!(loaded.feed_at, Some(at(500)));
        assert_eq!(loaded.tags, vec!["hiking".to_string(), "travel".to_string()]);
    }

    #[test]
    fn test_save_rejects_id_reused_across_kinds() {
        let db = setup();
        let store = ContentStore::new(&db);
        let note = ContentItem::new(ContentKind::Note, at(1_000));
        store.save(&note).unwrap();

        let mut photo = ContentItem::new(ContentKind::Photo, at(2_000));
        photo.id = note.id;
        let outcome = store.save(&photo).unwrap();

        assert!(!outcome.ok);
        assert_eq!(outcome.content_id, Some(note.id));
        assert_eq!(store.kind_of(note.id).unwrap(), Some(ContentKind::Note));
    }

    #[test]
    fn test_modified_after_skips_drafts_except_links() {
        let db = setup();
        let store = ContentStore::new(&db);

        let post = ContentItem::new(ContentKind::Post, at(2_000));
        let draft = ContentItem::new(ContentKind::Post, at(2_000)).as_draft();
        let old = ContentItem::new(ContentKind::Post, at(500));
        let link = ContentItem::new(ContentKind::Link, at(2_000)).as_draft();
        for item in [&post, &draft, &old, &link] {
            store.save(item).unwrap();
        }

        let since = Some(RunId::new(1_000));
        let posts = store
            .published_modified_after(kinds::descriptor(ContentKind::Post), since)
            .unwrap();
        assert_eq!(posts, vec![post.id]);

        let links = store
            .published_modified_after(kinds::descriptor(ContentKind::Link), since)
            .unwrap();
        assert_eq!(links, vec![link.id]);
    }

    #[test]
    fn test_remove_records_removal() {
        let db = setup();
        let store = ContentStore::new(&db);
        let item = ContentItem::new(ContentKind::Video, at(1_000)).with_tags(["film"]);
        store.save(&item).unwrap();

        assert!(store.remove(item.id, at(3_000)).unwrap());
        assert!(!store.remove(item.id, at(4_000)).unwrap());
        assert!(store.get(item.id).unwrap().is_none());

        assert_eq!(store.removed_after(Some(RunId::new(2_000))).unwrap(), vec![item.id]);
        assert!(store.removed_after(Some(RunId::new(3_000))).unwrap().is_empty());
        assert_eq!(db.count("content_tag").unwrap(), 0);
        assert_eq!(
            store.removed_items(&[item.id, ContentId::new()]).unwrap(),
            vec![RemovedItem {
                id: item.id,
                kind: ContentKind::Video,
                feed_at: None,
                captured_on: None,
            }]
        );
    }

    #[test]
    fn test_remove_keeps_published_feed_and_gallery_position() {
        let db = setup();
        let store = ContentStore::new(&db);
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

        let photo = ContentItem::new(ContentKind::Photo, at(1_000))
            .with_feed_at(at(10))
            .with_captured_on(day);
        let draft = ContentItem::new(ContentKind::Photo, at(1_000))
            .with_feed_at(at(20))
            .with_captured_on(day)
            .as_draft();
        let image = ContentItem::new(ContentKind::Image, at(1_000)).with_feed_at(at(30));
        for item in [&photo, &draft, &image] {
            store.save(item).unwrap();
            store.remove(item.id, at(2_000)).unwrap();
        }

        let mut removed = store.removed_items(&[photo.id, draft.id, image.id]).unwrap();
        removed.sort_by_key(|r| (r.feed_at, r.id));
        let positions: Vec<_> = removed.iter().map(|r| (r.id, r.feed_at, r.captured_on)).collect();

        let mut expected = vec![
            (photo.id, Some(10), Some(day)),
            (draft.id, None, None),
            (image.id, None, None),
        ];
        expected.sort_by_key(|(id, feed_at, _)| (*feed_at, *id));
        assert_eq!(positions, expected);
    }

    #[test]
    fn test_malformed_stored_fields_are_errors() {
        let db = setup();
        let store = ContentStore::new(&db);
        let posts = kinds::descriptor(ContentKind::Post);
        let post = ContentItem::new(ContentKind::Post, at(1_000))
            .with_links(vec![ContentId::new()]);
        store.save(&post).unwrap();

        db.execute(
            "UPDATE post SET links = 'not json' WHERE id = ?1",
            &[&post.id],
        )
        .unwrap();
        assert!(store.get(post.id).is_err());
        assert!(store.load_published(posts).is_err());

        db.execute(
            "UPDATE post SET links = '[]', captured_on = '2024-13-45' WHERE id = ?1",
            &[&post.id],
        )
        .unwrap();
        assert!(store.get(post.id).is_err());
        assert!(store.load_published(posts).is_err());
    }

    #[test]
    fn test_resaving_clears_removal() {
        let db = setup();
        let store = ContentStore::new(&db);
        let item = ContentItem::new(ContentKind::Note, at(1_000));
        store.save(&item).unwrap();
        store.remove(item.id, at(2_000)).unwrap();
        store.save(&item).unwrap();

        assert!(store.removed_after(None).unwrap().is_empty());
    }

    #[test]
    fn test_feed_and_gallery_entries() {
        let db = setup();
        let store = ContentStore::new(&db);
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

        let photo = ContentItem::new(ContentKind::Photo, at(1_000))
            .with_feed_at(at(10))
            .with_captured_on(day);
        let image = ContentItem::new(ContentKind::Image, at(1_000)).with_feed_at(at(20));
        let undated = ContentItem::new(ContentKind::Post, at(1_000));
        for item in [&photo, &image, &undated] {
            store.save(item).unwrap();
        }

        let feed = store.feed_entries().unwrap();
        assert_eq!(feed, vec![FeedEntry { id: photo.id, feed_at: 10 }]);

        let gallery = store.gallery_entries().unwrap();
        assert_eq!(gallery, vec![(photo.id, day)]);
    }

    #[test]
    fn test_main_picture_owners_and_kind_filter() {
        let db = setup();
        let store = ContentStore::new(&db);
        let picture = ContentItem::new(ContentKind::Image, at(1_000));
        let post = ContentItem::new(ContentKind::Post, at(1_000)).with_main_picture(picture.id);
        let hidden = ContentItem::new(ContentKind::Post, at(1_000))
            .with_main_picture(picture.id)
            .as_draft();
        for item in [&picture, &post, &hidden] {
            store.save(item).unwrap();
        }

        let posts = kinds::descriptor(ContentKind::Post);
        assert_eq!(store.main_picture_owners(posts, &[picture.id]).unwrap(), vec![post.id]);

        let images = kinds::descriptor(ContentKind::Image);
        assert_eq!(
            store.ids_of_kind(images, &[picture.id, post.id]).unwrap(),
            vec![picture.id]
        );
        assert!(store.ids_of_kind(images, &[]).unwrap().is_empty());

        let mut all_posts = store.ids_of_kind(posts, &[post.id, hidden.id]).unwrap();
        all_posts.sort();
        let mut expected = vec![post.id, hidden.id];
        expected.sort();
        assert_eq!(all_posts, expected);
        assert_eq!(
            store.published_ids_of_kind(posts, &[post.id, hidden.id]).unwrap(),
            vec![post.id]
        );
    }
}
