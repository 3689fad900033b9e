//! Feed and daily-gallery neighbours.
//!
//! Pages embed previous/next links, so a changed item drags its immediate
//! neighbours along. The same holds for gallery dates, where the neighbour is
//! the nearest distinct capture date rather than the adjacent calendar day.
//! Removed items keep the positions they held, so their former neighbours
//! are refreshed too.

use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::storage::{ContentStore, FeedEntry, RemovedItem, SharedDatabase};
use crate::types::{ContentId, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Adjacency {
    /// Feed neighbours of changed items, not already in the changed set.
    pub feed_neighbours: BTreeSet<ContentId>,
    /// Gallery dates to re-render: touched dates and their nearest neighbours.
    pub gallery_dates: BTreeSet<NaiveDate>,
}

/// Immediate predecessor and successor, in `(feed_at, id)` order, of every
/// changed item present in the feed.
pub fn feed_neighbours(feed: &[FeedEntry], changed: &BTreeSet<ContentId>) -> BTreeSet<ContentId> {
    let mut ordered: Vec<&FeedEntry> = feed.iter().collect();
    ordered.sort_by_key(|entry| (entry.feed_at, entry.id));

    let mut neighbours = BTreeSet::new();
    for (i, entry) in ordered.iter().enumerate() {
        if !changed.contains(&entry.id) {
            continue;
        }
        if let Some(prev) = i.checked_sub(1).and_then(|p| ordered.get(p)) {
            neighbours.insert(prev.id);
        }
        if let Some(next) = ordered.get(i + 1) {
            neighbours.insert(next.id);
        }
    }

    neighbours.retain(|id| !changed.contains(id));
    neighbours
}

/// Capture dates of changed gallery items plus the nearest earlier and later
/// distinct dates for each.
pub fn gallery_dates(
    entries: &[(ContentId, NaiveDate)],
    changed: &BTreeSet<ContentId>,
) -> BTreeSet<NaiveDate> {
    let all_dates: BTreeSet<NaiveDate> = entries.iter().map(|(_, date)| *date).collect();
    let touched: BTreeSet<NaiveDate> = entries
        .iter()
        .filter(|(id, _)| changed.contains(id))
        .map(|(_, date)| *date)
        .collect();

    let mut dates = touched.clone();
    for date in &touched {
        if let Some(earlier) = all_dates.range(..*date).next_back() {
            dates.insert(*earlier);
        }
        if let Some(later) = all_dates.range((Excluded(*date), Unbounded)).next() {
            dates.insert(*later);
        }
    }
    dates
}

/// Put changed removed items back at their last feed and gallery positions.
pub fn restore_removed(
    removed: &[RemovedItem],
    changed: &BTreeSet<ContentId>,
    feed: &mut Vec<FeedEntry>,
    gallery: &mut Vec<(ContentId, NaiveDate)>,
) {
    for item in removed.iter().filter(|r| changed.contains(&r.id)) {
        if let Some(feed_at) = item.feed_at {
            feed.push(FeedEntry {
                id: item.id,
                feed_at,
            });
        }
        if let Some(date) = item.captured_on {
            gallery.push((item.id, date));
        }
    }
}

pub struct FeedAdjacencyResolver {
    db: SharedDatabase,
}

impl FeedAdjacencyResolver {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    pub async fn resolve(&self, changed: &BTreeSet<ContentId>) -> Result<Adjacency> {
        if changed.is_empty() {
            return Ok(Adjacency::default());
        }

        let db = Arc::clone(&self.db);
        let ids: Vec<ContentId> = changed.iter().copied().collect();
        let (mut feed, mut gallery, removed) = tokio::task::spawn_blocking(move || {
            let store = ContentStore::new(&db);
            Ok::<_, crate::types::RegenError>((
                store.feed_entries()?,
                store.gallery_entries()?,
                store.removed_items(&ids)?,
            ))
        })
        .await??;
        restore_removed(&removed, changed, &mut feed, &mut gallery);

        let adjacency = Adjacency {
            feed_neighbours: feed_neighbours(&feed, changed),
            gallery_dates: gallery_dates(&gallery, changed),
        };
        tracing::debug!(
            "Adjacency: {} feed neighbours, {} gallery dates",
            adjacency.feed_neighbours.len(),
            adjacency.gallery_dates.len()
        );
        Ok(adjacency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(month: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, month, d).unwrap()
    }

    fn millis(date: NaiveDate) -> i64 {
        date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp_millis()
    }

    #[test]
    fn test_feed_neighbours_of_middle_item() {
        let [p1, p2, p3] = [ContentId::new(), ContentId::new(), ContentId::new()];
        let feed = vec![
            FeedEntry { id: p3, feed_at: millis(day(3, 1)) },
            FeedEntry { id: p1, feed_at: millis(day(1, 1)) },
            FeedEntry { id: p2, feed_at: millis(day(2, 1)) },
        ];

        let neighbours = feed_neighbours(&feed, &BTreeSet::from([p2]));
        assert_eq!(neighbours, BTreeSet::from([p1, p3]));
    }

    #[test]
    fn test_feed_edges_have_one_neighbour() {
        let [p1, p2, p3] = [ContentId::new(), ContentId::new(), ContentId::new()];
        let feed = vec![
            FeedEntry { id: p1, feed_at: 1 },
            FeedEntry { id: p2, feed_at: 2 },
            FeedEntry { id: p3, feed_at: 3 },
        ];

        assert_eq!(feed_neighbours(&feed, &BTreeSet::from([p1])), BTreeSet::from([p2]));
        assert_eq!(feed_neighbours(&feed, &BTreeSet::from([p3])), BTreeSet::from([p2]));
        // Neighbours already in the set are not repeated.
        assert_eq!(feed_neighbours(&feed, &BTreeSet::from([p1, p2])), BTreeSet::from([p3]));
    }

    #[test]
    fn test_items_outside_the_feed_have_no_neighbours() {
        let feed = vec![FeedEntry { id: ContentId::new(), feed_at: 1 }];
        assert!(feed_neighbours(&feed, &BTreeSet::from([ContentId::new()])).is_empty());
    }

    #[test]
    fn test_removed_item_keeps_its_neighbours() {
        let [g1, g5, g9] = [ContentId::new(), ContentId::new(), ContentId::new()];
        let mut feed = vec![
            FeedEntry { id: g1, feed_at: millis(day(1, 1)) },
            FeedEntry { id: g9, feed_at: millis(day(1, 9)) },
        ];
        let mut gallery = vec![(g1, day(1, 1)), (g9, day(1, 9))];
        let removed = [RemovedItem {
            id: g5,
            kind: crate::types::ContentKind::Photo,
            feed_at: Some(millis(day(1, 5))),
            captured_on: Some(day(1, 5)),
        }];

        // Only removals inside the changed set count.
        restore_removed(&removed, &BTreeSet::new(), &mut feed, &mut gallery);
        assert_eq!(feed.len(), 2);

        let changed = BTreeSet::from([g5]);
        restore_removed(&removed, &changed, &mut feed, &mut gallery);
        assert_eq!(feed_neighbours(&feed, &changed), BTreeSet::from([g1, g9]));
        assert_eq!(
            gallery_dates(&gallery, &changed),
            BTreeSet::from([day(1, 1), day(1, 5), day(1, 9)])
        );
    }

    #[test]
    fn test_gallery_uses_nearest_distinct_dates() {
        let ids: Vec<ContentId> = (0..4).map(|_| ContentId::new()).collect();
        let entries = vec![
            (ids[0], day(1, 1)),
            (ids[1], day(1, 5)),
            (ids[2], day(1, 5)),
            (ids[3], day(1, 9)),
        ];

        let dates = gallery_dates(&entries, &BTreeSet::from([ids[1]]));
        assert_eq!(dates, BTreeSet::from([day(1, 1), day(1, 5), day(1, 9)]));
    }

    #[test]
    fn test_gallery_skips_calendar_gaps_but_not_beyond() {
        let ids: Vec<ContentId> = (0..4).map(|_| ContentId::new()).collect();
        let entries = vec![
            (ids[0], day(1, 1)),
            (ids[1], day(1, 5)),
            (ids[2], day(1, 9)),
            (ids[3], day(2, 20)),
        ];

        let dates = gallery_dates(&entries, &BTreeSet::from([ids[2]]));
        assert_eq!(dates, BTreeSet::from([day(1, 5), day(1, 9), day(2, 20)]));
        assert!(gallery_dates(&entries, &BTreeSet::new()).is_empty());
    }
}
