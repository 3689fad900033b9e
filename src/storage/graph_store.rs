use std::collections::HashSet;

use rusqlite::{params, params_from_iter};

use super::Database;
use crate::types::{
    ContentId, ReferenceEdge, Result, ResultExt, RunId, log_filter_warn, placeholders,
};

/// Run-scoped reference edges.
pub struct GraphStore<'a> {
    db: &'a Database,
}

impl<'a> GraphStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Replace every edge recorded for `run` with `edges`, atomically.
    ///
    /// Edges whose `run` differs from the target run are rejected. Duplicate
    /// edges collapse onto the primary key.
    pub fn replace_run_edges(&self, run: RunId, edges: &[ReferenceEdge]) -> Result<usize> {
        if let Some(stray) = edges.iter().find(|e| e.run != run) {
            return Err(crate::types::RegenError::Storage(format!(
                "Edge {} -> {} belongs to run {}, not {}",
                stray.source, stray.target, stray.run, run
            )));
        }

        self.db.transaction(|conn| {
            let removed = conn
                .execute("DELETE FROM reference_edge WHERE run_id = ?1", params![run])
                .with_context("Failed to clear run edges")?;
            if removed > 0 {
                tracing::debug!("Replaced {} stale edges for run {}", removed, run);
            }

            let mut stmt = conn
                .prepare_cached(
                    "INSERT OR IGNORE INTO reference_edge (run_id, source, target)
                     VALUES (?1, ?2, ?3)",
                )
                .with_context("Failed to prepare edge statement")?;

            let mut inserted = 0;
            for edge in edges {
                inserted += stmt
                    .execute(params![run, edge.source, edge.target])
                    .with_context("Failed to insert edge")?;
            }
            Ok(inserted)
        })
    }

    /// All edges of one run.
    pub fn edges(&self, run: RunId) -> Result<Vec<ReferenceEdge>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT source, target FROM reference_edge WHERE run_id = ?1 ORDER BY source, target",
        )?;

        let edges = stmt
            .query_map(params![run], |row| {
                Ok(ReferenceEdge::new(row.get(0)?, row.get(1)?, run))
            })?
            .filter_map(|r| log_filter_warn(r, "reading reference edge"))
            .collect();

        Ok(edges)
    }

    /// Distinct sources with at least one outbound edge in `run`.
    pub fn sources(&self, run: RunId) -> Result<HashSet<ContentId>> {
        let conn = self.db.connection()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT source FROM reference_edge WHERE run_id = ?1")?;

        let sources = stmt
            .query_map(params![run], |row| row.get(0))?
            .filter_map(|r| log_filter_warn(r, "reading edge source"))
            .collect();

        Ok(sources)
    }

    /// Sources citing any of `targets` in any of `runs`.
    pub fn sources_citing(&self, runs: &[RunId], targets: &[ContentId]) -> Result<HashSet<ContentId>> {
        self.neighbours("source", "target", runs, targets)
    }

    /// Targets cited by any of `sources` in any of `runs`.
    pub fn targets_cited_by(&self, runs: &[RunId], sources: &[ContentId]) -> Result<HashSet<ContentId>> {
        self.neighbours("target", "source", runs, sources)
    }

    fn neighbours(
        &self,
        select: &str,
        filter: &str,
        runs: &[RunId],
        ids: &[ContentId],
    ) -> Result<HashSet<ContentId>> {
        if runs.is_empty() || ids.is_empty() {
            return Ok(HashSet::new());
        }

        let sql = format!(
            "SELECT DISTINCT {select} FROM reference_edge
             WHERE run_id IN ({runs}) AND {filter} IN ({ids})",
            select = select,
            filter = filter,
            runs = placeholders(1, runs.len()),
            ids = placeholders(runs.len() + 1, ids.len()),
        );

        let mut values: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(runs.len() + ids.len());
        values.extend(runs.iter().map(|r| r as &dyn rusqlite::ToSql));
        values.extend(ids.iter().map(|id| id as &dyn rusqlite::ToSql));

        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_map(params_from_iter(values), |row| row.get(0))?
            .filter_map(|r| log_filter_warn(r, "reading edge neighbour"))
            .collect();

        Ok(found)
    }

    /// Drop edges of runs that never reached the generation log.
    pub fn prune_uncommitted(&self) -> Result<usize> {
        self.db.execute(
            "DELETE FROM reference_edge WHERE run_id NOT IN (SELECT run_id FROM generation_log)",
            &[],
        )
    }

    /// Drop edges of every run older than `keep_from`.
    pub fn prune_before(&self, keep_from: RunId) -> Result<usize> {
        self.db
            .execute("DELETE FROM reference_edge WHERE run_id < ?1", &[&keep_from])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Database {
        let db = Database::open_in_memory().expect("Failed to open database");
        db.initialize().expect("Failed to initialize");
        db
    }

    #[test]
    fn test_replace_run_edges_is_wholesale() {
        let db = setup();
        let store = GraphStore::new(&db);
        let run = RunId::new(100);
        let (a, b, c) = (ContentId::new(), ContentId::new(), ContentId::new());

        store
            .replace_run_edges(run, &[ReferenceEdge::new(a, b, run), ReferenceEdge::new(a, c, run)])
            .unwrap();
        store
            .replace_run_edges(run, &[ReferenceEdge::new(b, c, run)])
            .unwrap();

        assert_eq!(store.edges(run).unwrap(), vec![ReferenceEdge::new(b, c, run)]);
    }

    #[test]
    fn test_replace_leaves_other_runs_alone() {
        let db = setup();
        let store = GraphStore::new(&db);
        let (first, second) = (RunId::new(1), RunId::new(2));
        let (a, b) = (ContentId::new(), ContentId::new());

        store.replace_run_edges(first, &[ReferenceEdge::new(a, b, first)]).unwrap();
        store.replace_run_edges(second, &[]).unwrap();

        assert_eq!(store.sources(first).unwrap(), HashSet::from([a]));
        assert!(store.sources(second).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let db = setup();
        let store = GraphStore::new(&db);
        let run = RunId::new(7);
        let (a, b) = (ContentId::new(), ContentId::new());

        let inserted = store
            .replace_run_edges(run, &[ReferenceEdge::new(a, b, run), ReferenceEdge::new(a, b, run)])
            .unwrap();
        assert_eq!(inserted, 1);
    }

    #[test]
    fn test_rejects_edges_of_another_run() {
        let db = setup();
        let store = GraphStore::new(&db);
        let (a, b) = (ContentId::new(), ContentId::new());

        let result =
            store.replace_run_edges(RunId::new(1), &[ReferenceEdge::new(a, b, RunId::new(2))]);
        assert!(result.is_err());
    }

    #[test]
    fn test_neighbour_queries_span_runs() {
        let db = setup();
        let store = GraphStore::new(&db);
        let (old, new) = (RunId::new(1), RunId::new(2));
        let (a, b, c, d) = (ContentId::new(), ContentId::new(), ContentId::new(), ContentId::new());

        store.replace_run_edges(old, &[ReferenceEdge::new(a, b, old)]).unwrap();
        store.replace_run_edges(new, &[ReferenceEdge::new(c, b, new), ReferenceEdge::new(b, d, new)]).unwrap();

        assert_eq!(store.sources_citing(&[old, new], &[b]).unwrap(), HashSet::from([a, c]));
        assert_eq!(store.sources_citing(&[new], &[b]).unwrap(), HashSet::from([c]));
        assert_eq!(store.targets_cited_by(&[old, new], &[a, b]).unwrap(), HashSet::from([b, d]));
        assert!(store.targets_cited_by(&[], &[a]).unwrap().is_empty());
    }

    #[test]
    fn test_prune_uncommitted_keeps_logged_runs() {
        let db = setup();
        let store = GraphStore::new(&db);
        let (logged, orphan) = (RunId::new(10), RunId::new(20));
        let (a, b) = (ContentId::new(), ContentId::new());

        db.execute(
            "INSERT INTO generation_log (run_id, completed_at) VALUES (?1, 'now')",
            &[&logged],
        )
        .unwrap();
        store.replace_run_edges(logged, &[ReferenceEdge::new(a, b, logged)]).unwrap();
        store.replace_run_edges(orphan, &[ReferenceEdge::new(b, a, orphan)]).unwrap();

        assert_eq!(store.prune_uncommitted().unwrap(), 1);
        assert_eq!(store.edges(logged).unwrap().len(), 1);
        assert!(store.edges(orphan).unwrap().is_empty());
    }
}
