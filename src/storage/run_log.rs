//! Generation log: the ordered list of committed runs.
//!
//! A run only exists once it is recorded here. Edge and tag snapshots written
//! under an id that never reached the log are invisible to later runs.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::Database;
use crate::types::{RegenError, Result, ResultExt, RunId, log_filter_warn};

/// One committed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedRun {
    pub run: RunId,
    pub completed_at: DateTime<Utc>,
}

pub struct GenerationLog<'a> {
    db: &'a Database,
}

impl<'a> GenerationLog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Most recent committed run, if any.
    pub fn latest(&self) -> Result<Option<RunId>> {
        let conn = self.db.connection()?;
        latest_in(&conn)
    }

    /// Latest committed run strictly older than `current`.
    pub fn previous_run(&self, current: RunId) -> Result<Option<RunId>> {
        let conn = self.db.connection()?;
        conn.query_row(
            "SELECT MAX(run_id) FROM generation_log WHERE run_id < ?1",
            params![current],
            |row| row.get(0),
        )
        .with_context("Failed to read previous run")
    }

    /// A fresh run id: `now`, or one past the latest run if the clock lags.
    pub fn allocate(&self, now: DateTime<Utc>) -> Result<RunId> {
        let candidate = RunId::from_datetime(now);
        Ok(match self.latest()? {
            Some(latest) if latest >= candidate => latest.successor(),
            _ => candidate,
        })
    }

    /// Committed runs, newest first.
    pub fn runs(&self, limit: usize) -> Result<Vec<LoggedRun>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, completed_at FROM generation_log ORDER BY run_id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, RunId>(0)?, row.get::<_, String>(1)?))
            })?
            .filter_map(|r| log_filter_warn(r, "reading generation log"))
            .filter_map(|(run, completed_at)| {
                let completed_at = log_filter_warn(
                    DateTime::parse_from_rfc3339(&completed_at),
                    "parsing run completion time",
                )?;
                Some(LoggedRun {
                    run,
                    completed_at: completed_at.with_timezone(&Utc),
                })
            })
            .collect();

        Ok(runs)
    }

    /// Forget runs older than `keep_from`.
    pub fn prune_before(&self, keep_from: RunId) -> Result<usize> {
        self.db
            .execute("DELETE FROM generation_log WHERE run_id < ?1", &[&keep_from])
    }
}

/// Append `run` inside an open transaction.
///
/// Fails with `NonMonotonicRun` unless `run` is newer than every logged run.
pub fn record_in(conn: &Connection, run: RunId, completed_at: DateTime<Utc>) -> Result<()> {
    if let Some(latest) = latest_in(conn)?
        && run <= latest
    {
        return Err(RegenError::NonMonotonicRun { run, latest });
    }

    conn.execute(
        "INSERT INTO generation_log (run_id, completed_at) VALUES (?1, ?2)",
        params![run, completed_at.to_rfc3339()],
    )
    .with_context("Failed to record run")?;
    Ok(())
}

fn latest_in(conn: &Connection) -> Result<Option<RunId>> {
    let latest: Option<Option<RunId>> = conn
        .query_row("SELECT MAX(run_id) FROM generation_log", [], |row| row.get(0))
        .optional()
        .with_context("Failed to read latest run")?;
    Ok(latest.flatten())
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

    fn record(db: &Database, run: RunId) -> Result<()> {
        db.transaction(|conn| record_in(conn, run, Utc::now()))
    }

    #[test]
    fn test_empty_log() {
        let db = setup();
        let log = GenerationLog::new(&db);
        assert_eq!(log.latest().unwrap(), None);
        assert_eq!(log.previous_run(RunId::new(10)).unwrap(), None);
        assert!(log.runs(10).unwrap().is_empty());
    }

    #[test]
    fn test_previous_run_is_strictly_older() {
        let db = setup();
        record(&db, RunId::new(10)).unwrap();
        record(&db, RunId::new(20)).unwrap();

        let log = GenerationLog::new(&db);
        assert_eq!(log.latest().unwrap(), Some(RunId::new(20)));
        assert_eq!(log.previous_run(RunId::new(20)).unwrap(), Some(RunId::new(10)));
        assert_eq!(log.previous_run(RunId::new(25)).unwrap(), Some(RunId::new(20)));
        assert_eq!(log.previous_run(RunId::new(10)).unwrap(), None);
    }

    #[test]
    fn test_record_rejects_non_monotonic_run() {
        let db = setup();
        record(&db, RunId::new(20)).unwrap();

        let err = record(&db, RunId::new(20)).unwrap_err();
        assert!(matches!(err, RegenError::NonMonotonicRun { .. }));
        let err = record(&db, RunId::new(5)).unwrap_err();
        assert!(matches!(err, RegenError::NonMonotonicRun { .. }));
        assert_eq!(db.count("generation_log").unwrap(), 1);
    }

    #[test]
    fn test_allocate_moves_past_a_lagging_clock() {
        let db = setup();
        let log = GenerationLog::new(&db);
        let now = Utc.timestamp_millis_opt(1_000).unwrap();

        assert_eq!(log.allocate(now).unwrap(), RunId::new(1_000));

        record(&db, RunId::new(5_000)).unwrap();
        assert_eq!(log.allocate(now).unwrap(), RunId::new(5_001));
    }

    #[test]
    fn test_runs_newest_first() {
        let db = setup();
        for run in [1, 2, 3] {
            record(&db, RunId::new(run)).unwrap();
        }

        let log = GenerationLog::new(&db);
        let runs: Vec<_> = log.runs(2).unwrap().into_iter().map(|r| r.run).collect();
        assert_eq!(runs, vec![RunId::new(3), RunId::new(2)]);

        assert_eq!(log.prune_before(RunId::new(3)).unwrap(), 2);
        assert_eq!(log.latest().unwrap(), Some(RunId::new(3)));
    }
}
