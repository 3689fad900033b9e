pub mod content;
pub mod edge;
pub mod error;
pub mod tag;
pub mod utils;
pub mod validation;

pub use content::*;
pub use edge::ReferenceEdge;
pub use error::{RegenError, Result, ResultExt};
pub use tag::TagVisibilityRecord;
pub use utils::{log_filter_error, log_filter_warn, placeholders};
pub use validation::ValidationOutcome;

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique, immutable identifier of a content item.
///
/// Stored as the hyphenated UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(Uuid);

impl ContentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Lenient parse: `None` for anything that is not a UUID.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ContentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ContentId {
    type Err = RegenError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| RegenError::InvalidContentId(s.to_string()))
    }
}

impl ToSql for ContentId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for ContentId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Uuid::parse_str(text)
            .map(Self)
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Identifier of one generation run.
///
/// A Unix timestamp in milliseconds. Ordering of run ids is the ordering of
/// runs, and the id doubles as the "last completed run" cut-off when seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(i64);

impl RunId {
    pub const fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis())
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub fn as_datetime(self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// The smallest run id strictly greater than this one.
    pub const fn successor(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for RunId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for RunId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_i64().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_parse_is_lenient() {
        assert!(ContentId::parse("not-a-uuid").is_none());
        assert!(ContentId::parse("").is_none());

        let id = ContentId::new();
        assert_eq!(ContentId::parse(&id.to_string()), Some(id));
        assert_eq!(ContentId::parse(&format!(" {} ", id)), Some(id));
    }

    #[test]
    fn test_content_id_from_str_error() {
        let err = "nope".parse::<ContentId>().unwrap_err();
        assert!(matches!(err, RegenError::InvalidContentId(_)));
    }

    #[test]
    fn test_run_id_ordering_and_successor() {
        let run = RunId::new(1_000);
        assert!(run < run.successor());
        assert_eq!(run.successor().get(), 1_001);
        assert_eq!(RunId::new(i64::MAX).successor().get(), i64::MAX);
    }

    #[test]
    fn test_run_id_datetime_conversion() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let run = RunId::from_datetime(at);
        assert_eq!(run.as_datetime(), at);
    }
}
