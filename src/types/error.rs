//! Unified Error Type
//!
//! Centralized error type for the regeneration engine.
//!
//! ## Design Principles
//!
//! - Single error enum (`RegenError`) for the entire crate
//! - Structured variants carry the content kind or obligation they concern
//! - Lock contention is the only transient class; everything else aborts the run
//! - Authoring validation is reported via `ValidationOutcome`, never via this type

use rusqlite::ErrorCode;
use thiserror::Error;

use super::{ContentKind, RunId};

#[derive(Debug, Error)]
pub enum RegenError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    /// A per-kind worker failed; the whole run is aborted.
    #[error("Scan of {kind} content failed: {message}")]
    KindScan { kind: ContentKind, message: String },

    #[error("Run {run} is not newer than the latest logged run {latest}")]
    NonMonotonicRun { run: RunId, latest: RunId },

    #[error("Run cancelled before commit")]
    Cancelled,

    #[error("Worker task failed: {0}")]
    Join(String),

    #[error("Rendering {obligation} failed: {message}")]
    Render { obligation: String, message: String },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not initialized: run 'siteregen init' first")]
    NotInitialized,

    #[error("Invalid content id '{0}'")]
    InvalidContentId(String),
}

pub type Result<T> = std::result::Result<T, RegenError>;

impl From<tokio::task::JoinError> for RegenError {
    fn from(err: tokio::task::JoinError) -> Self {
        RegenError::Join(err.to_string())
    }
}

impl RegenError {
    /// Create a kind-scan error
    pub fn kind_scan(kind: ContentKind, message: impl Into<String>) -> Self {
        Self::KindScan {
            kind,
            message: message.into(),
        }
    }

    /// Check if this error is lock contention that may clear on retry.
    ///
    /// Only `SQLITE_BUSY` and `SQLITE_LOCKED` qualify; schema, constraint and
    /// IO failures are permanent for the duration of a run.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T> ResultExt<T> for std::result::Result<T, rusqlite::Error> {
    // Keep the rusqlite error intact so `is_transient` still sees the code.
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| {
            tracing::debug!("{}: {}", context.into(), e);
            RegenError::Database(e)
        })
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| {
            tracing::debug!("{}: {}", f().into(), e);
            RegenError::Database(e)
        })
    }
}

impl<T> ResultExt<T> for std::result::Result<T, serde_json::Error> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| RegenError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| RegenError::Storage(format!("{}: {}", f().into(), e)))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, r2d2::Error> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| RegenError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| RegenError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: std::os::raw::c_int) -> RegenError {
        RegenError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            None,
        ))
    }

    #[test]
    fn test_busy_and_locked_are_transient() {
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_BUSY).is_transient());
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED).is_transient());
    }

    #[test]
    fn test_other_failures_are_permanent() {
        assert!(!sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT).is_transient());
        assert!(!RegenError::Cancelled.is_transient());
        assert!(!RegenError::Storage("disk full".to_string()).is_transient());
    }

    #[test]
    fn test_kind_scan_display() {
        let err = RegenError::kind_scan(ContentKind::Photo, "no such table");
        assert_eq!(err.to_string(), "Scan of photo content failed: no such table");
    }

    #[test]
    fn test_context_keeps_database_error() {
        let res: std::result::Result<(), rusqlite::Error> = Err(
            rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY), None),
        );
        let err = res.with_context("writing edges").unwrap_err();
        assert!(err.is_transient());
    }
}
