//! siteregen - Incremental Regeneration for a Static Publishing Site
//!
//! Decides, after a batch of authoring edits, which published artifacts must be
//! rebuilt. Each run rebuilds the cross-reference graph between content items,
//! diffs it against the previous run, folds in tag visibility changes and
//! feed or gallery neighbours, and commits the resulting changed set together
//! with a generation log entry.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use siteregen::{Database, PipelineSettings, RegenerationPipeline, RunOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let db = Database::open(".siteregen/regen.db")?;
//! db.initialize()?;
//! let pipeline = RegenerationPipeline::new(Arc::new(db), PipelineSettings::default());
//! let report = pipeline.run(RunOptions::default(), &CancellationToken::new()).await?;
//! println!("{} obligations", report.plan.len());
//! ```
//!
//! ## Modules
//!
//! - [`graph`]: reference token parsing, graph build and one-hop diff
//! - [`pipeline`]: seeds, tag audit, adjacency, dispatch and the run sequence
//! - [`storage`]: SQLite persistence with connection pooling
//! - [`kinds`]: per-kind descriptors (tables, text fields, publish filter)
//! - [`config`]: layered configuration

pub mod cli;
pub mod config;
pub mod constants;
pub mod graph;
pub mod kinds;
pub mod pipeline;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{RegenError, Result, ResultExt};

// Domain types
pub use types::{ContentId, ContentItem, ContentKind, ReferenceEdge, RunId};

// Storage
pub use storage::database::PoolConfig;
pub use storage::{ChangedContentSet, Database, RetryPolicy, SharedDatabase};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use graph::{GraphDiffExpander, ReferenceGraphBuilder, referenced_ids};
pub use pipeline::{
    Obligation, PipelineSettings, RegenerationPipeline, RegenerationPlan, Renderer,
    RendererRegistry, RunMode, RunOptions, RunReport,
};
