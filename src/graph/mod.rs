//! Reference graph: token parsing, per-run edge snapshots, and the
//! snapshot diff that widens the changed set.

pub mod builder;
pub mod diff;
pub mod parser;

pub use builder::{BuildSummary, ReferenceGraphBuilder, outbound_references};
pub use diff::{DiffOutcome, GraphDiffExpander, flipped_sources};
pub use parser::referenced_ids;
