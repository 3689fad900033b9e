use serde::{Deserialize, Serialize};

use super::{ContentId, RunId};

/// One row of a run's tag-visibility snapshot.
///
/// A label with no content still gets a row (`content_id = None`) so that
/// its exclusion flag can be compared across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagVisibilityRecord {
    pub run: RunId,
    pub label: String,
    pub content_id: Option<ContentId>,
    pub excluded_from_search: bool,
}
