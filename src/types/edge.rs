use serde::{Deserialize, Serialize};

use super::{ContentId, RunId};

/// "`source`'s rendered content cites `target`", as of run `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub source: ContentId,
    pub target: ContentId,
    pub run: RunId,
}

impl ReferenceEdge {
    pub fn new(source: ContentId, target: ContentId, run: RunId) -> Self {
        Self {
            source,
            target,
            run,
        }
    }
}
