use serde::Serialize;

use super::ContentId;

/// Result of an authoring-side check.
///
/// Carried as a value so callers can collect several outcomes and report
/// them together; the invalidation engine never consumes these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub note: String,
    pub content_id: Option<ContentId>,
}

impl ValidationOutcome {
    pub fn success(note: impl Into<String>, content_id: Option<ContentId>) -> Self {
        Self {
            ok: true,
            note: note.into(),
            content_id,
        }
    }

    pub fn failure(note: impl Into<String>, content_id: Option<ContentId>) -> Self {
        Self {
            ok: false,
            note: note.into(),
            content_id,
        }
    }
}

impl std::fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.content_id {
            Some(id) => write!(f, "{} ({})", self.note, id),
            None => f.write_str(&self.note),
        }
    }
}
