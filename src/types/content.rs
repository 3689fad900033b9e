use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ContentId;

/// Every kind of publishable content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Note,
    File,
    Photo,
    Image,
    Point,
    Line,
    GeoShape,
    Video,
    Map,
    Link,
}

impl ContentKind {
    pub const ALL: [ContentKind; 11] = [
        ContentKind::Post,
        ContentKind::Note,
        ContentKind::File,
        ContentKind::Photo,
        ContentKind::Image,
        ContentKind::Point,
        ContentKind::Line,
        ContentKind::GeoShape,
        ContentKind::Video,
        ContentKind::Map,
        ContentKind::Link,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Note => "note",
            Self::File => "file",
            Self::Photo => "photo",
            Self::Image => "image",
            Self::Point => "point",
            Self::Line => "line",
            Self::GeoShape => "geo_shape",
            Self::Video => "video",
            Self::Map => "map",
            Self::Link => "link",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown content kind: {}", s))
    }
}

/// A publishable unit as seen by the regeneration engine.
///
/// Only identifiers, timestamps and reference-bearing text are modelled;
/// presentation fields live with the renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub kind: ContentKind,
    /// Advanced on every save.
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub main_picture: Option<ContentId>,
    /// Position in the main feed.
    #[serde(default)]
    pub feed_at: Option<DateTime<Utc>>,
    /// Daily-gallery date, photos only.
    #[serde(default)]
    pub captured_on: Option<NaiveDate>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub update_notes: String,
    /// Kind-specific searchable text (alt text, descriptions).
    #[serde(default)]
    pub search_text: String,
    /// Structured references, e.g. the points a trail passes.
    #[serde(default)]
    pub links: Vec<ContentId>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ContentItem {
    pub fn new(kind: ContentKind, modified_at: DateTime<Utc>) -> Self {
        Self {
            id: ContentId::new(),
            kind,
            modified_at,
            draft: false,
            main_picture: None,
            feed_at: None,
            captured_on: None,
            body: String::new(),
            summary: String::new(),
            update_notes: String::new(),
            search_text: String::new(),
            links: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_feed_at(mut self, at: DateTime<Utc>) -> Self {
        self.feed_at = Some(at);
        self
    }

    pub fn with_captured_on(mut self, date: NaiveDate) -> Self {
        self.captured_on = Some(date);
        self
    }

    pub fn with_main_picture(mut self, picture: ContentId) -> Self {
        self.main_picture = Some(picture);
        self
    }

    pub fn with_links(mut self, links: Vec<ContentId>) -> Self {
        self.links = links;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_draft(mut self) -> Self {
        self.draft = true;
        self
    }

    /// Record an edit at `at`.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.modified_at = at;
    }
}
