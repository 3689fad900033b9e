//! Content-Kind Registry
//!
//! One descriptor per content kind. Seeding, graph building, feed adjacency
//! and dispatch all iterate this table, so a new kind is one new entry here
//! and nothing else.

use crate::types::{ContentId, ContentItem, ContentKind};

/// Free-text fields that may embed reference tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Body,
    Summary,
    UpdateNotes,
    SearchText,
}

impl TextField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Summary => "summary",
            Self::UpdateNotes => "update_notes",
            Self::SearchText => "search_text",
        }
    }

    pub fn read<'a>(&self, item: &'a ContentItem) -> &'a str {
        match self {
            Self::Body => &item.body,
            Self::Summary => &item.summary,
            Self::UpdateNotes => &item.update_notes,
            Self::SearchText => &item.search_text,
        }
    }
}

/// Static description of how one content kind participates in regeneration.
#[derive(Debug, Clone, Copy)]
pub struct KindDescriptor {
    pub kind: ContentKind,
    /// Backing table name.
    pub table: &'static str,
    /// Whether the kind has a draft concept. Kinds without one are always published.
    pub has_drafts: bool,
    /// Whether published items appear in the chronological main feed.
    pub feed_eligible: bool,
    /// Whether items are grouped into daily-gallery pages by capture date.
    pub daily_gallery: bool,
    /// Text fields scanned for reference tokens.
    pub text_fields: &'static [TextField],
    /// Whether `links` carries structured references.
    pub structured_links: bool,
}

impl KindDescriptor {
    /// Published items only; kinds without drafts are always published.
    pub fn is_published(&self, item: &ContentItem) -> bool {
        !self.has_drafts || !item.draft
    }

    /// SQL predicate selecting published rows of this kind's table.
    pub fn published_predicate(&self) -> &'static str {
        if self.has_drafts { "draft = 0" } else { "1 = 1" }
    }

    pub fn searchable_text<'a>(&self, item: &'a ContentItem) -> impl Iterator<Item = &'a str> {
        self.text_fields
            .iter()
            .map(move |field| field.read(item))
            .filter(|text| !text.is_empty())
    }

    pub fn structured_references<'a>(&self, item: &'a ContentItem) -> &'a [ContentId] {
        if self.structured_links {
            &item.links
        } else {
            &[]
        }
    }

    pub fn create_table_sql(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                modified_at INTEGER NOT NULL,
                draft INTEGER NOT NULL DEFAULT 0,
                main_picture TEXT,
                feed_at INTEGER,
                captured_on TEXT,
                body TEXT NOT NULL DEFAULT '',
                summary TEXT NOT NULL DEFAULT '',
                update_notes TEXT NOT NULL DEFAULT '',
                search_text TEXT NOT NULL DEFAULT '',
                links TEXT NOT NULL DEFAULT '[]'
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_modified ON {table}(modified_at);
            CREATE INDEX IF NOT EXISTS idx_{table}_main_picture ON {table}(main_picture);"#,
            table = self.table
        )
    }
}

use TextField::*;

static REGISTRY: [KindDescriptor; 11] = [
    KindDescriptor {
        kind: ContentKind::Post,
        table: "post",
        has_drafts: true,
        feed_eligible: true,
        daily_gallery: false,
        text_fields: &[Body, Summary, UpdateNotes],
        structured_links: false,
    },
    KindDescriptor {
        kind: ContentKind::Note,
        table: "note",
        has_drafts: true,
        feed_eligible: true,
        daily_gallery: false,
        text_fields: &[Body, UpdateNotes],
        structured_links: false,
    },
    KindDescriptor {
        kind: ContentKind::File,
        table: "file",
        has_drafts: true,
        feed_eligible: true,
        daily_gallery: false,
        text_fields: &[Body, Summary],
        structured_links: false,
    },
    KindDescriptor {
        kind: ContentKind::Photo,
        table: "photo",
        has_drafts: true,
        feed_eligible: true,
        daily_gallery: true,
        text_fields: &[Body, Summary, SearchText],
        structured_links: false,
    },
    KindDescriptor {
        kind: ContentKind::Image,
        table: "image",
        has_drafts: true,
        feed_eligible: false,
        daily_gallery: false,
        text_fields: &[Summary, SearchText],
        structured_links: false,
    },
    KindDescriptor {
        kind: ContentKind::Point,
        table: "point",
        has_drafts: true,
        feed_eligible: true,
        daily_gallery: false,
        text_fields: &[Body, Summary, UpdateNotes],
        structured_links: false,
    },
    KindDescriptor {
        kind: ContentKind::Line,
        table: "line",
        has_drafts: true,
        feed_eligible: true,
        daily_gallery: false,
        text_fields: &[Body, Summary, UpdateNotes],
        structured_links: true,
    },
    KindDescriptor {
        kind: ContentKind::GeoShape,
        table: "geo_shape",
        has_drafts: true,
        feed_eligible: false,
        daily_gallery: false,
        text_fields: &[Body, Summary],
        structured_links: true,
    },
    KindDescriptor {
        kind: ContentKind::Video,
        table: "video",
        has_drafts: true,
        feed_eligible: true,
        daily_gallery: false,
        text_fields: &[Body, Summary],
        structured_links: false,
    },
    KindDescriptor {
        kind: ContentKind::Map,
        table: "map",
        has_drafts: true,
        feed_eligible: false,
        daily_gallery: false,
        text_fields: &[Body, Summary, SearchText],
        structured_links: true,
    },
    KindDescriptor {
        kind: ContentKind::Link,
        table: "link",
        has_drafts: false,
        feed_eligible: true,
        daily_gallery: false,
        text_fields: &[Summary],
        structured_links: false,
    },
];

/// All registered kinds, in `ContentKind::ALL` order.
pub fn all() -> &'static [KindDescriptor] {
    &REGISTRY
}

pub fn descriptor(kind: ContentKind) -> &'static KindDescriptor {
    // REGISTRY is declared in ContentKind::ALL order.
    &REGISTRY[kind as usize]
}

/// Schema for every registered content table.
pub fn content_schema() -> String {
    REGISTRY
        .iter()
        .map(KindDescriptor::create_table_sql)
        .collect::<Vec<_>>()
        .join("\n")
}
