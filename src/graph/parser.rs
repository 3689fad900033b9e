//! Reference-token scanner.
//!
//! Tokens look like `{{photo <id>; Text <caption>; ...}}` or `{{point <id>...}}`.
//! Rules are tried most-specific first; each rule's matches are cut out of
//! the working text before the next rule scans it, so a captioned token is
//! never counted twice.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::ContentId;

struct TokenRule {
    name: &'static str,
    pattern: Regex,
}

/// Capture group 2 of every rule is the identifier.
const ID_GROUP: usize = 2;

static RULES: LazyLock<[TokenRule; 2]> = LazyLock::new(|| {
    [
        TokenRule {
            name: "captioned",
            pattern: Regex::new(r"\{\{([a-z]+)\s+([^\s;}]+)\s*;\s*(?i:text)\s+([^;}]*);.*?\}\}")
                .expect("captioned token pattern is valid"),
        },
        TokenRule {
            name: "plain",
            pattern: Regex::new(r"\{\{([a-z]+)\s+([^\s;}]+).*?\}\}")
                .expect("plain token pattern is valid"),
        },
    ]
});

/// Unique ids referenced by `text`. Malformed ids are skipped.
pub fn referenced_ids(text: &str) -> HashSet<ContentId> {
    let mut found = HashSet::new();
    collect_into(text, &mut found);
    found
}

/// Scan `text` and add every referenced id to `found`.
pub fn collect_into(text: &str, found: &mut HashSet<ContentId>) {
    if !text.contains("{{") {
        return;
    }

    let mut remaining: Cow<'_, str> = Cow::Borrowed(text);
    for rule in RULES.iter() {
        for caps in rule.pattern.captures_iter(&remaining) {
            let raw = &caps[ID_GROUP];
            match ContentId::parse(raw) {
                Some(id) => {
                    found.insert(id);
                }
                None => tracing::trace!("Skipping {} token with malformed id '{}'", rule.name, raw),
            }
        }

        let stripped = rule.pattern.replace_all(&remaining, " ").into_owned();
        remaining = Cow::Owned(stripped);
    }
}
