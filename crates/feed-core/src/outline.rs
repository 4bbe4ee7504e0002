//! Heading outline extraction.
//!
//! Walks a markdown body line by line and rebuilds the chapter hierarchy from
//! ATX heading markers. Each heading's parent is the nearest open heading of a
//! shallower level, so skipped levels (`#` followed by `###`) still attach to
//! the closest ancestor.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::slug::slugify;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("static heading pattern is valid"));

/// Reference from a heading to its parent heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    /// Slug base of the parent's title.
    pub slug: String,
    /// Emission order of the parent, unique within one outline.
    pub order: usize,
}

/// One heading found in the body, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    /// Number of `#` markers, 1 through 6.
    pub level: usize,
    /// Zero-based index among emitted headings.
    pub order: usize,
    pub parent: Option<ParentRef>,
}

impl OutlineEntry {
    /// Slug base derived from the title.
    pub fn slug_base(&self) -> String {
        slugify(&self.title)
    }
}

/// Extract the heading outline of a markdown body.
pub fn outline(body: &str) -> Vec<OutlineEntry> {
    let mut entries = Vec::new();
    // Index `level - 1` holds the open heading at that level, `None` for a skipped level.
    let mut stack: Vec<Option<ParentRef>> = Vec::new();

    for line in body.lines() {
        let Some(caps) = HEADING.captures(line) else {
            continue;
        };
        let title = caps[2].trim();
        if title.is_empty() {
            continue;
        }
        let level = caps[1].len();
        let order = entries.len();

        stack.truncate(level - 1);
        stack.resize(level - 1, None);
        let parent = stack.iter().rev().flatten().next().cloned();

        stack.push(Some(ParentRef {
            slug: slugify(title),
            order,
        }));
        entries.push(OutlineEntry {
            title: title.to_string(),
            level,
            order,
            parent,
        });
    }

    entries
}
