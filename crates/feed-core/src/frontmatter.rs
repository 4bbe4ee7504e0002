//! YAML frontmatter parsing for submitted markdown documents.
//!
//! A document must open with a `---` line and carry a matching `---` line
//! further down:
//!
//! ```markdown
//! ---
//! title: Hello World
//! tags: [go, web]
//! is_visible: true
//! ---
//! # Intro
//! ```
//!
//! Everything after the closing delimiter line is returned byte-for-byte as
//! the body.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

const DELIMITER: &str = "---";

/// Metadata block of a post document.
///
/// Keys are written in `snake_case`; the `camelCase` spellings are accepted
/// on input as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Frontmatter {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtitle: String,

    #[serde(deserialize_with = "name_list", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(deserialize_with = "name_list", skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,

    #[serde(deserialize_with = "name_list", skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,

    #[serde(alias = "isVisible")]
    pub is_visible: bool,

    /// Managed URL, bare asset id, remote URL or local path.
    #[serde(alias = "featuredImage", skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,

    #[serde(alias = "crosspostInstagram", skip_serializing_if = "is_false")]
    pub crosspost_instagram: bool,

    #[serde(alias = "crosspostThreads", skip_serializing_if = "is_false")]
    pub crosspost_threads: bool,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Accept a list, a single string, or null. Entries are trimmed and blanks dropped.
fn name_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let names = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(name)) => vec![name],
        Some(OneOrMany::Many(names)) => names,
    };

    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

/// A document split into its metadata and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub frontmatter: Frontmatter,
    pub body: String,
}

impl Document {
    /// Reassemble the document as `---\n<yaml>---\n<body>`.
    pub fn render(&self) -> Result<String> {
        let yaml = if self.frontmatter == Frontmatter::default() {
            String::new()
        } else {
            serde_yaml::to_string(&self.frontmatter)
                .map_err(|e| Error::Serialization(e.to_string()))?
        };
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{}", self.body))
    }
}

/// Split raw document text into frontmatter and body.
///
/// # Errors
///
/// - [`Error::MalformedFrontmatter`] when the text has fewer than three lines,
///   does not open with `---`, or never closes the block.
/// - [`Error::InvalidMetadataEncoding`] when the block is not a valid mapping.
pub fn parse_frontmatter(text: &str) -> Result<Document> {
    if text.split('\n').count() < 3 {
        return Err(Error::MalformedFrontmatter(
            "document is too short to contain frontmatter".to_string(),
        ));
    }

    let mut lines = text.split_inclusive('\n');
    let opening = lines.next().map(line_content).unwrap_or_default();
    if opening != DELIMITER {
        return Err(Error::MalformedFrontmatter(
            "document must start with '---'".to_string(),
        ));
    }

    let yaml_start = text.len() - lines.clone().map(str::len).sum::<usize>();
    let mut offset = yaml_start;
    let mut closing = None;
    for line in lines {
        if line_content(line) == DELIMITER {
            closing = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    let (yaml_end, body_start) = closing.ok_or_else(|| {
        Error::MalformedFrontmatter("missing closing '---' delimiter".to_string())
    })?;

    let yaml = &text[yaml_start..yaml_end];
    let frontmatter = if yaml.trim().is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str::<Frontmatter>(yaml)?
    };

    Ok(Document {
        frontmatter,
        body: text[body_start..].to_string(),
    })
}

fn line_content(line: &str) -> &str {
    line.trim_end_matches('\n').trim_end_matches('\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_frontmatter() {
        let text = "---\ntitle: Hello World\ntags: [go, web]\nis_visible: true\n---\n# Intro\nhi";
        let doc = parse_frontmatter(text).unwrap();
        assert_eq!(doc.frontmatter.title, "Hello World");
        assert_eq!(doc.frontmatter.tags, vec!["go", "web"]);
        assert!(doc.frontmatter.is_visible);
        assert_eq!(doc.body, "# Intro\nhi");
    }

    #[test]
    fn test_body_is_verbatim_after_closing_line() {
        let body = "\n\n  indented\r\ntrailing spaces   \n";
        let text = format!("---\ntitle: x\n---\n{body}");
        let doc = parse_frontmatter(&text).unwrap();
        assert_eq!(doc.body, body);
    }

    #[test]
    fn test_body_may_contain_delimiters() {
        let text = "---\ntitle: x\n---\nabove\n---\nbelow";
        let doc = parse_frontmatter(text).unwrap();
        assert_eq!(doc.body, "above\n---\nbelow");
    }

    #[test]
    fn test_crlf_delimiters() {
        let text = "---\r\ntitle: Windows\r\n---\r\nbody";
        let doc = parse_frontmatter(text).unwrap();
        assert_eq!(doc.frontmatter.title, "Windows");
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn test_closing_delimiter_on_last_line() {
        let text = "---\ntitle: x\n---";
        let doc = parse_frontmatter(text).unwrap();
        assert_eq!(doc.frontmatter.title, "x");
        assert_eq!(doc.body, "");
    }

    #[test]
    fn test_empty_block_yields_defaults() {
        let doc = parse_frontmatter("---\n---\nbody").unwrap();
        assert_eq!(doc.frontmatter, Frontmatter::default());
        assert!(!doc.frontmatter.is_visible);
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn test_camel_case_keys_accepted() {
        let text = "---\nisVisible: true\nfeaturedImage: https://x.test/a.png\ncrosspostInstagram: true\ncrosspostThreads: true\n---\n";
        let fm = parse_frontmatter(text).unwrap().frontmatter;
        assert!(fm.is_visible);
        assert_eq!(fm.featured_image.as_deref(), Some("https://x.test/a.png"));
        assert!(fm.crosspost_instagram);
        assert!(fm.crosspost_threads);
    }

    #[test]
    fn test_name_lists_tolerate_null_and_scalar() {
        let text = "---\ntags:\ncontexts: essays\ncollections: [' A ', '', B]\n---\n";
        let fm = parse_frontmatter(text).unwrap().frontmatter;
        assert!(fm.tags.is_empty());
        assert_eq!(fm.contexts, vec!["essays"]);
        assert_eq!(fm.collections, vec!["A", "B"]);
    }

    #[test]
    fn test_too_short() {
        let err = parse_frontmatter("---\n---").unwrap_err();
        assert!(matches!(err, Error::MalformedFrontmatter(_)));
    }

    #[test]
    fn test_missing_opening_delimiter() {
        let err = parse_frontmatter("title: x\n---\nbody\n").unwrap_err();
        assert!(matches!(err, Error::MalformedFrontmatter(_)));
    }

    #[test]
    fn test_missing_closing_delimiter() {
        let err = parse_frontmatter("---\ntitle: x\nbody\n").unwrap_err();
        assert!(matches!(err, Error::MalformedFrontmatter(_)));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse_frontmatter("---\ntitle: [unclosed\n---\nbody").unwrap_err();
        assert!(matches!(err, Error::InvalidMetadataEncoding(_)));
    }

    #[test]
    fn test_non_mapping_yaml() {
        let err = parse_frontmatter("---\n- just\n- a list\n---\nbody").unwrap_err();
        assert!(matches!(err, Error::InvalidMetadataEncoding(_)));
    }

    #[test]
    fn test_render_reparses_to_same_document() {
        let doc = Document {
            frontmatter: Frontmatter {
                title: "Hello".to_string(),
                tags: vec!["a".to_string()],
                is_visible: true,
                featured_image: Some("/api/files/uploads/x/y.png".to_string()),
                ..Default::default()
            },
            body: "# Heading\n\ntext\n".to_string(),
        };
        let rendered = doc.render().unwrap();
        assert!(rendered.starts_with("---\ntitle: Hello\n"));
        assert_eq!(parse_frontmatter(&rendered).unwrap(), doc);
    }

    #[test]
    fn test_render_empty_frontmatter() {
        let doc = Document {
            frontmatter: Frontmatter::default(),
            body: "body".to_string(),
        };
        assert_eq!(doc.render().unwrap(), "---\n---\nbody");
    }
}
