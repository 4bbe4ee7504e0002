//! URL-safe slug generation.
//!
//! [`slugify`] is a pure text transform. [`unique_slug`] layers collision
//! handling on top of it against any [`SlugNamespace`] (posts, collections,
//! chapters).

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::defaults::SLUG_SUFFIX_ATTEMPTS;
use crate::error::Result;

static NON_SLUG_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern is valid"));

/// Lowercase `text`, collapse every run of characters outside `[a-z0-9]`
/// into one hyphen, and trim hyphens from both ends.
///
/// May return an empty string for text with no ASCII alphanumerics.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    NON_SLUG_RUN
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// A set of slugs that must stay unique.
#[async_trait]
pub trait SlugNamespace: Send + Sync {
    /// Whether `candidate` is already in use.
    async fn is_taken(&self, candidate: &str) -> Result<bool>;
}

#[async_trait]
impl SlugNamespace for HashSet<String> {
    async fn is_taken(&self, candidate: &str) -> Result<bool> {
        Ok(self.contains(candidate))
    }
}

/// Derive a slug from `text` that is free in `namespace`.
///
/// Tries the base slug, then `base-1` through `base-5`, then falls back to
/// `base-<nanosecond timestamp>`. Text that slugifies to nothing gets a
/// generated identifier as its base.
pub async fn unique_slug(text: &str, namespace: &dyn SlugNamespace) -> Result<String> {
    let mut base = slugify(text);
    if base.is_empty() {
        base = Uuid::now_v7().simple().to_string();
    }

    if !namespace.is_taken(&base).await? {
        return Ok(base);
    }

    for n in 1..=SLUG_SUFFIX_ATTEMPTS {
        let candidate = format!("{}-{}", base, n);
        if !namespace.is_taken(&candidate).await? {
            return Ok(candidate);
        }
    }

    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    debug!(
        component = "slug",
        base = %base,
        attempts = SLUG_SUFFIX_ATTEMPTS,
        "Slug suffixes exhausted, using timestamp"
    );
    Ok(format!("{}-{}", base, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(slugs: &[&str]) -> HashSet<String> {
        slugs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rust & Go: A Comparison!  "), "rust-go-a-comparison");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("snake_case_title"), "snake-case-title");
        assert_eq!(slugify("Version 2.0"), "version-2-0");
    }

    #[test]
    fn test_slugify_non_ascii_collapses() {
        assert_eq!(slugify("Café Crème"), "caf-cr-me");
        assert_eq!(slugify("日本語"), "");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_slugify_is_idempotent() {
        for text in ["Hello World", "  A -- B  ", "Ünïcödé 42", "x", "!!!", "a_b c-d"] {
            let once = slugify(text);
            assert_eq!(slugify(&once), once, "slugify not idempotent for {:?}", text);
        }
    }

    #[tokio::test]
    async fn test_unique_slug_free_base() {
        let ns = taken(&[]);
        assert_eq!(unique_slug("Foo", &ns).await.unwrap(), "foo");
    }

    #[tokio::test]
    async fn test_unique_slug_appends_first_free_suffix() {
        let ns = taken(&["foo", "foo-1", "foo-2"]);
        assert_eq!(unique_slug("Foo", &ns).await.unwrap(), "foo-3");
    }

    #[tokio::test]
    async fn test_unique_slug_falls_back_to_timestamp() {
        let ns = taken(&["foo", "foo-1", "foo-2", "foo-3", "foo-4", "foo-5"]);
        let slug = unique_slug("Foo", &ns).await.unwrap();
        let suffix = slug.strip_prefix("foo-").unwrap();
        assert!(suffix.len() > 5);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_unique_slug_empty_base_gets_generated_id() {
        let ns = taken(&[]);
        let slug = unique_slug("???", &ns).await.unwrap();
        assert_eq!(slug.len(), 32);
        assert_eq!(slugify(&slug), slug);
    }
}
