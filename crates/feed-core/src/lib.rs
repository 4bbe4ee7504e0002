//! # feed-core
//!
//! Core types, traits, and document parsing for the feed post service.
//!
//! This crate holds everything that does not touch a database or the
//! network: the data model, repository traits, frontmatter parsing, slug
//! generation and heading outline extraction.

pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod frontmatter;
pub mod models;
pub mod outline;
pub mod slug;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use file_safety::{
    detect_content_type, extension_for_content_type, has_extension, sanitize_filename,
    sniff_extension,
};
pub use frontmatter::{parse_frontmatter, Document, Frontmatter};
pub use models::*;
pub use outline::{outline, OutlineEntry, ParentRef};
pub use slug::{slugify, unique_slug, SlugNamespace};
pub use traits::*;
