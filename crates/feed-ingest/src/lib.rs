//! # feed-ingest
//!
//! Turns a markdown document with a frontmatter header into a post and its
//! related records.
//!
//! The [`PostIngestor`] runs one submission end to end:
//! - parse the frontmatter and assign a unique slug
//! - store embedded images as managed assets and rewrite their references
//! - save the post, then reconcile tags, contexts and collections
//! - rebuild the chapter outline from the body's headings
//! - link created uploads and queue requested crossposts
//!
//! Only parsing, loading and the primary save abort a submission. Everything
//! else degrades into the returned [`IngestReport`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use feed_ingest::{IngestConfig, PostIngestor, Submission};
//!
//! let ingestor = PostIngestor::new(db.repositories(), IngestConfig::from_env()?)?;
//! let outcome = ingestor.submit(markdown.as_bytes(), Submission::Create).await?;
//! println!("{} ({} warnings)", outcome.post.post.slug, outcome.report.degradations.len());
//! ```

pub mod assets;
pub mod associations;
pub mod chapters;
pub mod config;
pub mod crosspost;
pub mod error;
pub mod pipeline;
pub mod report;

pub use assets::{
    clean_reference, describe, find_image_references, managed_asset_id, AssetFailure, AssetResolver,
    ImageReference, LoadedAsset, Reference, RewriteOutcome,
};
pub use config::{IngestConfig, LocalAccess};
pub use error::IngestError;
pub use pipeline::{IngestOutcome, PostIngestor, Submission};
pub use report::{AssociationKind, Degradation, IngestReport};
