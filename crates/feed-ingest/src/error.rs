//! Fatal ingest errors.

use thiserror::Error;
use uuid::Uuid;

/// A failure that aborts a submission.
///
/// Everything else that goes wrong while ingesting is recorded as a
/// [`Degradation`](crate::Degradation) instead.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The document could not be parsed.
    #[error("Bad input: {0}")]
    BadInput(String),

    /// The post being updated does not exist.
    #[error("Post {0} not found")]
    NotFound(Uuid),

    /// The primary post record could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(#[source] feed_core::Error),
}

impl IngestError {
    /// Whether a uniqueness constraint rejected the post save.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Persistence(e) if e.is_conflict())
    }
}
