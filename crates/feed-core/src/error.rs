//! Error types for the feed post service.

use thiserror::Error;

/// Result type alias using the feed Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for feed operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Post not found
    #[error("Post not found: {0}")]
    PostNotFound(uuid::Uuid),

    /// Document does not carry a well-formed frontmatter block
    #[error("Malformed frontmatter: {0}")]
    MalformedFrontmatter(String),

    /// Frontmatter block is present but could not be decoded
    #[error("Invalid metadata encoding: {0}")]
    InvalidMetadataEncoding(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Asset storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from a uniqueness constraint.
    ///
    /// Repositories map unique violations to [`Error::Conflict`], but raw
    /// database errors are inspected too so callers can retry either way.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Conflict(_) => true,
            Error::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::InvalidMetadataEncoding(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
