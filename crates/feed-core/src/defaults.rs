//! Centralized default constants for the feed post service.
//!
//! Shared defaults live here so the server, the ingest pipeline and the CLI
//! agree on paths, limits and timeouts.

// =============================================================================
// MANAGED ASSETS
// =============================================================================

/// Path prefix under which every managed asset is served.
pub const MANAGED_FILES_PREFIX: &str = "/api/files/";

/// Collection name managed assets are stored under.
pub const UPLOADS_COLLECTION: &str = "uploads";

/// Description given to embedded assets that carry neither alt text nor title.
pub const ASSET_DESCRIPTION: &str = "Embedded asset";

/// Description given to a featured image resolved from a reference.
pub const FEATURED_IMAGE_DESCRIPTION: &str = "Featured image";

/// Maximum accepted asset size in bytes (50 MiB).
pub const ASSET_MAX_BYTES: u64 = 50 * 1024 * 1024;

// =============================================================================
// REMOTE FETCHING
// =============================================================================

/// Per-request timeout for remote asset downloads.
pub const ASSET_FETCH_TIMEOUT_SECS: u64 = 30;

/// User agent sent when downloading remote assets.
pub const ASSET_USER_AGENT: &str = "Mozilla/5.0 (compatible; Feed-Ingest/1.0)";

/// Accept header sent when downloading remote assets.
pub const ASSET_ACCEPT: &str = "image/*,*/*";

// =============================================================================
// SLUGS
// =============================================================================

/// Number of `-N` suffixes tried before falling back to a timestamp suffix.
pub const SLUG_SUFFIX_ATTEMPTS: u32 = 5;

// =============================================================================
// SERVER
// =============================================================================

/// Default listen port.
pub const SERVER_PORT: u16 = 3000;

/// Default request body limit (25 MiB).
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Message returned alongside a successfully ingested post.
pub const POST_PROCESSED_MESSAGE: &str = "Post processed successfully";
