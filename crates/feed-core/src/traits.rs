//! Core traits for feed persistence abstractions.
//!
//! These traits define the interfaces that concrete stores must satisfy,
//! so the ingest pipeline runs unchanged against PostgreSQL, the in-memory
//! store used in tests, or a remote HTTP upload endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// POST REPOSITORY
// =============================================================================

/// Repository for post records.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Fetch a post by id.
    async fn fetch(&self, id: Uuid) -> Result<Option<Post>>;

    /// Insert or update a post's scalar fields.
    ///
    /// Tag and upload references are left untouched; use [`set_tags`] and
    /// [`set_uploads`]. Returns `Error::Conflict` when the slug or
    /// permalink is already held by another post.
    ///
    /// [`set_tags`]: PostRepository::set_tags
    /// [`set_uploads`]: PostRepository::set_uploads
    async fn save(&self, post: &Post) -> Result<()>;

    /// Whether any post holds this slug.
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Whether any post holds this permalink.
    async fn permalink_exists(&self, permalink: &str) -> Result<bool>;

    /// Replace the post's tag references.
    async fn set_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<()>;

    /// Replace the post's upload references.
    async fn set_uploads(&self, post_id: Uuid, asset_ids: &[Uuid]) -> Result<()>;
}

// =============================================================================
// NAMED ENTITY REPOSITORIES
// =============================================================================

/// Repository for tags.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Find a tag by exact title.
    async fn find_by_title(&self, title: &str) -> Result<Option<Tag>>;

    /// Create a tag. Returns `Error::Conflict` if the title is taken.
    async fn create(&self, title: &str) -> Result<Tag>;

    /// Fetch tags by id, preserving the order of `ids`. Unknown ids are skipped.
    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Tag>>;
}

/// Repository for contexts and their post links.
#[async_trait]
pub trait ContextRepository: Send + Sync {
    /// Find a context by exact title.
    async fn find_by_title(&self, title: &str) -> Result<Option<Context>>;

    /// Remove every context link of a post. Returns the number removed.
    async fn delete_links_for_post(&self, post_id: Uuid) -> Result<u64>;

    /// Link a post to a context.
    async fn link(&self, post_id: Uuid, context_id: Uuid) -> Result<()>;

    /// Contexts linked to a post.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Context>>;
}

/// Repository for collections and their ordered post links.
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Find a collection by exact title.
    async fn find_by_title(&self, title: &str) -> Result<Option<Collection>>;

    /// Create a collection. Returns `Error::Conflict` if the title or slug is taken.
    async fn create(&self, req: NewCollection) -> Result<Collection>;

    /// Whether any collection holds this slug.
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Remove every collection link of a post. Returns the number removed.
    async fn delete_links_for_post(&self, post_id: Uuid) -> Result<u64>;

    /// Link a post into a collection at the given position.
    async fn link(&self, post_id: Uuid, collection_id: Uuid, order: i32) -> Result<()>;

    /// Collections a post belongs to, ordered by position.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CollectionMembership>>;
}

// =============================================================================
// CHAPTER REPOSITORY
// =============================================================================

/// Repository for heading-derived chapters.
#[async_trait]
pub trait ChapterRepository: Send + Sync {
    /// Remove all chapters of a post. Returns the number removed.
    async fn delete_for_post(&self, post_id: Uuid) -> Result<u64>;

    /// Create a chapter. Returns `Error::Conflict` if the slug is taken.
    async fn create(&self, req: NewChapter) -> Result<Chapter>;

    /// Whether any chapter holds this slug.
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Chapters of a post in document order.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Chapter>>;
}

// =============================================================================
// ASSETS
// =============================================================================

/// Anything that can accept bytes and hand back a managed asset.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist an asset and return its record.
    async fn store(&self, asset: NewAsset) -> Result<Asset>;
}

/// Read access to stored assets.
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Fetch asset metadata by id.
    async fn fetch(&self, id: Uuid) -> Result<Option<Asset>>;

    /// Fetch asset metadata together with its bytes.
    async fn read(&self, id: Uuid) -> Result<Option<(Asset, Vec<u8>)>>;
}

// =============================================================================
// CROSSPOSTING
// =============================================================================

/// Repository for platform accounts and the crosspost queue.
#[async_trait]
pub trait CrosspostRepository: Send + Sync {
    /// Most recently connected account for a platform.
    async fn latest_account(&self, platform: Platform) -> Result<Option<PlatformAccount>>;

    /// Add an entry to the queue in the `Queued` state.
    async fn enqueue(&self, req: NewCrosspostEntry) -> Result<CrosspostEntry>;

    /// Queue entries for a post, oldest first.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CrosspostEntry>>;
}

// =============================================================================
// BUNDLE
// =============================================================================

/// Every repository the ingest pipeline talks to.
#[derive(Clone)]
pub struct Repositories {
    pub posts: Arc<dyn PostRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub contexts: Arc<dyn ContextRepository>,
    pub collections: Arc<dyn CollectionRepository>,
    pub chapters: Arc<dyn ChapterRepository>,
    pub assets: Arc<dyn AssetRepository>,
    pub asset_store: Arc<dyn AssetStore>,
    pub crossposts: Arc<dyn CrosspostRepository>,
}

impl Repositories {
    /// Build a bundle where a single store backs every repository.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: PostRepository
            + TagRepository
            + ContextRepository
            + CollectionRepository
            + ChapterRepository
            + AssetRepository
            + AssetStore
            + CrosspostRepository
            + 'static,
    {
        Self {
            posts: store.clone(),
            tags: store.clone(),
            contexts: store.clone(),
            collections: store.clone(),
            chapters: store.clone(),
            assets: store.clone(),
            asset_store: store.clone(),
            crossposts: store,
        }
    }
}
