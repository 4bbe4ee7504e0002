//! In-memory store for deterministic testing.
//!
//! Implements every repository trait over a single mutex-guarded state,
//! enforcing the same uniqueness rules as the PostgreSQL schema. Individual
//! operations can be made to fail to exercise degraded ingest paths.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use feed_db::memory::MemoryStore;
//! use feed_core::Repositories;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.add_context("essays");
//! let repos = Repositories::from_store(store.clone());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use feed_core::{
    sanitize_filename, Asset, AssetRepository, AssetStore, Chapter, ChapterRepository,
    Collection, CollectionMembership, CollectionRepository, Context, ContextRepository,
    CrosspostEntry, CrosspostRepository, Error, NewAsset, NewChapter, NewCollection,
    NewCrosspostEntry, Platform, PlatformAccount, Post, PostRepository, QueueStatus, Result, Tag,
    TagRepository,
};

#[derive(Default)]
struct State {
    posts: HashMap<Uuid, Post>,
    tags: Vec<Tag>,
    contexts: Vec<Context>,
    collections: Vec<Collection>,
    context_links: Vec<(Uuid, Uuid)>,
    collection_links: Vec<(Uuid, Uuid, i32)>,
    chapters: Vec<Chapter>,
    assets: HashMap<Uuid, (Asset, Vec<u8>)>,
    accounts: Vec<PlatformAccount>,
    queue: Vec<CrosspostEntry>,
    failing: HashSet<String>,
}

/// Mock store backing every repository trait.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-operation
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the named operation (for example `"chapters.create"`) fail with
    /// `Error::Internal` until [`MemoryStore::heal`] is called.
    pub fn fail_on(&self, operation: &str) {
        self.lock().failing.insert(operation.to_string());
    }

    /// Clear every injected failure.
    pub fn heal(&self) {
        self.lock().failing.clear();
    }

    fn check(state: &State, operation: &str) -> Result<()> {
        if state.failing.contains(operation) {
            return Err(Error::Internal(format!("injected failure: {}", operation)));
        }
        Ok(())
    }

    /// Seed a context. Ingestion never creates contexts itself.
    pub fn add_context(&self, title: &str) -> Context {
        let context = Context {
            id: Uuid::now_v7(),
            title: title.to_string(),
            description: String::new(),
            created_at: Utc::now(),
        };
        self.lock().contexts.push(context.clone());
        context
    }

    /// Seed a platform account.
    pub fn add_account(&self, platform: Platform, handle: &str) -> PlatformAccount {
        let account = PlatformAccount {
            id: Uuid::now_v7(),
            platform,
            handle: handle.to_string(),
            created_at: Utc::now(),
        };
        self.lock().accounts.push(account.clone());
        account
    }

    /// Snapshot of every stored post.
    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.values().cloned().collect()
    }

    /// Snapshot of every stored tag.
    pub fn tags(&self) -> Vec<Tag> {
        self.lock().tags.clone()
    }

    /// Snapshot of every stored collection.
    pub fn collections(&self) -> Vec<Collection> {
        self.lock().collections.clone()
    }

    /// Number of stored assets.
    pub fn asset_count(&self) -> usize {
        self.lock().assets.len()
    }

    /// Snapshot of the crosspost queue.
    pub fn queue(&self) -> Vec<CrosspostEntry> {
        self.lock().queue.clone()
    }
}

// =============================================================================
// POSTS
// =============================================================================

#[async_trait]
impl PostRepository for MemoryStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<Post>> {
        let state = self.lock();
        Self::check(&state, "posts.fetch")?;
        Ok(state.posts.get(&id).cloned())
    }

    async fn save(&self, post: &Post) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "posts.save")?;

        let clash = state.posts.values().find(|other| {
            other.id != post.id
                && ((!post.slug.is_empty() && other.slug == post.slug)
                    || (post.permalink.is_some() && other.permalink == post.permalink))
        });
        if let Some(other) = clash {
            return Err(Error::Conflict(format!(
                "post slug or permalink already held by {}",
                other.id
            )));
        }

        let mut stored = post.clone();
        if let Some(existing) = state.posts.get(&post.id) {
            stored.tags = existing.tags.clone();
            stored.uploads = existing.uploads.clone();
            stored.created_at = existing.created_at;
        } else {
            stored.tags.clear();
            stored.uploads.clear();
        }
        state.posts.insert(post.id, stored);
        Ok(())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let state = self.lock();
        Self::check(&state, "posts.slug_exists")?;
        Ok(state.posts.values().any(|p| p.slug == slug))
    }

    async fn permalink_exists(&self, permalink: &str) -> Result<bool> {
        let state = self.lock();
        Self::check(&state, "posts.permalink_exists")?;
        Ok(state
            .posts
            .values()
            .any(|p| p.permalink.as_deref() == Some(permalink)))
    }

    async fn set_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "posts.set_tags")?;
        let post = state
            .posts
            .get_mut(&post_id)
            .ok_or(Error::PostNotFound(post_id))?;
        post.tags = tag_ids.to_vec();
        Ok(())
    }

    async fn set_uploads(&self, post_id: Uuid, asset_ids: &[Uuid]) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "posts.set_uploads")?;
        let post = state
            .posts
            .get_mut(&post_id)
            .ok_or(Error::PostNotFound(post_id))?;
        post.uploads = asset_ids.to_vec();
        Ok(())
    }
}

// =============================================================================
// TAGS, CONTEXTS, COLLECTIONS
// =============================================================================

#[async_trait]
impl TagRepository for MemoryStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<Tag>> {
        let state = self.lock();
        Self::check(&state, "tags.find_by_title")?;
        Ok(state.tags.iter().find(|t| t.title == title).cloned())
    }

    async fn create(&self, title: &str) -> Result<Tag> {
        let mut state = self.lock();
        Self::check(&state, "tags.create")?;
        if state.tags.iter().any(|t| t.title == title) {
            return Err(Error::Conflict(format!("tag '{}' already exists", title)));
        }
        let tag = Tag {
            id: Uuid::now_v7(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        state.tags.push(tag.clone());
        Ok(tag)
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Tag>> {
        let state = self.lock();
        Self::check(&state, "tags.fetch_many")?;
        Ok(ids
            .iter()
            .filter_map(|id| state.tags.iter().find(|t| t.id == *id).cloned())
            .collect())
    }
}

#[async_trait]
impl ContextRepository for MemoryStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<Context>> {
        let state = self.lock();
        Self::check(&state, "contexts.find_by_title")?;
        Ok(state.contexts.iter().find(|c| c.title == title).cloned())
    }

    async fn delete_links_for_post(&self, post_id: Uuid) -> Result<u64> {
        let mut state = self.lock();
        Self::check(&state, "contexts.delete_links_for_post")?;
        let before = state.context_links.len();
        state.context_links.retain(|(p, _)| *p != post_id);
        Ok((before - state.context_links.len()) as u64)
    }

    async fn link(&self, post_id: Uuid, context_id: Uuid) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "contexts.link")?;
        if !state.context_links.contains(&(post_id, context_id)) {
            state.context_links.push((post_id, context_id));
        }
        Ok(())
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Context>> {
        let state = self.lock();
        Self::check(&state, "contexts.list_for_post")?;
        let mut contexts: Vec<Context> = state
            .context_links
            .iter()
            .filter(|(p, _)| *p == post_id)
            .filter_map(|(_, c)| state.contexts.iter().find(|ctx| ctx.id == *c).cloned())
            .collect();
        contexts.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(contexts)
    }
}

#[async_trait]
impl CollectionRepository for MemoryStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<Collection>> {
        let state = self.lock();
        Self::check(&state, "collections.find_by_title")?;
        Ok(state.collections.iter().find(|c| c.title == title).cloned())
    }

    async fn create(&self, req: NewCollection) -> Result<Collection> {
        let mut state = self.lock();
        Self::check(&state, "collections.create")?;
        if state
            .collections
            .iter()
            .any(|c| c.title == req.title || c.slug == req.slug)
        {
            return Err(Error::Conflict(format!(
                "collection '{}' already exists",
                req.title
            )));
        }
        let collection = Collection {
            id: Uuid::now_v7(),
            title: req.title,
            slug: req.slug,
            description: req.description,
            created_at: Utc::now(),
        };
        state.collections.push(collection.clone());
        Ok(collection)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let state = self.lock();
        Self::check(&state, "collections.slug_exists")?;
        Ok(state.collections.iter().any(|c| c.slug == slug))
    }

    async fn delete_links_for_post(&self, post_id: Uuid) -> Result<u64> {
        let mut state = self.lock();
        Self::check(&state, "collections.delete_links_for_post")?;
        let before = state.collection_links.len();
        state.collection_links.retain(|(p, _, _)| *p != post_id);
        Ok((before - state.collection_links.len()) as u64)
    }

    async fn link(&self, post_id: Uuid, collection_id: Uuid, order: i32) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "collections.link")?;
        state
            .collection_links
            .retain(|(p, c, _)| !(*p == post_id && *c == collection_id));
        state.collection_links.push((post_id, collection_id, order));
        Ok(())
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CollectionMembership>> {
        let state = self.lock();
        Self::check(&state, "collections.list_for_post")?;
        let mut memberships: Vec<CollectionMembership> = state
            .collection_links
            .iter()
            .filter(|(p, _, _)| *p == post_id)
            .filter_map(|(_, c, order)| {
                state
                    .collections
                    .iter()
                    .find(|col| col.id == *c)
                    .map(|collection| CollectionMembership {
                        collection: collection.clone(),
                        order: *order,
                    })
            })
            .collect();
        memberships.sort_by_key(|m| m.order);
        Ok(memberships)
    }
}

// =============================================================================
// CHAPTERS
// =============================================================================

#[async_trait]
impl ChapterRepository for MemoryStore {
    async fn delete_for_post(&self, post_id: Uuid) -> Result<u64> {
        let mut state = self.lock();
        Self::check(&state, "chapters.delete_for_post")?;
        let before = state.chapters.len();
        state.chapters.retain(|c| c.post_id != post_id);
        Ok((before - state.chapters.len()) as u64)
    }

    async fn create(&self, req: NewChapter) -> Result<Chapter> {
        let mut state = self.lock();
        Self::check(&state, "chapters.create")?;
        if state.chapters.iter().any(|c| c.slug == req.slug) {
            return Err(Error::Conflict(format!(
                "chapter slug '{}' already exists",
                req.slug
            )));
        }
        let chapter = Chapter {
            id: Uuid::now_v7(),
            permalink: req.permalink(),
            post_id: req.post_id,
            title: req.title,
            slug: req.slug,
            order: req.order,
            parent_chapter: req.parent_chapter,
        };
        state.chapters.push(chapter.clone());
        Ok(chapter)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let state = self.lock();
        Self::check(&state, "chapters.slug_exists")?;
        Ok(state.chapters.iter().any(|c| c.slug == slug))
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Chapter>> {
        let state = self.lock();
        Self::check(&state, "chapters.list_for_post")?;
        let mut chapters: Vec<Chapter> = state
            .chapters
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.order);
        Ok(chapters)
    }
}

// =============================================================================
// ASSETS
// =============================================================================

#[async_trait]
impl AssetStore for MemoryStore {
    async fn store(&self, req: NewAsset) -> Result<Asset> {
        let mut state = self.lock();
        Self::check(&state, "assets.store")?;
        let asset = Asset {
            id: Uuid::now_v7(),
            file: sanitize_filename(&req.filename),
            description: req.description,
            media_type: req.media_type,
            content_type: req.content_type,
            size_bytes: req.data.len() as i64,
            source_url: req.source_url,
            created_at: Utc::now(),
        };
        state.assets.insert(asset.id, (asset.clone(), req.data));
        Ok(asset)
    }
}

#[async_trait]
impl AssetRepository for MemoryStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<Asset>> {
        let state = self.lock();
        Self::check(&state, "assets.fetch")?;
        Ok(state.assets.get(&id).map(|(asset, _)| asset.clone()))
    }

    async fn read(&self, id: Uuid) -> Result<Option<(Asset, Vec<u8>)>> {
        let state = self.lock();
        Self::check(&state, "assets.read")?;
        Ok(state.assets.get(&id).cloned())
    }
}

// =============================================================================
// CROSSPOSTING
// =============================================================================

#[async_trait]
impl CrosspostRepository for MemoryStore {
    async fn latest_account(&self, platform: Platform) -> Result<Option<PlatformAccount>> {
        let state = self.lock();
        Self::check(&state, "crossposts.latest_account")?;
        // Later pushes win ties on created_at
        Ok(state
            .accounts
            .iter()
            .enumerate()
            .filter(|(_, a)| a.platform == platform)
            .max_by_key(|(i, a)| (a.created_at, *i))
            .map(|(_, a)| a.clone()))
    }

    async fn enqueue(&self, req: NewCrosspostEntry) -> Result<CrosspostEntry> {
        let mut state = self.lock();
        Self::check(&state, "crossposts.enqueue")?;
        let entry = CrosspostEntry {
            id: Uuid::now_v7(),
            post_id: req.post_id,
            platform: req.platform,
            kind: req.kind,
            status: QueueStatus::Queued,
            account_id: req.account_id,
            created_at: Utc::now(),
        };
        state.queue.push(entry.clone());
        Ok(entry)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CrosspostEntry>> {
        let state = self.lock();
        Self::check(&state, "crossposts.list_for_post")?;
        Ok(state
            .queue
            .iter()
            .filter(|e| e.post_id == post_id)
            .cloned()
            .collect())
    }
}
