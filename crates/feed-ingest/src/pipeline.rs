//! The create-or-update flow for one submitted document.
//!
//! Parsing, loading the post and saving its scalar fields are fatal. Every
//! later step is best-effort and lands in the [`IngestReport`], including
//! reading the saved post back for the response.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use feed_core::defaults::FEATURED_IMAGE_DESCRIPTION;
use feed_core::{
    parse_frontmatter, unique_slug, Asset, CrosspostKind, Document, Error, Post, PostRelations,
    PostRepository, PostView, Repositories, Result, SlugNamespace,
};

use crate::assets::{clean_reference, managed_asset_id, AssetResolver, Reference};
use crate::associations::{reconcile_collections, reconcile_contexts, reconcile_tags};
use crate::chapters::rebuild_chapters;
use crate::config::IngestConfig;
use crate::crosspost::{enqueue_crossposts, requested_platforms};
use crate::error::IngestError;
use crate::report::{Degradation, IngestReport};

/// What a submission does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Create,
    /// Update the existing post with this id.
    Update(Uuid),
}

impl Submission {
    fn op(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update(_) => "update",
        }
    }

    fn crosspost_kind(&self) -> CrosspostKind {
        match self {
            Self::Create => CrosspostKind::Create,
            Self::Update(_) => CrosspostKind::Update,
        }
    }
}

/// A processed post and what went wrong along the way.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub post: PostView,
    pub report: IngestReport,
}

/// Post slugs as a slug namespace. With a base URL configured the derived
/// permalink must be free as well.
struct PostSlugs<'a> {
    posts: &'a dyn PostRepository,
    config: &'a IngestConfig,
}

#[async_trait]
impl SlugNamespace for PostSlugs<'_> {
    async fn is_taken(&self, candidate: &str) -> Result<bool> {
        if self.posts.slug_exists(candidate).await? {
            return Ok(true);
        }
        match self.config.permalink_for(candidate) {
            Some(permalink) => self.posts.permalink_exists(&permalink).await,
            None => Ok(false),
        }
    }
}

fn relation_failed(relation: &'static str, e: Error) -> Degradation {
    Degradation::RelationLoad {
        relation,
        reason: e.to_string(),
    }
}

/// Turns markdown documents into posts.
#[derive(Clone)]
pub struct PostIngestor {
    repos: Repositories,
    resolver: AssetResolver,
    config: IngestConfig,
}

impl PostIngestor {
    pub fn new(repos: Repositories, config: IngestConfig) -> Result<Self> {
        Ok(Self {
            resolver: AssetResolver::new(&config)?,
            repos,
            config,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    /// Ingest a raw document.
    pub async fn submit(
        &self,
        document: &[u8],
        submission: Submission,
    ) -> std::result::Result<IngestOutcome, IngestError> {
        let start = Instant::now();

        let text = std::str::from_utf8(document)
            .map_err(|e| IngestError::BadInput(format!("document is not valid UTF-8: {}", e)))?;
        let Document { frontmatter, body } =
            parse_frontmatter(text).map_err(|e| IngestError::BadInput(e.to_string()))?;

        let mut post = match submission {
            Submission::Create => Post::draft(),
            Submission::Update(id) => self
                .repos
                .posts
                .fetch(id)
                .await
                .map_err(IngestError::Persistence)?
                .ok_or(IngestError::NotFound(id))?,
        };
        let mut report = IngestReport::default();

        if post.slug.is_empty() {
            let namespace = PostSlugs {
                posts: self.repos.posts.as_ref(),
                config: &self.config,
            };
            post.slug = unique_slug(&frontmatter.title, &namespace)
                .await
                .map_err(IngestError::Persistence)?;
            debug!(post_id = %post.id, slug = %post.slug, "Slug assigned");
        }
        if let Some(permalink) = self.config.permalink_for(&post.slug) {
            post.permalink = Some(permalink);
        }

        let rewrite = self
            .resolver
            .rewrite(&body, self.repos.asset_store.as_ref())
            .await;
        for failure in rewrite.failures {
            report.degrade(Degradation::AssetFetch {
                reference: failure.reference,
                reason: failure.reason,
            });
        }
        report.assets_created = rewrite.assets.len();
        report.assets_skipped = rewrite.skipped;
        let mut created: Vec<Uuid> = rewrite.assets.iter().map(|a| a.id).collect();

        match frontmatter
            .featured_image
            .as_deref()
            .map(clean_reference)
            .filter(|r| !r.is_empty())
        {
            None => post.featured_image = None,
            Some(reference) => match self.resolve_featured(reference).await {
                Ok((id, stored)) => {
                    post.featured_image = Some(id);
                    if let Some(asset) = stored {
                        created.push(asset.id);
                        report.assets_created += 1;
                    }
                }
                Err(e) => report.degrade(Degradation::FeaturedImage {
                    reference: reference.to_string(),
                    reason: e.to_string(),
                }),
            },
        }

        post.title = frontmatter.title.clone();
        post.subtitle = frontmatter.subtitle.clone();
        post.content = rewrite.body;
        post.is_visible = frontmatter.is_visible;
        post.summary = frontmatter.summary.clone();
        post.updated_at = Utc::now();

        self.repos
            .posts
            .save(&post)
            .await
            .map_err(IngestError::Persistence)?;

        if let Some(tags) =
            reconcile_tags(&self.repos, post.id, &frontmatter.tags, &mut report).await
        {
            post.tags = tags;
        }
        reconcile_contexts(&self.repos, post.id, &frontmatter.contexts, &mut report).await;
        reconcile_collections(&self.repos, post.id, &frontmatter.collections, &mut report).await;

        rebuild_chapters(
            self.repos.chapters.as_ref(),
            post.id,
            &post.content,
            &mut report,
        )
        .await;

        if !created.is_empty() {
            let mut uploads = post.uploads.clone();
            for id in created {
                if !uploads.contains(&id) {
                    uploads.push(id);
                }
            }
            match self.repos.posts.set_uploads(post.id, &uploads).await {
                Ok(()) => post.uploads = uploads,
                Err(e) => report.degrade(Degradation::UploadLink {
                    reason: e.to_string(),
                }),
            }
        }

        let platforms = requested_platforms(&frontmatter);
        if !platforms.is_empty() {
            enqueue_crossposts(
                self.repos.crossposts.as_ref(),
                post.id,
                &platforms,
                submission.crosspost_kind(),
                &mut report,
            )
            .await;
        }

        let stored = match self.repos.posts.fetch(post.id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                report.degrade(Degradation::RelationLoad {
                    relation: "post",
                    reason: "saved post not found on read-back".to_string(),
                });
                post
            }
            Err(e) => {
                report.degrade(Degradation::RelationLoad {
                    relation: "post",
                    reason: e.to_string(),
                });
                post
            }
        };
        let view = self.view(stored, &mut report).await;

        info!(
            subsystem = "ingest",
            component = "pipeline",
            op = submission.op(),
            post_id = %view.post.id,
            slug = %view.post.slug,
            assets = report.assets_created,
            degradations = report.degradations.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Post ingested"
        );

        Ok(IngestOutcome { post: view, report })
    }

    /// Expand a post's relations.
    ///
    /// A relation that can't be read is left empty and reported.
    pub async fn view(&self, post: Post, report: &mut IngestReport) -> PostView {
        let mut expand = PostRelations::default();

        match self.repos.tags.fetch_many(&post.tags).await {
            Ok(tags) => expand.tags = tags,
            Err(e) => report.degrade(relation_failed("tags", e)),
        }
        match self.repos.contexts.list_for_post(post.id).await {
            Ok(contexts) => expand.contexts = contexts,
            Err(e) => report.degrade(relation_failed("contexts", e)),
        }
        match self.repos.collections.list_for_post(post.id).await {
            Ok(collections) => expand.collections = collections,
            Err(e) => report.degrade(relation_failed("collections", e)),
        }
        match self.repos.chapters.list_for_post(post.id).await {
            Ok(chapters) => expand.chapters = chapters,
            Err(e) => report.degrade(relation_failed("chapters", e)),
        }

        if let Some(id) = post.featured_image {
            match self.repos.assets.fetch(id).await {
                Ok(asset) => expand.featured_image = asset,
                Err(e) => report.degrade(relation_failed("featured image", e)),
            }
        }
        for id in &post.uploads {
            match self.repos.assets.fetch(*id).await {
                Ok(Some(asset)) => expand.uploads.push(asset),
                Ok(None) => {}
                Err(e) => {
                    report.degrade(relation_failed("uploads", e));
                    expand.uploads.clear();
                    break;
                }
            }
        }

        PostView { post, expand }
    }

    /// Resolve a featured image reference to an asset id.
    ///
    /// Managed URLs and bare ids must name an existing asset. Anything else
    /// is loaded and stored, and the new asset is returned alongside its id.
    async fn resolve_featured(&self, reference: &str) -> Result<(Uuid, Option<Asset>)> {
        if let Ok(id) = Uuid::parse_str(reference) {
            return self.existing_asset(id).await.map(|id| (id, None));
        }

        match self.resolver.classify(reference) {
            Reference::Managed => {
                let id = managed_asset_id(reference).ok_or_else(|| {
                    Error::InvalidInput(format!("{} does not name a managed asset", reference))
                })?;
                self.existing_asset(id).await.map(|id| (id, None))
            }
            Reference::Skipped(reason) => Err(Error::InvalidInput(reason.to_string())),
            target => {
                let asset = self
                    .resolver
                    .import(
                        &target,
                        FEATURED_IMAGE_DESCRIPTION.to_string(),
                        self.repos.asset_store.as_ref(),
                    )
                    .await?;
                Ok((asset.id, Some(asset)))
            }
        }
    }

    async fn existing_asset(&self, id: Uuid) -> Result<Uuid> {
        self.repos
            .assets
            .fetch(id)
            .await?
            .map(|asset| asset.id)
            .ok_or_else(|| Error::NotFound(format!("asset {}", id)))
    }
}
