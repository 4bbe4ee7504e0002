//! Core data models for the feed post service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

// =============================================================================
// POSTS
// =============================================================================

/// A published (or draft) post built from a markdown document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    /// URL-safe identifier, unique across posts once non-empty.
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    /// Markdown body after asset rewriting.
    pub content: String,
    pub is_visible: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<Uuid>,
    /// Tag ids, stored directly on the post.
    #[serde(default)]
    pub tags: Vec<Uuid>,
    /// Assets created while ingesting this post's content.
    #[serde(default)]
    pub uploads: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// A blank post with a fresh time-ordered id, not yet persisted.
    pub fn draft() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: String::new(),
            subtitle: String::new(),
            slug: String::new(),
            permalink: None,
            content: String::new(),
            is_visible: false,
            summary: String::new(),
            featured_image: None,
            tags: Vec::new(),
            uploads: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// NAMED ENTITIES
// =============================================================================

/// A tag, globally unique by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A context. Contexts are curated by hand and never created by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// An ordered grouping of posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Request to create a new collection.
#[derive(Debug, Clone)]
pub struct NewCollection {
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post's membership in a collection, with its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMembership {
    #[serde(flatten)]
    pub collection: Collection,
    pub order: i32,
}

// =============================================================================
// CHAPTERS
// =============================================================================

/// A heading-derived chapter of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub post_id: Uuid,
    pub title: String,
    pub slug: String,
    /// In-page anchor, `#<slug>`.
    pub permalink: String,
    /// Zero-based position of the heading in the document.
    pub order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_chapter: Option<Uuid>,
}

/// Request to create a chapter.
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub post_id: Uuid,
    pub title: String,
    pub slug: String,
    pub order: i32,
    pub parent_chapter: Option<Uuid>,
}

impl NewChapter {
    /// Anchor link for this chapter within its post.
    pub fn permalink(&self) -> String {
        format!("#{}", self.slug)
    }
}

// =============================================================================
// ASSETS
// =============================================================================

/// Kind of media an asset holds, inferred from its file extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
    Markdown,
}

impl MediaType {
    /// Classify a filename by its extension. Unknown extensions are images.
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" | "avi" | "mov" | "mkv" | "webm" => Self::Video,
            "md" | "txt" => Self::Markdown,
            _ => Self::Image,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Markdown => write!(f, "markdown"),
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "markdown" => Ok(Self::Markdown),
            _ => Err(format!("Invalid media type: {}", s)),
        }
    }
}

/// A stored binary managed by this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    /// Sanitized filename the bytes are stored under.
    pub file: String,
    #[serde(default)]
    pub description: String,
    pub media_type: MediaType,
    pub content_type: String,
    pub size_bytes: i64,
    /// Where the bytes were fetched from, for remote references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Managed URL for this asset, `/api/files/uploads/<id>/<file>`.
    pub fn url(&self) -> String {
        managed_asset_url(self.id, &self.file)
    }
}

/// Build the managed URL for an asset id and filename.
pub fn managed_asset_url(id: Uuid, file: &str) -> String {
    format!(
        "{}{}/{}/{}",
        defaults::MANAGED_FILES_PREFIX,
        defaults::UPLOADS_COLLECTION,
        id,
        file
    )
}

/// Request to store a new asset.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub filename: String,
    pub description: String,
    pub media_type: MediaType,
    pub content_type: String,
    pub source_url: Option<String>,
    pub data: Vec<u8>,
}

// =============================================================================
// CROSSPOSTING
// =============================================================================

/// External platform a post can be republished to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Threads,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instagram => write!(f, "instagram"),
            Self::Threads => write!(f, "threads"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "instagram" => Ok(Self::Instagram),
            "threads" => Ok(Self::Threads),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

/// Whether a crosspost publishes a new post or refreshes an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrosspostKind {
    Create,
    Update,
}

impl std::fmt::Display for CrosspostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
        }
    }
}

impl std::str::FromStr for CrosspostKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            _ => Err(format!("Invalid crosspost kind: {}", s)),
        }
    }
}

/// Lifecycle of a crosspost queue entry. Ingestion only ever writes `Queued`;
/// the publisher advances the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    #[default]
    Queued,
    Published,
    Failed,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Published => write!(f, "published"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid queue status: {}", s)),
        }
    }
}

/// A connected account on an external platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAccount {
    pub id: Uuid,
    pub platform: Platform,
    pub handle: String,
    pub created_at: DateTime<Utc>,
}

/// A queued request to republish a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrosspostEntry {
    pub id: Uuid,
    pub post_id: Uuid,
    pub platform: Platform,
    pub kind: CrosspostKind,
    pub status: QueueStatus,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Request to enqueue a crosspost.
#[derive(Debug, Clone)]
pub struct NewCrosspostEntry {
    pub post_id: Uuid,
    pub platform: Platform,
    pub kind: CrosspostKind,
    pub account_id: Uuid,
}

// =============================================================================
// RESPONSE VIEW
// =============================================================================

/// A post with its relations expanded, as returned to submitters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub expand: PostRelations,
}

/// Expanded relations of a post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostRelations {
    pub tags: Vec<Tag>,
    pub contexts: Vec<Context>,
    pub collections: Vec<CollectionMembership>,
    pub chapters: Vec<Chapter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<Asset>,
    pub uploads: Vec<Asset>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_filename() {
        assert_eq!(MediaType::from_filename("clip.mp4"), MediaType::Video);
        assert_eq!(MediaType::from_filename("CLIP.MOV"), MediaType::Video);
        assert_eq!(MediaType::from_filename("notes.md"), MediaType::Markdown);
        assert_eq!(MediaType::from_filename("readme.txt"), MediaType::Markdown);
        assert_eq!(MediaType::from_filename("photo.png"), MediaType::Image);
        assert_eq!(MediaType::from_filename("archive.bin"), MediaType::Image);
        assert_eq!(MediaType::from_filename("no_extension"), MediaType::Image);
    }

    #[test]
    fn test_media_type_round_trips_through_str() {
        for mt in [MediaType::Image, MediaType::Video, MediaType::Markdown] {
            assert_eq!(mt.to_string().parse::<MediaType>().unwrap(), mt);
        }
        assert!("audio".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_platform_parse_is_case_insensitive() {
        assert_eq!("Instagram".parse::<Platform>().unwrap(), Platform::Instagram);
        assert_eq!("THREADS".parse::<Platform>().unwrap(), Platform::Threads);
    }

    #[test]
    fn test_asset_url() {
        let id = Uuid::nil();
        let asset = Asset {
            id,
            file: "cat.png".to_string(),
            description: String::new(),
            media_type: MediaType::Image,
            content_type: "image/png".to_string(),
            size_bytes: 3,
            source_url: None,
            created_at: Utc::now(),
        };
        assert_eq!(asset.url(), format!("/api/files/uploads/{}/cat.png", id));
    }

    #[test]
    fn test_new_chapter_permalink() {
        let chapter = NewChapter {
            post_id: Uuid::nil(),
            title: "Intro".to_string(),
            slug: "intro".to_string(),
            order: 0,
            parent_chapter: None,
        };
        assert_eq!(chapter.permalink(), "#intro");
    }

    #[test]
    fn test_post_draft_is_blank() {
        let post = Post::draft();
        assert!(post.slug.is_empty());
        assert!(!post.is_visible);
        assert!(post.tags.is_empty());
        assert!(post.permalink.is_none());
    }

    #[test]
    fn test_post_view_flattens_post_fields() {
        let view = PostView {
            post: Post::draft(),
            expand: PostRelations::default(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("id").is_some());
        assert!(json.get("slug").is_some());
        assert!(json["expand"]["tags"].as_array().unwrap().is_empty());
    }
}
