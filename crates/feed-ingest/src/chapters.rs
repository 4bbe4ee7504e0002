//! Chapter rebuilding from the heading outline.

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use feed_core::{outline, unique_slug, ChapterRepository, NewChapter, Result, SlugNamespace};

use crate::report::{Degradation, IngestReport};

/// Chapter slugs as a slug namespace.
struct ChapterSlugs<'a>(&'a dyn ChapterRepository);

#[async_trait]
impl SlugNamespace for ChapterSlugs<'_> {
    async fn is_taken(&self, candidate: &str) -> Result<bool> {
        self.0.slug_exists(candidate).await
    }
}

/// Delete the post's chapters and create one per heading in `body`.
///
/// A heading whose parent could not be created is attached to nothing
/// rather than dropped. Returns the number of chapters created.
pub async fn rebuild_chapters(
    chapters: &dyn ChapterRepository,
    post_id: Uuid,
    body: &str,
    report: &mut IngestReport,
) -> usize {
    match chapters.delete_for_post(post_id).await {
        Ok(removed) => debug!(%post_id, removed, "Existing chapters removed"),
        Err(e) => {
            report.degrade(Degradation::ChapterBuild {
                title: None,
                reason: format!("could not clear existing chapters: {}", e),
            });
            return 0;
        }
    }

    let entries = outline(body);
    // Indexed by outline order; `None` where creation failed.
    let mut created: Vec<Option<Uuid>> = Vec::with_capacity(entries.len());

    for entry in &entries {
        let parent_chapter = entry
            .parent
            .as_ref()
            .and_then(|parent| created.get(parent.order).copied().flatten());

        let result = match unique_slug(&entry.title, &ChapterSlugs(chapters)).await {
            Ok(slug) => {
                chapters
                    .create(NewChapter {
                        post_id,
                        title: entry.title.clone(),
                        slug,
                        order: i32::try_from(entry.order).unwrap_or(i32::MAX),
                        parent_chapter,
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(chapter) => created.push(Some(chapter.id)),
            Err(e) => {
                created.push(None);
                report.degrade(Degradation::ChapterBuild {
                    title: Some(entry.title.clone()),
                    reason: e.to_string(),
                });
            }
        }
    }

    let count = created.iter().flatten().count();
    info!(
        subsystem = "ingest",
        component = "chapters",
        %post_id,
        headings = entries.len(),
        created = count,
        "Chapters rebuilt"
    );
    count
}
