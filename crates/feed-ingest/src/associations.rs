//! Tag, context and collection reconciliation.
//!
//! Every declared association is best-effort: a name that cannot be resolved
//! or linked is recorded in the report and the rest still go through.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use feed_core::{
    unique_slug, Collection, CollectionRepository, NewCollection, Repositories, Result,
    SlugNamespace, Tag, TagRepository,
};

use crate::report::{AssociationKind, Degradation, IngestReport};

/// Collection slugs as a slug namespace.
struct CollectionSlugs<'a>(&'a dyn CollectionRepository);

#[async_trait]
impl SlugNamespace for CollectionSlugs<'_> {
    async fn is_taken(&self, candidate: &str) -> Result<bool> {
        self.0.slug_exists(candidate).await
    }
}

/// Names in declared order with exact duplicates removed, paired with
/// their declared position.
fn distinct(names: &[String]) -> Vec<(usize, &str)> {
    let mut seen = HashSet::new();
    names
        .iter()
        .enumerate()
        .filter(|&(_, name)| seen.insert(name.as_str()))
        .map(|(i, name)| (i, name.as_str()))
        .collect()
}

/// Find a tag by title, creating it if missing.
///
/// A conflicting concurrent insert is resolved by looking the title up once
/// more.
pub async fn get_or_create_tag(tags: &dyn TagRepository, title: &str) -> Result<Tag> {
    if let Some(tag) = tags.find_by_title(title).await? {
        return Ok(tag);
    }
    match tags.create(title).await {
        Ok(tag) => Ok(tag),
        Err(e) if e.is_conflict() => {
            debug!(title, "Tag created concurrently, retrying lookup");
            tags.find_by_title(title).await?.ok_or(e)
        }
        Err(e) => Err(e),
    }
}

/// Find a collection by title, creating it with an empty description and a
/// fresh slug if missing.
pub async fn get_or_create_collection(
    collections: &dyn CollectionRepository,
    title: &str,
) -> Result<Collection> {
    if let Some(collection) = collections.find_by_title(title).await? {
        return Ok(collection);
    }
    let slug = unique_slug(title, &CollectionSlugs(collections)).await?;
    let req = NewCollection {
        title: title.to_string(),
        slug,
        description: String::new(),
    };
    match collections.create(req).await {
        Ok(collection) => Ok(collection),
        Err(e) if e.is_conflict() => {
            debug!(title, "Collection created concurrently, retrying lookup");
            collections.find_by_title(title).await?.ok_or(e)
        }
        Err(e) => Err(e),
    }
}

/// Resolve the declared tags and replace the post's tag references with
/// them. Returns the ids that were set, or `None` if the post kept its old
/// tags.
pub async fn reconcile_tags(
    repos: &Repositories,
    post_id: Uuid,
    names: &[String],
    report: &mut IngestReport,
) -> Option<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(names.len());
    for (_, name) in distinct(names) {
        match get_or_create_tag(repos.tags.as_ref(), name).await {
            Ok(tag) => ids.push(tag.id),
            Err(e) => report.degrade(Degradation::AssociationLookup {
                kind: AssociationKind::Tag,
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    if let Err(e) = repos.posts.set_tags(post_id, &ids).await {
        report.degrade(Degradation::AssociationLookup {
            kind: AssociationKind::Tag,
            name: names.join(", "),
            reason: e.to_string(),
        });
        return None;
    }

    debug!(%post_id, count = ids.len(), "Tags reconciled");
    Some(ids)
}

/// Replace the post's context links with the declared contexts that exist.
///
/// Contexts are never created here; unknown names are reported.
pub async fn reconcile_contexts(
    repos: &Repositories,
    post_id: Uuid,
    names: &[String],
    report: &mut IngestReport,
) {
    let contexts = repos.contexts.as_ref();
    if let Err(e) = contexts.delete_links_for_post(post_id).await {
        report.degrade(Degradation::AssociationLookup {
            kind: AssociationKind::Context,
            name: names.join(", "),
            reason: format!("could not clear existing links: {}", e),
        });
        return;
    }

    let mut linked = 0;
    for (_, name) in distinct(names) {
        let degraded = |reason: String| Degradation::AssociationLookup {
            kind: AssociationKind::Context,
            name: name.to_string(),
            reason,
        };
        match contexts.find_by_title(name).await {
            Ok(Some(context)) => match contexts.link(post_id, context.id).await {
                Ok(()) => linked += 1,
                Err(e) => report.degrade(degraded(e.to_string())),
            },
            Ok(None) => report.degrade(degraded("context not found".to_string())),
            Err(e) => report.degrade(degraded(e.to_string())),
        }
    }
    debug!(%post_id, linked, "Contexts reconciled");
}

/// Replace the post's collection links, creating missing collections.
///
/// Each link's order is the collection's position in the declared list.
pub async fn reconcile_collections(
    repos: &Repositories,
    post_id: Uuid,
    names: &[String],
    report: &mut IngestReport,
) {
    let collections = repos.collections.as_ref();
    if let Err(e) = collections.delete_links_for_post(post_id).await {
        report.degrade(Degradation::AssociationLookup {
            kind: AssociationKind::Collection,
            name: names.join(", "),
            reason: format!("could not clear existing links: {}", e),
        });
        return;
    }

    let mut linked = 0;
    for (position, name) in distinct(names) {
        let result = match get_or_create_collection(collections, name).await {
            Ok(collection) => {
                let order = i32::try_from(position).unwrap_or(i32::MAX);
                collections.link(post_id, collection.id, order).await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => linked += 1,
            Err(e) => report.degrade(Degradation::AssociationLookup {
                kind: AssociationKind::Collection,
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }
    info!(
        subsystem = "ingest",
        component = "associations",
        %post_id,
        linked,
        "Collections reconciled"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use feed_core::{slugify, CollectionMembership, Error};

    use super::*;

    /// Loses every insert to a concurrent writer. The first lookup misses,
    /// later lookups see `winner`.
    struct RacingStore<T> {
        winner: Option<T>,
        lookups: AtomicUsize,
    }

    impl<T: Clone> RacingStore<T> {
        fn new(winner: Option<T>) -> Self {
            Self {
                winner,
                lookups: AtomicUsize::new(0),
            }
        }

        fn lookup(&self) -> Option<T> {
            match self.lookups.fetch_add(1, Ordering::SeqCst) {
                0 => None,
                _ => self.winner.clone(),
            }
        }
    }

    #[async_trait]
    impl TagRepository for RacingStore<Tag> {
        async fn find_by_title(&self, _title: &str) -> Result<Option<Tag>> {
            Ok(self.lookup())
        }

        async fn create(&self, title: &str) -> Result<Tag> {
            Err(Error::Conflict(format!("tag '{}' exists", title)))
        }

        async fn fetch_many(&self, _ids: &[Uuid]) -> Result<Vec<Tag>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl CollectionRepository for RacingStore<Collection> {
        async fn find_by_title(&self, _title: &str) -> Result<Option<Collection>> {
            Ok(self.lookup())
        }

        async fn create(&self, req: NewCollection) -> Result<Collection> {
            Err(Error::Conflict(format!("collection '{}' exists", req.title)))
        }

        async fn slug_exists(&self, _slug: &str) -> Result<bool> {
            Ok(false)
        }

        async fn delete_links_for_post(&self, _post_id: Uuid) -> Result<u64> {
            Ok(0)
        }

        async fn link(&self, _post_id: Uuid, _collection_id: Uuid, _order: i32) -> Result<()> {
            Ok(())
        }

        async fn list_for_post(&self, _post_id: Uuid) -> Result<Vec<CollectionMembership>> {
            Ok(Vec::new())
        }
    }

    fn tag(title: &str) -> Tag {
        Tag {
            id: Uuid::now_v7(),
            title: title.to_string(),
            created_at: Utc::now(),
        }
    }

    fn collection(title: &str) -> Collection {
        Collection {
            id: Uuid::now_v7(),
            title: title.to_string(),
            slug: slugify(title),
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_tag_conflict_resolved_by_second_lookup() {
        let winner = tag("rust");
        let store = RacingStore::new(Some(winner.clone()));

        let found = get_or_create_tag(&store, "rust").await.unwrap();

        assert_eq!(found, winner);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tag_conflict_without_row_returns_error() {
        let store = RacingStore::<Tag>::new(None);

        let err = get_or_create_tag(&store, "rust").await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_collection_conflict_resolved_by_second_lookup() {
        let winner = collection("Field Notes");
        let store = RacingStore::new(Some(winner.clone()));

        let found = get_or_create_collection(&store, "Field Notes").await.unwrap();

        assert_eq!(found, winner);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_collection_conflict_without_row_returns_error() {
        let store = RacingStore::<Collection>::new(None);

        let err = get_or_create_collection(&store, "Field Notes")
            .await
            .unwrap_err();

        assert!(err.is_conflict());
    }

    #[test]
    fn test_distinct_keeps_first_position() {
        let names: Vec<String> = ["a", "b", "a", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(distinct(&names), vec![(0, "a"), (1, "b"), (3, "c")]);
    }
}
