//! Upload a document's local images and rewrite it to reference them.

use std::path::Path;

use tracing::{info, warn};

use feed_core::defaults::FEATURED_IMAGE_DESCRIPTION;
use feed_core::{parse_frontmatter, AssetStore, Document, Result};
use feed_ingest::{clean_reference, AssetFailure, AssetResolver, IngestConfig, LocalAccess, Reference};

/// A document ready for submission.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub title: String,
    /// Frontmatter and body, re-rendered after rewriting.
    pub text: String,
    pub uploaded: usize,
    pub failures: Vec<AssetFailure>,
}

/// Read the markdown file at `path` and upload its local images to `store`.
///
/// Relative references resolve against the file's directory. Remote
/// references and managed URLs are left alone for the server.
pub async fn prepare_document(path: &Path, store: &dyn AssetStore) -> Result<PreparedDocument> {
    let text = tokio::fs::read_to_string(path).await?;
    let Document {
        mut frontmatter,
        body,
    } = parse_frontmatter(&text)?;

    let base = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let config = IngestConfig::default()
        .with_fetch_remote(false)
        .with_local_access(LocalAccess::Unrestricted { base });
    let resolver = AssetResolver::new(&config)?;

    let rewrite = resolver.rewrite(&body, store).await;
    let mut uploaded = rewrite.assets.len();
    let mut failures = rewrite.failures;

    if let Some(raw) = frontmatter.featured_image.clone() {
        let reference = clean_reference(&raw);
        if let target @ Reference::Local(_) = resolver.classify(reference) {
            match resolver
                .import(&target, FEATURED_IMAGE_DESCRIPTION.to_string(), store)
                .await
            {
                Ok(asset) => {
                    frontmatter.featured_image = Some(asset.url());
                    uploaded += 1;
                }
                Err(e) => {
                    warn!(reference, error = %e, "Featured image not uploaded");
                    failures.push(AssetFailure {
                        reference: reference.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    let title = frontmatter.title.clone();
    let text = Document {
        frontmatter,
        body: rewrite.body,
    }
    .render()?;

    info!(path = %path.display(), uploaded, failed = failures.len(), "Document prepared");
    Ok(PreparedDocument {
        title,
        text,
        uploaded,
        failures,
    })
}
