//! Embedded asset resolution.
//!
//! Finds `![alt](url "title")` references in a markdown body, turns each
//! permitted one into a managed asset, and rewrites the reference to point
//! at the managed URL. References are classified exactly once:
//!
//! 1. **Managed**: the path starts with `/api/files/`. Never touched, which
//!    makes rewriting idempotent.
//! 2. **Remote**: `http`/`https` URLs, downloaded when remote fetching is on.
//! 3. **Local**: everything else, read only when [`LocalAccess`] allows it.
//!
//! Anything not permitted is skipped and counted. Only loads or stores that
//! fail are reported as failures, and a failure never aborts the rewrite.

use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Url};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use feed_core::defaults::{ASSET_ACCEPT, ASSET_DESCRIPTION, MANAGED_FILES_PREFIX};
use feed_core::{
    detect_content_type, extension_for_content_type, has_extension, sniff_extension, Asset,
    AssetStore, Error, MediaType, NewAsset, Result,
};

use crate::config::{IngestConfig, LocalAccess};

static IMAGE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[([^\]]*)\]\(([^)]+?)(?:\s+"([^"]*)")?\)"#)
        .expect("static image reference pattern is valid")
});

static DISPOSITION_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#)
        .expect("static content-disposition pattern is valid")
});

/// Where an embedded reference points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Already a managed asset URL.
    Managed,
    Remote(Url),
    Local(PathBuf),
    /// Not permitted under the current policy.
    Skipped(&'static str),
}

/// One `![alt](url "title")` occurrence in a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// The exact source text of the reference.
    pub snippet: String,
    pub alt: String,
    /// URL with surrounding whitespace and quotes removed.
    pub url: String,
    pub title: Option<String>,
}

impl ImageReference {
    /// The reference rewritten to point at `url`, keeping alt and title.
    pub fn with_url(&self, url: &str) -> String {
        match &self.title {
            Some(title) => format!("![{}]({} \"{}\")", self.alt, url, title),
            None => format!("![{}]({})", self.alt, url),
        }
    }
}

/// Find every image reference in `body`, left to right.
pub fn find_image_references(body: &str) -> Vec<ImageReference> {
    IMAGE_REFERENCE
        .captures_iter(body)
        .map(|caps| ImageReference {
            snippet: caps[0].to_string(),
            alt: caps[1].to_string(),
            url: clean_reference(&caps[2]).to_string(),
            title: caps
                .get(3)
                .map(|m| m.as_str().to_string())
                .filter(|t| !t.is_empty()),
        })
        .collect()
}

/// Asset id carried by a managed URL such as `/api/files/uploads/<id>/<file>`.
///
/// Absolute URLs whose path is managed are accepted too.
pub fn managed_asset_id(reference: &str) -> Option<Uuid> {
    let (_, rest) = reference.split_once(MANAGED_FILES_PREFIX)?;
    let mut segments = rest.split('/');
    let _collection = segments.next()?;
    Uuid::parse_str(segments.next()?).ok()
}

/// Strip surrounding whitespace and quotes from a raw reference.
pub fn clean_reference(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

/// Asset description from alt text and title.
///
/// `"alt - title"` when both are present and differ, otherwise whichever is
/// non-empty, otherwise `fallback`.
pub fn describe(alt: &str, title: Option<&str>, fallback: &str) -> String {
    let alt = alt.trim();
    let title = title.map(str::trim).unwrap_or_default();
    match (alt.is_empty(), title.is_empty()) {
        (false, false) if alt != title => format!("{} - {}", alt, title),
        (false, _) => alt.to_string(),
        (true, false) => title.to_string(),
        (true, true) => fallback.to_string(),
    }
}

/// A reference that could not be turned into an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFailure {
    pub reference: String,
    pub reason: String,
}

/// Result of rewriting a body.
#[derive(Debug, Clone, Default)]
pub struct RewriteOutcome {
    pub body: String,
    /// Assets created, in reference order.
    pub assets: Vec<Asset>,
    pub skipped: usize,
    pub failures: Vec<AssetFailure>,
}

/// Bytes loaded for a reference, ready to store.
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub filename: String,
    pub content_type: String,
    pub source_url: Option<String>,
    pub data: Vec<u8>,
}

impl LoadedAsset {
    fn into_new_asset(self, description: String) -> NewAsset {
        NewAsset {
            media_type: MediaType::from_filename(&self.filename),
            filename: self.filename,
            description,
            content_type: self.content_type,
            source_url: self.source_url,
            data: self.data,
        }
    }
}

/// Loads embedded references and stores them as managed assets.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    client: Client,
    local_access: LocalAccess,
    fetch_remote: bool,
    max_bytes: u64,
}

impl AssetResolver {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            local_access: config.local_access.clone(),
            fetch_remote: config.fetch_remote,
            max_bytes: config.max_asset_bytes,
        })
    }

    /// Classify a cleaned reference.
    pub fn classify(&self, reference: &str) -> Reference {
        if reference.starts_with(MANAGED_FILES_PREFIX) {
            return Reference::Managed;
        }

        match Url::parse(reference) {
            Ok(url) => match url.scheme().to_ascii_lowercase().as_str() {
                "http" | "https" if url.path().starts_with(MANAGED_FILES_PREFIX) => {
                    Reference::Managed
                }
                "http" | "https" if self.fetch_remote => Reference::Remote(url),
                "http" | "https" => Reference::Skipped("remote fetching disabled"),
                "file" => match url.to_file_path() {
                    Ok(path) => self.classify_local(path),
                    Err(()) => Reference::Skipped("unreadable file URL"),
                },
                _ => Reference::Skipped("unsupported scheme"),
            },
            Err(_) => self.classify_local(PathBuf::from(reference)),
        }
    }

    fn classify_local(&self, path: PathBuf) -> Reference {
        match &self.local_access {
            LocalAccess::Disabled => Reference::Skipped("local access disabled"),
            LocalAccess::Unrestricted { base } => {
                if path.is_absolute() {
                    Reference::Local(path)
                } else {
                    Reference::Local(base.join(path))
                }
            }
            LocalAccess::Roots(roots) => {
                let candidate = match roots.first() {
                    Some(first) if path.is_relative() => first.join(&path),
                    _ => path,
                };
                if candidate
                    .components()
                    .any(|c| matches!(c, Component::ParentDir))
                {
                    return Reference::Skipped("path escapes local roots");
                }
                if !roots.iter().any(|root| candidate.starts_with(root)) {
                    return Reference::Skipped("outside local roots");
                }
                Reference::Local(candidate)
            }
        }
    }

    /// Load the bytes behind a remote or local reference.
    pub async fn load(&self, reference: &Reference) -> Result<LoadedAsset> {
        match reference {
            Reference::Remote(url) => self.fetch_remote(url).await,
            Reference::Local(path) => self.read_local(path).await,
            Reference::Managed => Err(Error::InvalidInput(
                "reference is already a managed asset".to_string(),
            )),
            Reference::Skipped(reason) => Err(Error::InvalidInput(reason.to_string())),
        }
    }

    /// Load a reference and store it as an asset.
    pub async fn import(
        &self,
        reference: &Reference,
        description: String,
        store: &dyn AssetStore,
    ) -> Result<Asset> {
        let loaded = self.load(reference).await?;
        store.store(loaded.into_new_asset(description)).await
    }

    /// Replace every permitted reference in `body` with a managed asset URL.
    pub async fn rewrite(&self, body: &str, store: &dyn AssetStore) -> RewriteOutcome {
        let start = Instant::now();
        let mut outcome = RewriteOutcome {
            body: body.to_string(),
            ..Default::default()
        };

        for image in find_image_references(body) {
            let target = self.classify(&image.url);
            trace!(reference = %image.url, kind = ?target, "Classified asset reference");

            match &target {
                Reference::Managed => {
                    outcome.skipped += 1;
                    continue;
                }
                Reference::Skipped(reason) => {
                    debug!(reference = %image.url, reason = *reason, "Asset reference skipped");
                    outcome.skipped += 1;
                    continue;
                }
                Reference::Remote(_) | Reference::Local(_) => {}
            }

            let description = describe(&image.alt, image.title.as_deref(), ASSET_DESCRIPTION);
            match self.import(&target, description, store).await {
                Ok(asset) => {
                    outcome.body = outcome
                        .body
                        .replacen(&image.snippet, &image.with_url(&asset.url()), 1);
                    debug!(reference = %image.url, asset_id = %asset.id, "Asset stored");
                    outcome.assets.push(asset);
                }
                Err(e) => {
                    warn!(reference = %image.url, error = %e, "Asset could not be stored");
                    outcome.failures.push(AssetFailure {
                        reference: image.url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            subsystem = "ingest",
            component = "assets",
            op = "rewrite",
            created = outcome.assets.len(),
            skipped = outcome.skipped,
            failed = outcome.failures.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Asset references rewritten"
        );
        outcome
    }

    async fn fetch_remote(&self, url: &Url) -> Result<LoadedAsset> {
        let mut response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ASSET_ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Request(format!("GET {} returned {}", url, status)));
        }
        if let Some(len) = response.content_length() {
            self.check_size(len)?;
        }

        let content_type = header_value(&response, CONTENT_TYPE);
        let disposition = header_value(&response, CONTENT_DISPOSITION);

        // Content-Length may be absent or wrong; enforce the cap while streaming
        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            self.check_size((data.len() + chunk.len()) as u64)?;
            data.extend_from_slice(&chunk);
        }

        let name = disposition
            .as_deref()
            .and_then(disposition_filename)
            .or_else(|| url_filename(url))
            .unwrap_or_else(|| "download".to_string());
        let filename = ensure_extension(name, content_type.as_deref(), &data);

        Ok(LoadedAsset {
            content_type: detect_content_type(&filename, &data, content_type.as_deref()),
            filename,
            source_url: Some(url.to_string()),
            data,
        })
    }

    async fn read_local(&self, path: &Path) -> Result<LoadedAsset> {
        if let LocalAccess::Roots(roots) = &self.local_access {
            let resolved = tokio::fs::canonicalize(path).await?;
            if !roots.iter().any(|root| resolved.starts_with(root)) {
                return Err(Error::InvalidInput(format!(
                    "{} resolves outside local roots",
                    path.display()
                )));
            }
        }

        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(Error::InvalidInput(format!(
                "{} is not a file",
                path.display()
            )));
        }
        self.check_size(metadata.len())?;

        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed_file".to_string());

        Ok(LoadedAsset {
            content_type: detect_content_type(&filename, &data, None),
            filename,
            source_url: None,
            data,
        })
    }

    fn check_size(&self, len: u64) -> Result<()> {
        if len > self.max_bytes {
            return Err(Error::InvalidInput(format!(
                "asset is {} bytes, limit is {}",
                len, self.max_bytes
            )));
        }
        Ok(())
    }
}

fn header_value(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn disposition_filename(header: &str) -> Option<String> {
    DISPOSITION_FILENAME
        .captures(header)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Last path segment, percent-decoded.
fn url_filename(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
}

/// Append an extension derived from the content type, then the bytes, when
/// the name has none.
fn ensure_extension(name: String, content_type: Option<&str>, data: &[u8]) -> String {
    if has_extension(&name) {
        return name;
    }
    let ext = content_type
        .and_then(extension_for_content_type)
        .or_else(|| sniff_extension(data))
        .unwrap_or("bin");
    format!("{}.{}", name, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(access: LocalAccess) -> AssetResolver {
        AssetResolver::new(&IngestConfig::default().with_local_access(access)).unwrap()
    }

    #[test]
    fn test_find_references_with_and_without_title() {
        let body = "a ![one](https://x.test/1.png \"T\") b ![](  'pic.jpg'  )";
        let refs = find_image_references(body);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].alt, "one");
        assert_eq!(refs[0].url, "https://x.test/1.png");
        assert_eq!(refs[0].title.as_deref(), Some("T"));
        assert_eq!(refs[0].snippet, "![one](https://x.test/1.png \"T\")");
        assert_eq!(refs[1].url, "pic.jpg");
        assert_eq!(refs[1].title, None);
    }

    #[test]
    fn test_with_url_preserves_alt_and_title() {
        let refs = find_image_references("![a](x.png \"t\") ![b](y.png)");
        assert_eq!(refs[0].with_url("/m/1"), "![a](/m/1 \"t\")");
        assert_eq!(refs[1].with_url("/m/2"), "![b](/m/2)");
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe("alt", Some("t"), "d"), "alt - t");
        assert_eq!(describe("same", Some("same"), "d"), "same");
        assert_eq!(describe("", Some("t"), "d"), "t");
        assert_eq!(describe("alt", None, "d"), "alt");
        assert_eq!(describe(" ", None, "d"), "d");
    }

    #[test]
    fn test_classify_managed() {
        let r = resolver(LocalAccess::Disabled);
        assert_eq!(r.classify("/api/files/uploads/1/a.png"), Reference::Managed);
        assert_eq!(
            r.classify("https://blog.example.com/api/files/uploads/1/a.png"),
            Reference::Managed
        );
    }

    #[test]
    fn test_classify_remote_respects_policy() {
        let r = resolver(LocalAccess::Disabled);
        assert!(matches!(
            r.classify("https://cdn.example.com/a.png"),
            Reference::Remote(_)
        ));

        let offline = AssetResolver::new(&IngestConfig::default().with_fetch_remote(false)).unwrap();
        assert!(matches!(
            offline.classify("https://cdn.example.com/a.png"),
            Reference::Skipped(_)
        ));
    }

    #[test]
    fn test_classify_other_schemes_skipped() {
        let r = resolver(LocalAccess::Unrestricted {
            base: PathBuf::from("/tmp"),
        });
        assert!(matches!(
            r.classify("data:image/png;base64,AAAA"),
            Reference::Skipped(_)
        ));
    }

    #[test]
    fn test_classify_local_disabled() {
        let r = resolver(LocalAccess::Disabled);
        assert!(matches!(r.classify("./img/a.png"), Reference::Skipped(_)));
        assert!(matches!(r.classify("/etc/passwd"), Reference::Skipped(_)));
    }

    #[test]
    fn test_classify_local_unrestricted_joins_base() {
        let r = resolver(LocalAccess::Unrestricted {
            base: PathBuf::from("/home/me/posts"),
        });
        assert_eq!(
            r.classify("img/a.png"),
            Reference::Local(PathBuf::from("/home/me/posts/img/a.png"))
        );
        assert_eq!(
            r.classify("/tmp/b.png"),
            Reference::Local(PathBuf::from("/tmp/b.png"))
        );
    }

    #[test]
    fn test_classify_local_roots() {
        let r = resolver(LocalAccess::Roots(vec![PathBuf::from("/srv/media")]));
        assert_eq!(
            r.classify("a.png"),
            Reference::Local(PathBuf::from("/srv/media/a.png"))
        );
        assert_eq!(
            r.classify("/srv/media/x/b.png"),
            Reference::Local(PathBuf::from("/srv/media/x/b.png"))
        );
        assert!(matches!(r.classify("/images/a.png"), Reference::Skipped(_)));
        assert!(matches!(
            r.classify("../secrets.png"),
            Reference::Skipped(_)
        ));
    }

    #[test]
    fn test_managed_asset_id() {
        let id = Uuid::now_v7();
        assert_eq!(
            managed_asset_id(&format!("/api/files/uploads/{}/a.png", id)),
            Some(id)
        );
        assert_eq!(
            managed_asset_id(&format!("https://blog.example.com/api/files/uploads/{}/a.png", id)),
            Some(id)
        );
        assert_eq!(managed_asset_id("/api/files/uploads/not-an-id/a.png"), None);
        assert_eq!(managed_asset_id("https://cdn.example.com/a.png"), None);
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename("attachment; filename=\"cat photo.png\"").as_deref(),
            Some("cat photo.png")
        );
        assert_eq!(
            disposition_filename("inline; filename=x.gif").as_deref(),
            Some("x.gif")
        );
        assert_eq!(disposition_filename("inline"), None);
    }

    #[test]
    fn test_url_filename() {
        let url = Url::parse("https://x.test/a/b/pic.webp?s=1").unwrap();
        assert_eq!(url_filename(&url).as_deref(), Some("pic.webp"));
        let url = Url::parse("https://x.test/").unwrap();
        assert_eq!(url_filename(&url), None);
        let url = Url::parse("https://x.test/my%20pic.png").unwrap();
        assert_eq!(url_filename(&url).as_deref(), Some("my pic.png"));
        let url = Url::parse("https://x.test/caf%C3%A9%2Bcr%C3%A8me.jpg").unwrap();
        assert_eq!(url_filename(&url).as_deref(), Some("café+crème.jpg"));
    }

    #[test]
    fn test_ensure_extension() {
        assert_eq!(ensure_extension("a.png".into(), Some("image/gif"), b""), "a.png");
        assert_eq!(ensure_extension("a".into(), Some("image/jpeg"), b""), "a.jpg");
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(ensure_extension("a".into(), Some("application/x"), &png), "a.png");
        assert_eq!(ensure_extension("a".into(), None, b"plain"), "a.bin");
    }
}
