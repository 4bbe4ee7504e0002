//! HTTP client for the feed API.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use feed_core::{Asset, AssetStore, Error, NewAsset, Result};

/// The parts of a returned post the CLI reports back.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub permalink: Option<String>,
}

/// Body of a successful submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub post: SubmittedPost,
    pub message: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Talks to one feed server.
///
/// Also an [`AssetStore`]: storing an asset uploads it through
/// `POST /api/uploads`.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    server_url: String,
    token: Option<String>,
}

impl FeedClient {
    pub fn new(server_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("feed-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Submit a rendered document, creating a post or updating `target`.
    pub async fn submit(&self, document: String, target: Option<Uuid>) -> Result<SubmitResponse> {
        let request = match target {
            None => self
                .client
                .post(format!("{}/api/markdown/posts", self.server_url)),
            Some(id) => self
                .client
                .put(format!("{}/api/markdown/posts/{}", self.server_url, id)),
        };
        let response = self
            .authorized(request)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(document)
            .send()
            .await?;

        Ok(checked(response).await?.json().await?)
    }
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(Error::Request(format!("server returned {}: {}", status, message)))
}

#[async_trait]
impl AssetStore for FeedClient {
    async fn store(&self, asset: NewAsset) -> Result<Asset> {
        debug!(file = %asset.filename, size = asset.data.len(), "Uploading asset");
        let part = Part::bytes(asset.data)
            .file_name(asset.filename)
            .mime_str(&asset.content_type)?;
        let mut form = Form::new()
            .part("file", part)
            .text("description", asset.description);
        if let Some(url) = asset.source_url {
            form = form.text("url", url);
        }

        let request = self
            .client
            .post(format!("{}/api/uploads", self.server_url))
            .multipart(form);
        let response = self.authorized(request).send().await?;

        Ok(checked(response).await?.json().await?)
    }
}
