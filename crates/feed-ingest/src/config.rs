//! Ingest configuration.
//!
//! Everything the pipeline needs from its environment is carried in an
//! [`IngestConfig`] handed to the ingestor at construction, so tests can run
//! several differently configured pipelines side by side.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use feed_core::defaults;
use feed_core::{Error, Result};

/// Which local filesystem paths an asset reference may read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LocalAccess {
    /// Local references are skipped.
    #[default]
    Disabled,
    /// Paths must resolve inside one of these directories. Relative
    /// references resolve against the first root.
    Roots(Vec<PathBuf>),
    /// Any readable path. Relative references resolve against `base`.
    Unrestricted { base: PathBuf },
}

impl LocalAccess {
    /// Restrict local reads to `roots`, canonicalizing each one that exists.
    pub fn roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots: Vec<PathBuf> = roots
            .into_iter()
            .map(|root| {
                let root = root.as_ref();
                std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
            })
            .collect();
        if roots.is_empty() {
            Self::Disabled
        } else {
            Self::Roots(roots)
        }
    }
}

/// Configuration for the ingest pipeline.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Public site origin; when set, post permalinks are `<base>/<slug>`.
    pub public_base_url: Option<String>,
    pub local_access: LocalAccess,
    /// Whether `http(s)` references are downloaded.
    pub fetch_remote: bool,
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub max_asset_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            public_base_url: None,
            local_access: LocalAccess::Disabled,
            fetch_remote: true,
            fetch_timeout: Duration::from_secs(defaults::ASSET_FETCH_TIMEOUT_SECS),
            user_agent: defaults::ASSET_USER_AGENT.to_string(),
            max_asset_bytes: defaults::ASSET_MAX_BYTES,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables.
    ///
    /// - `PUBLIC_BASE_URL`: site origin used for permalinks
    /// - `ASSET_LOCAL_ROOTS`: OS path list of directories local references may read
    /// - `ASSET_FETCH_TIMEOUT_SECS`: per-request timeout for remote assets
    /// - `ASSET_MAX_BYTES`: size cap for a single asset
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base) = env::var("PUBLIC_BASE_URL") {
            config = config.with_public_base_url(&base);
        }

        if let Some(roots) = env::var_os("ASSET_LOCAL_ROOTS") {
            config.local_access = LocalAccess::roots(env::split_paths(&roots));
        }

        if let Ok(secs) = env::var("ASSET_FETCH_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                Error::Config(format!("ASSET_FETCH_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            config.fetch_timeout = Duration::from_secs(secs);
        }

        if let Ok(max) = env::var("ASSET_MAX_BYTES") {
            config.max_asset_bytes = max
                .parse()
                .map_err(|_| Error::Config(format!("ASSET_MAX_BYTES is not a number: {}", max)))?;
        }

        debug!(
            public_base_url = config.public_base_url.as_deref().unwrap_or("(none)"),
            local_access = ?config.local_access,
            timeout_secs = config.fetch_timeout.as_secs(),
            "Ingest configuration loaded"
        );
        Ok(config)
    }

    /// Set the public base URL. Trailing slashes are dropped and a blank
    /// value clears it.
    pub fn with_public_base_url(mut self, base: &str) -> Self {
        let base = base.trim().trim_end_matches('/');
        self.public_base_url = (!base.is_empty()).then(|| base.to_string());
        self
    }

    pub fn with_local_access(mut self, access: LocalAccess) -> Self {
        self.local_access = access;
        self
    }

    pub fn with_fetch_remote(mut self, fetch: bool) -> Self {
        self.fetch_remote = fetch;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_asset_bytes(mut self, max: u64) -> Self {
        self.max_asset_bytes = max;
        self
    }

    /// Permalink for a slug, if a base URL is configured.
    pub fn permalink_for(&self, slug: &str) -> Option<String> {
        self.public_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base, slug))
    }

    /// Build the HTTP client used for remote asset fetches.
    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.fetch_timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
    }
}
