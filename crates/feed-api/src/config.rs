//! Server configuration from environment variables.

use std::env;

use axum::http::HeaderValue;
use tracing::warn;

use feed_core::defaults;

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Directory managed asset bytes are written under.
    pub file_storage_path: String,
    pub max_body_bytes: usize,
    /// Bearer token required on write routes, if set.
    pub api_token: Option<String>,
    pub allowed_origins: Vec<HeaderValue>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            database_url: "postgres://localhost/feed".to_string(),
            file_storage_path: "/var/lib/feed/files".to_string(),
            max_body_bytes: defaults::MAX_BODY_BYTES,
            api_token: None,
            allowed_origins: vec![HeaderValue::from_static("http://localhost:3000")],
        }
    }
}

impl ServerConfig {
    /// Load from the environment, falling back to defaults for unset or
    /// unparseable values.
    ///
    /// Reads `HOST`, `PORT`, `DATABASE_URL`, `FILE_STORAGE_PATH`,
    /// `MAX_BODY_BYTES`, `FEED_API_TOKEN` and `ALLOWED_ORIGINS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT").unwrap_or(defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            file_storage_path: env::var("FILE_STORAGE_PATH")
                .unwrap_or(defaults.file_storage_path),
            max_body_bytes: parse_var("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            api_token: env::var("FEED_API_TOKEN")
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|origins| parse_allowed_origins(&origins))
                .ok()
                .filter(|origins| !origins.is_empty())
                .unwrap_or(defaults.allowed_origins),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

/// Parse a comma-separated origin list, dropping invalid entries.
pub fn parse_allowed_origins(origins: &str) -> Vec<HeaderValue> {
    origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}
