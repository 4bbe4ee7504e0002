//! # feed-api
//!
//! HTTP surface of the feed post service: markdown post submission, asset
//! uploads, managed file serving and a health probe.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use feed_ingest::PostIngestor;

pub use config::ServerConfig;
pub use error::ApiError;
use middleware::{require_bearer, MakeRequestUuidV7};

/// Shared request state.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: PostIngestor,
    /// Bearer token required on write routes, if set.
    pub api_token: Option<String>,
}

impl AppState {
    pub fn new(ingestor: PostIngestor, api_token: Option<String>) -> Self {
        Self {
            ingestor,
            api_token,
        }
    }
}

/// Build the application router with its middleware stack.
///
/// Write routes sit behind the bearer gate. Managed files and the health
/// probe are public.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let writes = Router::new()
        .route("/api/markdown/posts", post(handlers::create_post))
        .route("/api/markdown/posts/:id", put(handlers::update_post))
        .route("/api/uploads", post(handlers::upload_file))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/files/uploads/:id/:filename",
            get(handlers::serve_file),
        )
        .merge(writes)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(config.allowed_origins.clone()))
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .max_age(Duration::from_secs(3600)),
        )
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .with_state(state)
}
