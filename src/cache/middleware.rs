//! Page cache middleware.
//!
//! Serves GET requests from [`PageStore`] and stores successful renders.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};

use crate::application::accounts::CurrentUser;

use super::{
    PageCacheConfig,
    keys::PageKey,
    store::{CachedResponse, PageStore},
};

const MAX_CACHED_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct PageCacheState {
    pub config: PageCacheConfig,
    pub store: Arc<PageStore>,
}

impl PageCacheState {
    pub fn new(config: PageCacheConfig) -> Self {
        let store = Arc::new(PageStore::new(&config));
        Self { config, store }
    }
}

/// Only `200 OK` responses that do not set cookies are stored. The viewer is
/// read from the [`CurrentUser`] extension, so session resolution must run
/// before this layer.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<PageCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let viewer = request
        .extensions()
        .get::<CurrentUser>()
        .map(|user| user.username.clone());
    let key = PageKey::new(
        request.uri().path(),
        request.uri().query(),
        viewer.as_deref(),
    );

    if let Some(cached) = cache.store.get(&key) {
        debug!(cache = "page", outcome = "hit", "serving cached response");
        return build_response(cached);
    }

    debug!(cache = "page", outcome = "miss", "rendering page");
    let response = next.run(request).await;

    if response.status() != StatusCode::OK || response.headers().contains_key(header::SET_COOKIE) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(cache = "page", error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.clone(),
    };
    cache.store.set(key, cached);

    Response::from_parts(parts, Body::from(bytes))
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
