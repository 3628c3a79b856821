// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Application state, route handlers, and router construction.
//!
//! This module is `pub` so that integration tests can build a test router directly
//! without starting the full binary.

use crate::models::agent::AgentMode;
use crate::models::rate_limit::RateLimitStatus;
use crate::models::scraper::{
    IndexUrlRequest, IndexedListParams, IndexedSearchParams, IndexedTrackResult,
    IndexedTracksResponse,
};
use crate::models::search::{CacheStatus, DataResponse, SearchRequest, SearchResponse};
use crate::models::version::VersionResponse;
use crate::services::admin_auth::{admin_auth_middleware, AdminToken};
use crate::services::indexing::IndexingService;
use crate::services::metrics::Metrics;
use crate::services::rate_limit_middleware::{client_identifier, rate_limit_middleware};
use crate::services::rate_limiter::RateLimiter;
use crate::services::scraper::ScrapeError;
use crate::services::search::{SearchError, SearchService};
use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::{error, warn};

/// Application version extracted from `Cargo.toml` at compile time.
/// The patch segment can be overridden via `AUXSTREAM_PATCH_VERSION` (see `build.rs`).
pub const VERSION: &str = env!("AUXSTREAM_VERSION");

const DEFAULT_INDEXED_LIMIT: usize = 20;
const MAX_INDEXED_LIMIT: usize = 100;

/// Shared application state injected into every route handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub indexing: Arc<IndexingService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
    pub admin_token: Arc<AdminToken>,
    pub mode: AgentMode,
}

fn search_error_response(err: SearchError) -> (StatusCode, String) {
    if err.is_validation() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else {
        error!(error = %err, "Search failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Search failed".to_string())
    }
}

fn scrape_error_response(err: ScrapeError) -> (StatusCode, String) {
    match err {
        ScrapeError::UnsupportedUrl(_) | ScrapeError::NoScraper(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        ScrapeError::Fetch { .. } | ScrapeError::Status { .. } => {
            error!(error = %err, "Indexing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Indexing failed".to_string())
        }
    }
}

fn indexed_limit(requested: Option<usize>) -> usize {
    match requested {
        Some(n) if n > 0 => n.min(MAX_INDEXED_LIMIT),
        _ => DEFAULT_INDEXED_LIMIT,
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub async fn version_handler(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        agent: "auxstream-agent".to_string(),
        version: VERSION.to_string(),
        mode: state.mode.to_string(),
    })
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(request): Query<SearchRequest>,
) -> Result<Json<DataResponse<SearchResponse>>, (StatusCode, String)> {
    state
        .search
        .search(request)
        .await
        .map(|data| Json(DataResponse { data }))
        .map_err(search_error_response)
}

pub async fn cache_status_handler(
    State(state): State<AppState>,
    Query(request): Query<SearchRequest>,
) -> Result<Json<CacheStatus>, (StatusCode, String)> {
    state
        .search
        .cache_status(&request)
        .await
        .map(Json)
        .map_err(search_error_response)
}

pub async fn invalidate_cache_handler(
    State(state): State<AppState>,
    Query(request): Query<SearchRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .search
        .invalidate_cache(&request)
        .await
        .map_err(search_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn index_url_handler(
    State(state): State<AppState>,
    Json(payload): Json<IndexUrlRequest>,
) -> Result<Json<IndexedTrackResult>, (StatusCode, String)> {
    url::Url::parse(&payload.url)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid URL: {}", e)))?;

    state
        .indexing
        .index_url(&payload.url)
        .await
        .map(|metadata| Json(metadata.into()))
        .map_err(scrape_error_response)
}

pub async fn indexed_search_handler(
    State(state): State<AppState>,
    Query(params): Query<IndexedSearchParams>,
) -> Result<Json<IndexedTracksResponse>, (StatusCode, String)> {
    let source = params.source.trim().to_lowercase();
    if source.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "source is required".to_string()));
    }
    let query = params.q.trim();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "q is required".to_string()));
    }

    let tracks = state
        .indexing
        .search_indexed_tracks(&source, query, indexed_limit(params.limit))
        .await;
    Ok(Json(IndexedTracksResponse {
        source,
        count: tracks.len(),
        tracks,
    }))
}

pub async fn indexed_tracks_handler(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Query(params): Query<IndexedListParams>,
) -> Json<IndexedTracksResponse> {
    let source = source.to_lowercase();
    let tracks: Vec<IndexedTrackResult> = state
        .indexing
        .get_indexed_tracks(&source, indexed_limit(params.limit))
        .await
        .into_iter()
        .map(IndexedTrackResult::from)
        .collect();
    Json(IndexedTracksResponse {
        source,
        count: tracks.len(),
        tracks,
    })
}

pub async fn rate_limit_status_handler(
    State(state): State<AppState>,
    request: Request,
) -> Json<RateLimitStatus> {
    let identifier = client_identifier(&request, state.rate_limiter.trusted_proxies());
    Json(state.rate_limiter.get_status(&identifier).await)
}

pub async fn reset_rate_limit_handler(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let valid = ["ip:", "user:"]
        .iter()
        .any(|prefix| identifier.len() > prefix.len() && identifier.starts_with(prefix));
    if !valid {
        return Err((
            StatusCode::BAD_REQUEST,
            "identifier must look like 'ip:<address>' or 'user:<id>'".to_string(),
        ));
    }

    state.rate_limiter.reset(&identifier).await.map_err(|e| {
        warn!(error = %e, "Failed to reset rate limit");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to reset rate limit: {}", e),
        )
    })?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the router. Everything under `/api/v1` is rate limited and `/admin` needs the
/// admin bearer token.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/search", get(search_handler))
        .route(
            "/search/cache",
            get(cache_status_handler).delete(invalidate_cache_handler),
        )
        .route("/index", post(index_url_handler))
        .route("/indexed/search", get(indexed_search_handler))
        .route("/indexed/{source}", get(indexed_tracks_handler))
        .route("/ratelimit/status", get(rate_limit_status_handler))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    let admin = Router::new()
        .route("/ratelimit/{identifier}", delete(reset_rate_limit_handler))
        .route_layer(middleware::from_fn_with_state(
            state.admin_token.clone(),
            admin_auth_middleware,
        ));

    Router::new()
        .route("/version", get(version_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api)
        .nest("/admin", admin)
        .with_state(state)
}
