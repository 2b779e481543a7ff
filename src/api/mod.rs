//! HTTP surface wired around the tiered cache.
//!
//! This is an external consumer of `cache::TieredCache`, not an extension of
//! its contract: it exposes a stats snapshot, the text report, a flush
//! endpoint, and a health check over axum, all going through the cache's
//! public API.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct CacheStatsResponse {
    total_operations: u64,
    total_reads: u64,
    total_writes: u64,
    total_hits: u64,
    total_misses: u64,
    total_read_bytes: i64,
    total_write_bytes: i64,
    hit_rate_percent: f64,
}

impl From<crate::cache::StatsSnapshot> for CacheStatsResponse {
    fn from(snapshot: crate::cache::StatsSnapshot) -> Self {
        Self {
            total_operations: snapshot.total_operations,
            total_reads: snapshot.total_reads,
            total_writes: snapshot.total_writes,
            total_hits: snapshot.total_hits,
            total_misses: snapshot.total_misses,
            total_read_bytes: snapshot.total_read_bytes,
            total_write_bytes: snapshot.total_write_bytes,
            hit_rate_percent: snapshot.hit_rate_percent(),
        }
    }
}

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "cache-core",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/cache/stats - conditional-GET-aware snapshot of the cache's
/// statistics, as structured numbers rather than the `Report` text format.
async fn get_cache_stats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let response = CacheStatsResponse::from(state.cache.stats());

    match crate::http_cache::cached_json_response(&headers, "cache:stats", &response, 5) {
        Ok(resp) => resp,
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /api/cache/report - the human-readable labeled-field report.
async fn get_cache_report(State(state): State<AppState>) -> impl IntoResponse {
    state.cache.report().await
}

/// POST /api/cache/flush - purges L1 and, if a remote tier is configured,
/// deletes every key under this cache's namespace.
async fn flush_cache(State(state): State<AppState>) -> Response {
    match state.cache.flush().await {
        Ok(()) => Json(serde_json::json!({
            "status": "success",
            "message": "cache flushed",
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/cache/stats", get(get_cache_stats))
        .route("/api/cache/report", get(get_cache_report))
        .route("/api/cache/flush", post(flush_cache))
        .with_state(state)
}
