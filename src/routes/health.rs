//! Health check

use axum::{extract::State, Json};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub sessions: usize,
    pub tasks: usize,
    pub cache: CacheStats,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions().session_count().await,
        tasks: state.tasks().len().await,
        cache: state.cache().stats(),
    })
}
