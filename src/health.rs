//! Health Endpoints
//!
//! Liveness and readiness probes for container orchestration.

use crate::handlers::AppState;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use std::time::Instant;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health/live", get(liveness))
        .route("/api/v1/health/ready", get(readiness))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": state.config.version
    }))
}

/// GET /api/v1/health/live
///
/// Never touches external dependencies
pub async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// GET /api/v1/health/ready
///
/// Ready only while the user store answers
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let result = state.auth.check_store().await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "store": { "status": "healthy", "response_time_ms": elapsed_ms }
            })),
        ),
        Err(e) => {
            tracing::error!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "not_ready",
                    "store": { "status": "unhealthy", "response_time_ms": elapsed_ms }
                })),
            )
        }
    }
}
