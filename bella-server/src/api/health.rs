//! Health endpoints
//!
//! `/health` is a cheap liveness probe; `/api/v1/health` aggregates recent API
//! usage, the queue backlog and memory utilization.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::db::{queue, usage, users};
use crate::{ApiResult, AppState};

/// Success ratio below which the system reports itself degraded
const HEALTHY_SUCCESS_RATIO: f64 = 0.95;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Whether a text-generation provider is configured
    pub ai_enabled: bool,
    pub requests_in_flight: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "bella-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        ai_enabled: state.pipeline.ai_enabled(),
        requests_in_flight: state.governor.in_flight(),
    })
}

/// System health over the last hour
#[derive(Debug, Serialize)]
pub struct SystemHealth {
    /// "healthy" or "degraded"
    pub status: String,
    pub avg_response_time: f64,
    /// Percentage of successful API requests
    pub success_rate: f64,
    pub active_users: i64,
    pub queue_backlog: i64,
    pub requests_in_flight: usize,
    pub max_concurrent_requests: usize,
    pub memory_percent: f32,
    pub timestamp: String,
}

/// GET /api/v1/health
pub async fn system_health(State(state): State<AppState>) -> ApiResult<Json<SystemHealth>> {
    let hour_ago = bella_common::time::now() - Duration::hours(1);
    let recent = usage::usage_health(&state.db, hour_ago).await?;
    let active_users = users::count_active(&state.db).await?;
    let queue_backlog = queue::pending_count(&state.db).await?;

    let status = if recent.success_ratio > HEALTHY_SUCCESS_RATIO {
        "healthy"
    } else {
        "degraded"
    };

    Ok(Json(SystemHealth {
        status: status.to_string(),
        avg_response_time: recent.avg_response_time,
        success_rate: recent.success_ratio * 100.0,
        active_users,
        queue_backlog,
        requests_in_flight: state.governor.in_flight(),
        max_concurrent_requests: state.governor.capacity(),
        memory_percent: state.governor.memory().sample(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/health", get(system_health))
}
