//! JSON generation API
//!
//! Every generation call is checked against the caller's quota and hourly
//! rate limit, admitted through the resource governor, and recorded in the
//! usage table whether it succeeds or not.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use bella_common::calendar::{Business, CalendarEntry};
use bella_common::db::DEFAULT_USER_ID;
use bella_common::time::now;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{info, warn};

use crate::db::{calendars, queue, usage, users};
use crate::generation::batch::{estimate_processing_time, should_queue, split_large_request};
use crate::generation::{BatchReport, Pacing};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SingleRequest {
    pub niche: Option<String>,
    pub city: Option<String>,
    pub days: Option<u32>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SingleResponse {
    pub status: String,
    pub calendar_id: i64,
    pub posts_generated: usize,
    pub generation_method: String,
    pub calendar_data: Vec<CalendarEntry>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub businesses: Option<Vec<Business>>,
    pub days: Option<u32>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: Option<i64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    pub user_id: Option<i64>,
    pub days: Option<u32>,
}

/// Reject callers that are out of quota or over the hourly request limit
async fn check_limits(state: &AppState, user_id: i64) -> ApiResult<()> {
    match users::quota_status(&state.db, user_id).await? {
        users::QuotaStatus::Available => {}
        users::QuotaStatus::Exhausted | users::QuotaStatus::UnknownUser => {
            return Err(ApiError::QuotaExceeded)
        }
    }

    let hour_ago = now() - Duration::hours(1);
    let recent = usage::requests_since(&state.db, user_id, hour_ago).await?;
    if recent >= state.config.governor.requests_per_hour as i64 {
        return Err(ApiError::RateLimited);
    }
    Ok(())
}

/// Record one API call; failures to record are logged and ignored
async fn track_usage<T>(
    state: &AppState,
    user_id: i64,
    endpoint: &str,
    started: Instant,
    result: &ApiResult<T>,
) {
    let error_message = result.as_ref().err().map(|e| e.to_string());
    if let Err(e) = usage::record_usage(
        &state.db,
        Some(user_id),
        endpoint,
        started.elapsed().as_secs_f64(),
        result.is_ok(),
        error_message.as_deref(),
    )
    .await
    {
        warn!(endpoint, error = %e, "Failed to record API usage");
    }
}

/// POST /api/v1/generate/single
pub async fn generate_single(
    State(state): State<AppState>,
    Json(body): Json<SingleRequest>,
) -> ApiResult<Json<SingleResponse>> {
    let started = Instant::now();
    let user_id = body.user_id.unwrap_or(DEFAULT_USER_ID);
    let result = run_single(&state, user_id, body).await;
    track_usage(&state, user_id, "generate_single", started, &result).await;
    result
}

async fn run_single(
    state: &AppState,
    user_id: i64,
    body: SingleRequest,
) -> ApiResult<Json<SingleResponse>> {
    let (Some(niche), Some(city), Some(days)) = (body.niche, body.city, body.days) else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };
    let request = state.pipeline.request(niche, city, days)?;

    check_limits(state, user_id).await?;
    let _permit = state.governor.admit()?;

    let started = Instant::now();
    let calendar = state
        .pipeline
        .generate(&request, Pacing::interactive(state.pipeline.config()))
        .await;
    state.governor.finish();

    let calendar_id = calendars::save_calendar(
        &state.db,
        user_id,
        &calendar,
        request.days,
        started.elapsed().as_secs_f64(),
    )
    .await?;
    users::consume_quota(&state.db, user_id, 1).await?;

    info!(user_id, calendar_id, posts = calendar.len(), "Calendar generated via API");

    Ok(Json(SingleResponse {
        status: "success".to_string(),
        calendar_id,
        posts_generated: calendar.len(),
        generation_method: calendar.generation_method().to_string(),
        calendar_data: calendar.into_entries(),
    }))
}

/// POST /api/v1/generate/batch
pub async fn generate_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchRequest>,
) -> ApiResult<Json<Value>> {
    let started = Instant::now();
    let user_id = body.user_id.unwrap_or(DEFAULT_USER_ID);
    let result = run_batch(&state, user_id, body).await;
    track_usage(&state, user_id, "generate_batch", started, &result).await;
    result
}

async fn run_batch(state: &AppState, user_id: i64, body: BatchRequest) -> ApiResult<Json<Value>> {
    let (Some(businesses), Some(days)) = (body.businesses, body.days) else {
        return Err(ApiError::BadRequest("Missing businesses or days".to_string()));
    };
    if businesses.is_empty() {
        return Err(ApiError::BadRequest("At least one business is required".to_string()));
    }
    let config = state.pipeline.config();
    let max_days = config.max_days.min(bella_common::calendar::MAX_CALENDAR_DAYS);
    if days < 1 || days > max_days {
        return Err(ApiError::BadRequest(format!(
            "Number of days must be between 1 and {}.",
            max_days
        )));
    }

    check_limits(state, user_id).await?;

    let estimated_time =
        estimate_processing_time(days, businesses.len(), config.estimated_secs_per_post);

    if should_queue(businesses.len(), days, config) {
        let request = queue::JobRequest { businesses, days };
        let queue_id = queue::enqueue(&state.db, user_id, &request, queue::BATCH_PRIORITY).await?;
        users::consume_quota(&state.db, user_id, 1).await?;
        info!(user_id, queue_id, estimated_time, "Large batch queued");

        return Ok(Json(json!({
            "status": "queued",
            "queue_id": queue_id,
            "estimated_time": estimated_time,
            "message": "Large request queued for processing",
        })));
    }

    let _permit = state.governor.admit()?;

    let mut results = Vec::with_capacity(businesses.len());
    for group in split_large_request(&businesses, days, config.max_batch_business_days) {
        results.extend(state.batch.run(&group, days).await);
    }
    state.governor.finish();
    users::consume_quota(&state.db, user_id, 1).await?;

    let report = BatchReport::completed(businesses.len(), results);
    Ok(Json(serde_json::to_value(report).map_err(anyhow::Error::from)?))
}

/// GET /api/v1/queue/status/:id
pub async fn queue_status(
    State(state): State<AppState>,
    Path(queue_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let job = queue::load_job(&state.db, queue_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Queue item not found".to_string()))?;

    let mut response = json!({
        "queue_id": job.id,
        "status": job.status,
        "created_at": job.created_at.to_rfc3339(),
        "priority": job.priority,
    });
    if let Some(started_at) = job.started_at {
        response["started_at"] = json!(started_at.to_rfc3339());
    }
    if let Some(completed_at) = job.completed_at {
        response["completed_at"] = json!(completed_at.to_rfc3339());
        response["result"] = job.result.unwrap_or(Value::Null);
    }
    if let Some(error) = job.error {
        response["error"] = json!(error);
    }

    Ok(Json(response))
}

/// GET /api/v1/calendars
pub async fn list_calendars(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<calendars::CalendarPage>> {
    let page = calendars::list_calendars(
        &state.db,
        params.user_id.unwrap_or(DEFAULT_USER_ID),
        params.page.unwrap_or(1),
        params.per_page.unwrap_or(20),
    )
    .await?;
    Ok(Json(page))
}

/// GET /api/v1/calendars/:id
pub async fn get_calendar(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<calendars::CalendarRecord>> {
    calendars::load_calendar(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Calendar {} not found", id)))
}

/// GET /api/v1/analytics/usage
pub async fn usage_analytics(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult<Json<Value>> {
    let user_id = params.user_id.unwrap_or(DEFAULT_USER_ID);
    let days = params.days.unwrap_or(30).clamp(1, usage::MAX_ANALYTICS_DAYS);
    let analytics = usage::usage_analytics(&state.db, user_id, days).await?;

    Ok(Json(json!({
        "user_id": user_id,
        "period_days": days,
        "analytics": analytics,
    })))
}

/// Build generation API routes
pub fn calendar_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/generate/single", post(generate_single))
        .route("/api/v1/generate/batch", post(generate_batch))
        .route("/api/v1/queue/status/:id", get(queue_status))
        .route("/api/v1/calendars", get(list_calendars))
        .route("/api/v1/calendars/:id", get(get_calendar))
        .route("/api/v1/analytics/usage", get(usage_analytics))
}
