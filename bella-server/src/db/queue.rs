//! Generation queue for large batch requests

use anyhow::{anyhow, Context, Result};
use bella_common::calendar::Business;
use bella_common::time::{now, parse_rfc3339, to_db_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Priority assigned to batches queued by the API
pub const BATCH_PRIORITY: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// Work stored with a queued job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub businesses: Vec<Business>,
    pub days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuedJob {
    pub id: i64,
    pub user_id: i64,
    pub request: JobRequest,
    pub status: JobStatus,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

const JOB_COLUMNS: &str = "id, user_id, request_data, status, priority, created_at, \
                           started_at, completed_at, result_data, error_message";

fn optional_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(column);
    Ok(value.as_deref().map(parse_rfc3339).transpose()?)
}

fn job_from_row(row: &SqliteRow) -> Result<QueuedJob> {
    let request_data: String = row.get("request_data");
    let request: JobRequest =
        serde_json::from_str(&request_data).context("Corrupt queued request data")?;

    let status: String = row.get("status");
    let status =
        JobStatus::parse(&status).ok_or_else(|| anyhow!("Unknown job status: {}", status))?;

    let result_data: Option<String> = row.get("result_data");
    let result = result_data
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("Corrupt job result data")?;

    let created_at: String = row.get("created_at");

    Ok(QueuedJob {
        id: row.get("id"),
        user_id: row.get("user_id"),
        request,
        status,
        priority: row.get("priority"),
        created_at: parse_rfc3339(&created_at)?,
        started_at: optional_timestamp(row, "started_at")?,
        completed_at: optional_timestamp(row, "completed_at")?,
        result,
        error: row.get("error_message"),
    })
}

/// Queue a batch, returning the job id
pub async fn enqueue(
    pool: &SqlitePool,
    user_id: i64,
    request: &JobRequest,
    priority: i64,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO generation_queue (user_id, request_data, status, priority, created_at)
        VALUES (?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(serde_json::to_string(request)?)
    .bind(priority)
    .bind(to_db_timestamp(&now()))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn load_job(pool: &SqlitePool, id: i64) -> Result<Option<QueuedJob>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM generation_queue WHERE id = ?",
        JOB_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Mark the highest-priority pending job as processing and return it
///
/// Equal priorities are taken oldest first. A single statement does the
/// select and update, so two workers never claim the same job.
pub async fn claim_next(pool: &SqlitePool) -> Result<Option<QueuedJob>> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE generation_queue
        SET status = 'processing', started_at = ?
        WHERE id = (
            SELECT id FROM generation_queue
            WHERE status = 'pending'
            ORDER BY priority DESC, id ASC
            LIMIT 1
        )
        RETURNING {}
        "#,
        JOB_COLUMNS
    ))
    .bind(to_db_timestamp(&now()))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

pub async fn complete_job(pool: &SqlitePool, id: i64, result: &serde_json::Value) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE generation_queue
        SET status = 'completed', completed_at = ?, result_data = ?
        WHERE id = ?
        "#,
    )
    .bind(to_db_timestamp(&now()))
    .bind(serde_json::to_string(result)?)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fail_job(pool: &SqlitePool, id: i64, error: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE generation_queue
        SET status = 'failed', completed_at = ?, error_message = ?
        WHERE id = ?
        "#,
    )
    .bind(to_db_timestamp(&now()))
    .bind(error)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Return jobs left in `processing` by an earlier run to the pending queue
///
/// Only safe before any worker has claimed a job in this process.
pub async fn requeue_stale(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE generation_queue
        SET status = 'pending', started_at = NULL
        WHERE status = 'processing'
        "#,
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn pending_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM generation_queue WHERE status = 'pending'")
            .fetch_one(pool)
            .await?;
    Ok(count)
}
