//! API usage tracking and analytics

use anyhow::Result;
use bella_common::time::{now, to_db_timestamp};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// Longest analytics window, in days
pub const MAX_ANALYTICS_DAYS: u32 = 365;

/// Requests per day for one user
#[derive(Debug, Clone, Serialize)]
pub struct DailyUsage {
    pub date: String,
    pub requests: i64,
    pub avg_response_time: f64,
    pub success_rate: f64,
}

/// Aggregate over a recent window
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UsageHealth {
    pub requests: i64,
    pub avg_response_time: f64,
    /// Fraction of successful requests, 1.0 when there were none
    pub success_ratio: f64,
}

pub async fn record_usage(
    pool: &SqlitePool,
    user_id: Option<i64>,
    endpoint: &str,
    response_time_secs: f64,
    success: bool,
    error_message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO api_usage (user_id, endpoint, response_time, success, error_message, credits_used, timestamp)
        VALUES (?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(user_id)
    .bind(endpoint)
    .bind(response_time_secs)
    .bind(success)
    .bind(error_message)
    .bind(to_db_timestamp(&now()))
    .execute(pool)
    .await?;
    Ok(())
}

/// Requests recorded for `user_id` at or after `since`
pub async fn requests_since(pool: &SqlitePool, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM api_usage WHERE user_id = ? AND timestamp >= ?")
            .bind(user_id)
            .bind(to_db_timestamp(&since))
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Per-date usage for the last `days` days, oldest date first
///
/// `days` is clamped to `1..=MAX_ANALYTICS_DAYS`.
pub async fn usage_analytics(pool: &SqlitePool, user_id: i64, days: u32) -> Result<Vec<DailyUsage>> {
    let since = now() - Duration::days(i64::from(days.clamp(1, MAX_ANALYTICS_DAYS)));

    let rows = sqlx::query(
        r#"
        SELECT substr(timestamp, 1, 10) AS date,
               COUNT(*) AS requests,
               AVG(response_time) AS avg_response_time,
               SUM(success) AS successful
        FROM api_usage
        WHERE user_id = ? AND timestamp >= ?
        GROUP BY substr(timestamp, 1, 10)
        ORDER BY date
        "#,
    )
    .bind(user_id)
    .bind(to_db_timestamp(&since))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let requests: i64 = row.get("requests");
            let successful: i64 = row.get("successful");
            let avg: Option<f64> = row.get("avg_response_time");
            DailyUsage {
                date: row.get("date"),
                requests,
                avg_response_time: avg.unwrap_or(0.0),
                success_rate: if requests > 0 {
                    successful as f64 / requests as f64 * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect())
}

/// Response time and success ratio across all users since `since`
pub async fn usage_health(pool: &SqlitePool, since: DateTime<Utc>) -> Result<UsageHealth> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS requests,
               AVG(response_time) AS avg_response_time,
               AVG(CAST(success AS REAL)) AS success_ratio
        FROM api_usage
        WHERE timestamp >= ?
        "#,
    )
    .bind(to_db_timestamp(&since))
    .fetch_one(pool)
    .await?;

    let avg: Option<f64> = row.get("avg_response_time");
    let ratio: Option<f64> = row.get("success_ratio");
    Ok(UsageHealth {
        requests: row.get("requests"),
        avg_response_time: avg.unwrap_or(0.0),
        success_ratio: ratio.unwrap_or(1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bella_common::db::{init_memory_database, DEFAULT_USER_ID};

    #[tokio::test]
    async fn test_usage_counts_and_analytics() {
        let pool = init_memory_database().await.unwrap();
        record_usage(&pool, Some(DEFAULT_USER_ID), "generate_single", 1.0, true, None)
            .await
            .unwrap();
        record_usage(&pool, Some(DEFAULT_USER_ID), "generate_single", 3.0, false, Some("boom"))
            .await
            .unwrap();
        record_usage(&pool, Some(7), "generate_batch", 2.0, true, None)
            .await
            .unwrap();

        let hour_ago = now() - Duration::hours(1);
        assert_eq!(requests_since(&pool, DEFAULT_USER_ID, hour_ago).await.unwrap(), 2);
        assert_eq!(requests_since(&pool, DEFAULT_USER_ID, now() + Duration::hours(1)).await.unwrap(), 0);

        let analytics = usage_analytics(&pool, DEFAULT_USER_ID, 30).await.unwrap();
        assert_eq!(analytics.len(), 1);
        assert_eq!(analytics[0].requests, 2);
        assert_eq!(analytics[0].avg_response_time, 2.0);
        assert_eq!(analytics[0].success_rate, 50.0);
        assert_eq!(analytics[0].date.len(), 10);
    }

    #[tokio::test]
    async fn test_analytics_window_is_clamped() {
        let pool = init_memory_database().await.unwrap();
        record_usage(&pool, Some(DEFAULT_USER_ID), "generate_single", 1.0, true, None)
            .await
            .unwrap();

        let analytics = usage_analytics(&pool, DEFAULT_USER_ID, u32::MAX).await.unwrap();
        assert_eq!(analytics.len(), 1);
        let analytics = usage_analytics(&pool, DEFAULT_USER_ID, 0).await.unwrap();
        assert_eq!(analytics.len(), 1);
    }

    #[tokio::test]
    async fn test_health_without_usage() {
        let pool = init_memory_database().await.unwrap();
        let health = usage_health(&pool, now() - Duration::hours(1)).await.unwrap();
        assert_eq!(health.requests, 0);
        assert_eq!(health.success_ratio, 1.0);
    }
}
