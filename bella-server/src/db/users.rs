//! User quota operations

use anyhow::Result;
use sqlx::{Row, SqlitePool};

/// Remaining-quota check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
    Available,
    Exhausted,
    UnknownUser,
}

pub async fn quota_status(pool: &SqlitePool, user_id: i64) -> Result<QuotaStatus> {
    let row = sqlx::query(
        "SELECT api_quota_used, api_quota_limit FROM users WHERE id = ? AND is_active = 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        None => QuotaStatus::UnknownUser,
        Some(row) => {
            let used: i64 = row.get("api_quota_used");
            let limit: i64 = row.get("api_quota_limit");
            if used < limit {
                QuotaStatus::Available
            } else {
                QuotaStatus::Exhausted
            }
        }
    })
}

/// Charge `credits` against the user's quota
pub async fn consume_quota(pool: &SqlitePool, user_id: i64, credits: i64) -> Result<()> {
    sqlx::query("UPDATE users SET api_quota_used = api_quota_used + ? WHERE id = ?")
        .bind(credits)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count_active(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = 1")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
