//! Persisted calendars

use anyhow::{Context, Result};
use bella_common::calendar::{Calendar, CalendarEntry};
use bella_common::time::{now, parse_rfc3339, to_db_timestamp};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// Listing row; calendar data is not loaded
#[derive(Debug, Clone, Serialize)]
pub struct CalendarSummary {
    pub id: i64,
    pub niche: String,
    pub city: String,
    pub days_generated: i64,
    pub generation_method: String,
    pub created_at: DateTime<Utc>,
    pub success_rate: f64,
}

/// Full persisted calendar
#[derive(Debug, Clone, Serialize)]
pub struct CalendarRecord {
    pub id: i64,
    pub user_id: i64,
    pub niche: String,
    pub city: String,
    pub days_generated: i64,
    pub generation_method: String,
    pub calendar_data: Vec<CalendarEntry>,
    pub generation_time_secs: f64,
    pub success_rate: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarPage {
    pub calendars: Vec<CalendarSummary>,
    pub pagination: Pagination,
}

/// Store a generated calendar, returning its id
pub async fn save_calendar(
    pool: &SqlitePool,
    user_id: i64,
    calendar: &Calendar,
    requested_days: u32,
    generation_time_secs: f64,
) -> Result<i64> {
    let data = serde_json::to_string(calendar.entries())?;

    let result = sqlx::query(
        r#"
        INSERT INTO content_calendars
            (user_id, niche, city, days_generated, generation_method, calendar_data,
             generation_time, success_rate, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(&calendar.niche)
    .bind(&calendar.city)
    .bind(calendar.len() as i64)
    .bind(calendar.generation_method())
    .bind(data)
    .bind(generation_time_secs)
    .bind(calendar.success_rate(requested_days))
    .bind(to_db_timestamp(&now()))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn load_calendar(pool: &SqlitePool, id: i64) -> Result<Option<CalendarRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, niche, city, days_generated, generation_method, calendar_data,
               generation_time, success_rate, created_at
        FROM content_calendars
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let data: String = row.get("calendar_data");
            let calendar_data: Vec<CalendarEntry> =
                serde_json::from_str(&data).context("Corrupt calendar data")?;
            let created_at: String = row.get("created_at");

            Ok(Some(CalendarRecord {
                id: row.get("id"),
                user_id: row.get("user_id"),
                niche: row.get("niche"),
                city: row.get("city"),
                days_generated: row.get("days_generated"),
                generation_method: row.get("generation_method"),
                calendar_data,
                generation_time_secs: row.get("generation_time"),
                success_rate: row.get("success_rate"),
                created_at: parse_rfc3339(&created_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// One page of a user's calendars, newest first
///
/// Pages are 1-based; `per_page` is clamped to 1..=100.
pub async fn list_calendars(
    pool: &SqlitePool,
    user_id: i64,
    page: u32,
    per_page: u32,
) -> Result<CalendarPage> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page as i64 - 1) * per_page as i64;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_calendars WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT id, niche, city, days_generated, generation_method, created_at, success_rate
        FROM content_calendars
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(per_page as i64)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut calendars = Vec::with_capacity(rows.len());
    for row in rows {
        let created_at: String = row.get("created_at");
        calendars.push(CalendarSummary {
            id: row.get("id"),
            niche: row.get("niche"),
            city: row.get("city"),
            days_generated: row.get("days_generated"),
            generation_method: row.get("generation_method"),
            created_at: parse_rfc3339(&created_at)?,
            success_rate: row.get("success_rate"),
        });
    }

    let pages = (total + per_page as i64 - 1) / per_page as i64;
    Ok(CalendarPage {
        calendars,
        pagination: Pagination {
            page,
            per_page,
            total,
            pages,
        },
    })
}
