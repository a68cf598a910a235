//! Database operations for the `themes` relation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const THEME_COLUMNS: &str = "id, public_id, name, title, description, category, \
     monetization_score, market_size, competition_level, technical_difficulty, \
     estimated_revenue_min, estimated_revenue_max, data_sources, created_at, updated_at";

/// A row from the `themes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ThemeRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub monetization_score: i32,
    pub market_size: i64,
    pub competition_level: String,
    pub technical_difficulty: String,
    pub estimated_revenue_min: i64,
    pub estimated_revenue_max: i64,
    pub data_sources: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recomputed aggregate metrics persisted by the scorer/analyzer.
#[derive(Debug, Clone, Copy)]
pub struct ThemeMetrics {
    pub monetization_score: i32,
    pub market_size: i64,
    pub competition_level: themeradar_core::CompetitionLevel,
    pub technical_difficulty: themeradar_core::TechnicalDifficulty,
    pub estimated_revenue_min: i64,
    pub estimated_revenue_max: i64,
}

/// Fetches the theme for `name`, creating it on first sight.
///
/// The insert is idempotent: a concurrent creator wins the race and both
/// callers observe the same row. The theme `title` defaults to the raw name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or fetch fails.
pub async fn get_or_create_theme(pool: &PgPool, name: &str) -> Result<ThemeRow, DbError> {
    let public_id = Uuid::new_v4();

    // DO NOTHING + re-select instead of DO UPDATE so a lost race never
    // touches updated_at on the existing row.
    sqlx::query(
        "INSERT INTO themes (public_id, name, title) \
         VALUES ($1, $2, $2) \
         ON CONFLICT (name) DO NOTHING",
    )
    .bind(public_id)
    .bind(name)
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, ThemeRow>(&format!(
        "SELECT {THEME_COLUMNS} FROM themes WHERE name = $1"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetches a single theme by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] on
/// query failure.
pub async fn get_theme(pool: &PgPool, id: i64) -> Result<ThemeRow, DbError> {
    let row = sqlx::query_as::<_, ThemeRow>(&format!(
        "SELECT {THEME_COLUMNS} FROM themes WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Records that `source` has contributed data for the theme.
///
/// No-op when the source is already listed; does not bump `updated_at` in
/// that case, so repeated collections stay idempotent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn add_theme_data_source(
    pool: &PgPool,
    theme_id: i64,
    source: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE themes \
         SET data_sources = array_append(data_sources, $1), updated_at = NOW() \
         WHERE id = $2 AND NOT ($1 = ANY(data_sources))",
    )
    .bind(source)
    .bind(theme_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persists recomputed aggregate metrics and bumps `updated_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the theme does not exist, or
/// [`DbError::Sqlx`] on query failure.
pub async fn update_theme_metrics(
    pool: &PgPool,
    theme_id: i64,
    metrics: &ThemeMetrics,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE themes SET \
             monetization_score = $1, \
             market_size = $2, \
             competition_level = $3, \
             technical_difficulty = $4, \
             estimated_revenue_min = $5, \
             estimated_revenue_max = $6, \
             updated_at = NOW() \
         WHERE id = $7",
    )
    .bind(metrics.monetization_score)
    .bind(metrics.market_size)
    .bind(metrics.competition_level.as_str())
    .bind(metrics.technical_difficulty.as_str())
    .bind(metrics.estimated_revenue_min)
    .bind(metrics.estimated_revenue_max)
    .bind(theme_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Returns up to `limit` themes ordered least-recently-updated first,
/// starting at `offset`. This is the Batch Scorer's work queue.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_themes_by_staleness(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<ThemeRow>, DbError> {
    let rows = sqlx::query_as::<_, ThemeRow>(&format!(
        "SELECT {THEME_COLUMNS} FROM themes \
         ORDER BY updated_at ASC, id ASC \
         LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Total number of tracked themes.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_themes(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM themes")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Returns themes whose `updated_at` falls within the trailing window.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_themes(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<ThemeRow>, DbError> {
    let rows = sqlx::query_as::<_, ThemeRow>(&format!(
        "SELECT {THEME_COLUMNS} FROM themes \
         WHERE updated_at >= $1 \
         ORDER BY updated_at DESC, id DESC"
    ))
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the most recently updated `limit` themes for read APIs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_themes(pool: &PgPool, limit: i64) -> Result<Vec<ThemeRow>, DbError> {
    let rows = sqlx::query_as::<_, ThemeRow>(&format!(
        "SELECT {THEME_COLUMNS} FROM themes \
         ORDER BY updated_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
