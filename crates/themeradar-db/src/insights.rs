//! Database operations for the `insights` relation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `insights` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InsightRow {
    pub id: i64,
    pub theme_id: i64,
    pub insight_type: String,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub impact: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A derived insight ready to persist.
#[derive(Debug, Clone)]
pub struct NewInsight {
    pub theme_id: i64,
    pub insight_type: String,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub impact: String,
}

/// Inserts or refreshes an insight.
///
/// Conflicts on `(theme_id, insight_type)` replace the text, confidence, and
/// impact in place; at most one live insight of a given type per theme.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_insight(pool: &PgPool, insight: &NewInsight) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO insights \
             (theme_id, insight_type, title, description, confidence, impact) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (theme_id, insight_type) DO UPDATE SET \
             title       = EXCLUDED.title, \
             description = EXCLUDED.description, \
             confidence  = EXCLUDED.confidence, \
             impact      = EXCLUDED.impact, \
             updated_at  = NOW()",
    )
    .bind(insight.theme_id)
    .bind(&insight.insight_type)
    .bind(&insight.title)
    .bind(&insight.description)
    .bind(insight.confidence)
    .bind(&insight.impact)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all insights for a theme, most recently refreshed first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_insights_for_theme(
    pool: &PgPool,
    theme_id: i64,
) -> Result<Vec<InsightRow>, DbError> {
    let rows = sqlx::query_as::<_, InsightRow>(
        "SELECT id, theme_id, insight_type, title, description, confidence, impact, \
                created_at, updated_at \
         FROM insights \
         WHERE theme_id = $1 \
         ORDER BY updated_at DESC, id DESC",
    )
    .bind(theme_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Deletes insights for a theme whose type is not in `keep`.
///
/// Used only when stale-insight retraction is enabled; returns the number of
/// retracted rows. An empty `keep` list retracts everything for the theme.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_insights_not_in(
    pool: &PgPool,
    theme_id: i64,
    keep: &[String],
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "DELETE FROM insights \
         WHERE theme_id = $1 AND insight_type <> ALL($2)",
    )
    .bind(theme_id)
    .bind(keep)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
