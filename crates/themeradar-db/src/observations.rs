//! Database operations for the `observations` relation (normalized trend data).

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `observations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ObservationRow {
    pub id: i64,
    pub theme_id: i64,
    pub source: String,
    pub search_volume: i64,
    pub growth_rate: f64,
    pub geographic_data: serde_json::Value,
    pub demographic_data: serde_json::Value,
    pub captured_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A normalized data point ready to persist.
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub theme_id: i64,
    pub source: String,
    pub search_volume: i64,
    pub growth_rate: f64,
    pub geographic_data: serde_json::Value,
    pub demographic_data: serde_json::Value,
    pub captured_at: DateTime<Utc>,
}

/// Inserts or updates one observation.
///
/// Conflicts on `(theme_id, source, captured_at)` overwrite the measured
/// values in place, so retried collection runs never duplicate rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_observation(pool: &PgPool, obs: &NewObservation) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO observations \
             (theme_id, source, search_volume, growth_rate, \
              geographic_data, demographic_data, captured_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (theme_id, source, captured_at) DO UPDATE SET \
             search_volume    = EXCLUDED.search_volume, \
             growth_rate      = EXCLUDED.growth_rate, \
             geographic_data  = EXCLUDED.geographic_data, \
             demographic_data = EXCLUDED.demographic_data",
    )
    .bind(obs.theme_id)
    .bind(&obs.source)
    .bind(obs.search_volume)
    .bind(obs.growth_rate)
    .bind(&obs.geographic_data)
    .bind(&obs.demographic_data)
    .bind(obs.captured_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all observations for a theme captured at or after `since`,
/// oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_observations_since(
    pool: &PgPool,
    theme_id: i64,
    since: DateTime<Utc>,
) -> Result<Vec<ObservationRow>, DbError> {
    let rows = sqlx::query_as::<_, ObservationRow>(
        "SELECT id, theme_id, source, search_volume, growth_rate, \
                geographic_data, demographic_data, captured_at, created_at \
         FROM observations \
         WHERE theme_id = $1 AND captured_at >= $2 \
         ORDER BY captured_at ASC, id ASC",
    )
    .bind(theme_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Distinct source identifiers that have reported this theme.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn distinct_sources_for_theme(
    pool: &PgPool,
    theme_id: i64,
) -> Result<Vec<String>, DbError> {
    let sources = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT source FROM observations WHERE theme_id = $1 ORDER BY source",
    )
    .bind(theme_id)
    .fetch_all(pool)
    .await?;

    Ok(sources)
}

/// Deletes observations captured before `cutoff`. Returns the rows removed.
///
/// Retention cleanup is unconditional: aggregates derived from purged rows
/// live on in the `themes` relation.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_observations_older_than(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM observations WHERE captured_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Theme ids with at least one observation written since `since`.
///
/// Drives the realtime sync's `trend_data` change classification.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recently_observed_theme_ids(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT DISTINCT theme_id FROM observations WHERE created_at >= $1 ORDER BY theme_id",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
