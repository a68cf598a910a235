//! Database operations for `collection_runs` and `collection_run_sources`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `collection_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    /// Authenticated actor recorded for audit attribution only.
    pub requested_by: String,
    pub region: String,
    pub requested_sources: Vec<String>,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `collection_run_sources` table.
///
/// Write-once: each requested source gets exactly one outcome row per run,
/// either `success` + count or `error` + message.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRunSourceRow {
    pub id: i64,
    pub collection_run_id: i64,
    pub source: String,
    pub status: String,
    pub record_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// collection_runs operations
// ---------------------------------------------------------------------------

/// Creates a new collection run in `queued` status.
///
/// Generates a UUID in Rust and binds it to `public_id`. Returns the full
/// newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or fetch fails.
pub async fn create_collection_run(
    pool: &PgPool,
    requested_by: &str,
    region: &str,
    requested_sources: &[String],
) -> Result<CollectionRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, CollectionRunRow>(
        "INSERT INTO collection_runs (public_id, requested_by, region, requested_sources, status) \
         VALUES ($1, $2, $3, $4, 'queued') \
         RETURNING id, public_id, requested_by, region, requested_sources, status, \
                   started_at, completed_at, records_processed, error_message, created_at",
    )
    .bind(public_id)
    .bind(requested_by)
    .bind(region)
    .bind(requested_sources)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidCollectionRunTransition`] if the run is not
/// `queued`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_collection_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCollectionRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded`, sets `completed_at = NOW()` and `records_processed`.
///
/// # Errors
///
/// Returns [`DbError::InvalidCollectionRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_collection_run(
    pool: &PgPool,
    id: i64,
    records_processed: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_runs \
         SET status = 'succeeded', completed_at = NOW(), records_processed = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(records_processed)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCollectionRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, sets `completed_at = NOW()` and `error_message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidCollectionRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_collection_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCollectionRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_collection_run(pool: &PgPool, id: i64) -> Result<CollectionRunRow, DbError> {
    let row = sqlx::query_as::<_, CollectionRunRow>(
        "SELECT id, public_id, requested_by, region, requested_sources, status, \
                started_at, completed_at, records_processed, error_message, created_at \
         FROM collection_runs \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collection_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<CollectionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionRunRow>(
        "SELECT id, public_id, requested_by, region, requested_sources, status, \
                started_at, completed_at, records_processed, error_message, created_at \
         FROM collection_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// collection_run_sources operations
// ---------------------------------------------------------------------------

/// Inserts the per-source outcome row for a collection run.
///
/// Conflicts on `(collection_run_id, source)` update the outcome in place;
/// only reached if the same source is recorded twice within one run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn insert_collection_run_source(
    pool: &PgPool,
    run_id: i64,
    source: &str,
    status: &str,
    record_count: i32,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO collection_run_sources \
             (collection_run_id, source, status, record_count, error_message) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (collection_run_id, source) DO UPDATE SET \
             status        = EXCLUDED.status, \
             record_count  = EXCLUDED.record_count, \
             error_message = EXCLUDED.error_message",
    )
    .bind(run_id)
    .bind(source)
    .bind(status)
    .bind(record_count)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all per-source outcome rows for a given collection run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collection_run_sources(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<CollectionRunSourceRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionRunSourceRow>(
        "SELECT id, collection_run_id, source, status, record_count, \
                error_message, created_at \
         FROM collection_run_sources \
         WHERE collection_run_id = $1 \
         ORDER BY source",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
