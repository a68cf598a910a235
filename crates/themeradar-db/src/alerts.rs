//! Database operations for `alert_rules` and `notifications`.
//!
//! Alert rules are read-only from this subsystem; they are created and edited
//! by the UI layer. Notifications are write-mostly: this subsystem inserts
//! them, the UI layer reads and marks them.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `alert_rules` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertRuleRow {
    pub id: i64,
    pub user_id: i64,
    /// `None` means the rule applies to every theme.
    pub theme_id: Option<i64>,
    /// Category filter for `new_competitor` rules.
    pub category: Option<String>,
    pub alert_type: String,
    pub threshold_value: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A row from the `notifications` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification ready to persist.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
}

/// Returns every active alert rule.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_alert_rules(pool: &PgPool) -> Result<Vec<AlertRuleRow>, DbError> {
    let rows = sqlx::query_as::<_, AlertRuleRow>(
        "SELECT id, user_id, theme_id, category, alert_type, threshold_value, \
                is_active, created_at \
         FROM alert_rules \
         WHERE is_active \
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// User ids holding an active alert rule scoped to this theme (or to all
/// themes).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_alert_user_ids_for_theme(
    pool: &PgPool,
    theme_id: i64,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT DISTINCT user_id FROM alert_rules \
         WHERE is_active AND (theme_id = $1 OR theme_id IS NULL) \
         ORDER BY user_id",
    )
    .bind(theme_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// User ids on any non-free tier. The coarse notification fallback audience.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_paying_user_ids(pool: &PgPool) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM app_users WHERE tier <> 'free' ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Inserts a notification row and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_notification(
    pool: &PgPool,
    notification: &NewNotification,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO notifications (user_id, notification_type, title, message, payload) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(notification.user_id)
    .bind(&notification.notification_type)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.payload)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
