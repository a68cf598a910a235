//! Realtime change sync: polls for rows changed in the trailing window,
//! publishes events, and fans notifications out to interested users.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use themeradar_core::AppConfig;
use themeradar_db::{self as db, NewNotification, ThemeRow};

use crate::alerts::{rule_matches, ChangeKind, ThemeChange};
use crate::hub::{BroadcastEvent, BroadcastHub, EventKind};
use crate::BroadcastError;

/// Days of observations feeding the growth signal for rule evaluation.
const GROWTH_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncReport {
    pub changes_detected: usize,
    pub notifications_written: usize,
    pub alerts_fired: usize,
    /// Direct user-channel deliveries that found no listener or failed.
    /// Counted, never escalated: the durable notification already exists.
    pub direct_delivery_misses: usize,
}

/// One realtime sync pass over the trailing window.
///
/// Each change is published on the hub topic, written as a Notification
/// for every interested user (alert-rule holders on the theme plus all
/// paying users), and evaluated against every active alert rule.
///
/// # Errors
///
/// Returns [`BroadcastError::Db`] when the change lists themselves cannot
/// be read. Per-notification write failures are logged and skipped.
pub async fn run_realtime_sync(
    pool: &PgPool,
    config: &AppConfig,
    hub: &BroadcastHub,
) -> Result<SyncReport, BroadcastError> {
    let now = Utc::now();
    let window_start = now - Duration::seconds(config.realtime_window_secs);

    let mut changes: Vec<ThemeChange> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();

    for theme in db::list_recent_themes(pool, window_start).await? {
        let kind = if theme.created_at >= window_start {
            ChangeKind::NewTheme
        } else {
            ChangeKind::ThemeUpdate
        };
        seen.insert(theme.id);
        changes.push(to_change(pool, theme, kind).await?);
    }

    // Fresh observations whose theme row itself did not change are still
    // signal for subscribers watching the raw trend feed.
    for theme_id in db::list_recently_observed_theme_ids(pool, window_start).await? {
        if seen.contains(&theme_id) {
            continue;
        }
        let theme = db::get_theme(pool, theme_id).await?;
        changes.push(to_change(pool, theme, ChangeKind::TrendData).await?);
    }

    let rules = db::list_active_alert_rules(pool).await?;
    let paying_users = db::list_paying_user_ids(pool).await?;

    let mut report = SyncReport {
        changes_detected: changes.len(),
        ..SyncReport::default()
    };

    for change in &changes {
        let payload = change_payload(change);
        hub.publish(BroadcastEvent::new(event_kind(change.kind), payload.clone()));

        let mut interested = db::list_alert_user_ids_for_theme(pool, change.theme_id).await?;
        interested.extend(paying_users.iter().copied());
        interested.sort_unstable();
        interested.dedup();

        for user_id in interested {
            let notification = NewNotification {
                user_id,
                notification_type: change.kind.as_str().to_owned(),
                title: change_title(change),
                message: change_message(change),
                payload: payload.clone(),
            };
            match db::insert_notification(pool, &notification).await {
                Ok(_) => report.notifications_written += 1,
                Err(error) => {
                    tracing::error!(user_id, theme_id = change.theme_id, error = %error, "failed to write notification");
                }
            }
        }

        for rule in &rules {
            if !rule_matches(rule, change) {
                continue;
            }

            let alert_payload = serde_json::json!({
                "rule_id": rule.id,
                "alert_type": rule.alert_type,
                "threshold_value": rule.threshold_value,
                "theme": payload,
            });
            let notification = NewNotification {
                user_id: rule.user_id,
                notification_type: "alert".to_owned(),
                title: format!("Alert: {} on '{}'", rule.alert_type, change.theme_name),
                message: change_message(change),
                payload: alert_payload.clone(),
            };
            match db::insert_notification(pool, &notification).await {
                Ok(_) => {
                    report.alerts_fired += 1;
                    report.notifications_written += 1;
                }
                Err(error) => {
                    tracing::error!(rule_id = rule.id, user_id = rule.user_id, error = %error, "failed to write alert notification");
                    continue;
                }
            }

            let delivered = hub.publish_to_user(
                rule.user_id,
                BroadcastEvent::new(EventKind::Alert, alert_payload),
            );
            if !delivered {
                tracing::debug!(
                    rule_id = rule.id,
                    user_id = rule.user_id,
                    "direct alert delivery missed: no live channel"
                );
                report.direct_delivery_misses += 1;
            }
        }
    }

    tracing::info!(
        changes_detected = report.changes_detected,
        notifications_written = report.notifications_written,
        alerts_fired = report.alerts_fired,
        direct_delivery_misses = report.direct_delivery_misses,
        "realtime sync finished"
    );

    Ok(report)
}

async fn to_change(
    pool: &PgPool,
    theme: ThemeRow,
    kind: ChangeKind,
) -> Result<ThemeChange, BroadcastError> {
    let since = Utc::now() - Duration::days(GROWTH_WINDOW_DAYS);
    let observations = db::list_observations_since(pool, theme.id, since).await?;
    let avg_recent_growth = if observations.is_empty() {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = observations.len() as f64;
        observations.iter().map(|o| o.growth_rate).sum::<f64>() / n
    };

    Ok(ThemeChange {
        theme_id: theme.id,
        theme_name: theme.name,
        category: theme.category,
        kind,
        monetization_score: theme.monetization_score,
        market_size: theme.market_size,
        avg_recent_growth,
    })
}

fn event_kind(kind: ChangeKind) -> EventKind {
    match kind {
        ChangeKind::NewTheme => EventKind::NewTheme,
        ChangeKind::ThemeUpdate => EventKind::ThemeUpdate,
        ChangeKind::TrendData => EventKind::TrendData,
    }
}

fn change_payload(change: &ThemeChange) -> serde_json::Value {
    serde_json::json!({
        "theme_id": change.theme_id,
        "name": change.theme_name,
        "category": change.category,
        "change": change.kind.as_str(),
        "monetization_score": change.monetization_score,
        "market_size": change.market_size,
        "avg_recent_growth": change.avg_recent_growth,
    })
}

fn change_title(change: &ThemeChange) -> String {
    match change.kind {
        ChangeKind::NewTheme => format!("New theme: {}", change.theme_name),
        ChangeKind::ThemeUpdate => format!("Theme updated: {}", change.theme_name),
        ChangeKind::TrendData => format!("New trend data: {}", change.theme_name),
    }
}

fn change_message(change: &ThemeChange) -> String {
    format!(
        "'{}' now scores {} with a market size around {}.",
        change.theme_name, change.monetization_score, change.market_size
    )
}
