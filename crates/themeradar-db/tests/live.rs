//! Live integration tests for themeradar-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/themeradar-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory.

use chrono::{Duration, Utc};
use themeradar_core::{CompetitionLevel, TechnicalDifficulty};
use themeradar_db::{
    add_theme_data_source, complete_collection_run, create_collection_run,
    delete_insights_not_in, delete_observations_older_than, distinct_sources_for_theme,
    fail_collection_run, get_collection_run, get_or_create_theme, insert_collection_run_source,
    insert_notification, list_active_alert_rules, list_alert_user_ids_for_theme,
    list_collection_run_sources, list_insights_for_theme, list_observations_since,
    list_paying_user_ids, list_themes_by_staleness, start_collection_run, update_theme_metrics,
    upsert_insight, upsert_observation, NewInsight, NewNotification, NewObservation, ThemeMetrics,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_observation(theme_id: i64, source: &str, volume: i64) -> NewObservation {
    NewObservation {
        theme_id,
        source: source.to_string(),
        search_volume: volume,
        growth_rate: 12.0,
        geographic_data: serde_json::json!({"us": 0.5, "eu": 0.3}),
        demographic_data: serde_json::json!({}),
        captured_at: Utc::now() - Duration::hours(1),
    }
}

async fn insert_test_user(pool: &sqlx::PgPool, email: &str, tier: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO app_users (public_id, email, tier) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(uuid::Uuid::new_v4())
    .bind(email)
    .bind(tier)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_test_user failed for '{email}': {e}"))
}

async fn insert_test_alert_rule(
    pool: &sqlx::PgPool,
    user_id: i64,
    theme_id: Option<i64>,
    alert_type: &str,
    threshold: f64,
    is_active: bool,
) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO alert_rules (user_id, theme_id, alert_type, threshold_value, is_active) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(user_id)
    .bind(theme_id)
    .bind(alert_type)
    .bind(threshold)
    .bind(is_active)
    .fetch_one(pool)
    .await
    .expect("insert_test_alert_rule failed")
}

// ---------------------------------------------------------------------------
// Section 1: Collection run lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let sources = vec!["trends".to_string(), "forum".to_string()];
    let run = create_collection_run(&pool, "user:7", "global", &sources)
        .await
        .expect("create_collection_run failed");

    assert_eq!(run.status, "queued");
    assert_eq!(run.requested_by, "user:7");
    assert!(run.started_at.is_none());

    start_collection_run(&pool, run.id)
        .await
        .expect("start_collection_run failed");

    complete_collection_run(&pool, run.id, 5)
        .await
        .expect("complete_collection_run failed");

    let finished = get_collection_run(&pool, run.id)
        .await
        .expect("get_collection_run failed");
    assert_eq!(finished.status, "succeeded");
    assert_eq!(finished.records_processed, 5);
    assert!(finished.completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_cannot_complete_before_start(pool: sqlx::PgPool) {
    let run = create_collection_run(&pool, "cli", "global", &[])
        .await
        .expect("create failed");

    let result = complete_collection_run(&pool, run.id, 1).await;
    assert!(
        matches!(
            result,
            Err(themeradar_db::DbError::InvalidCollectionRunTransition { .. })
        ),
        "expected InvalidCollectionRunTransition, got: {result:?}"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_fail_records_message(pool: sqlx::PgPool) {
    let run = create_collection_run(&pool, "cli", "global", &[])
        .await
        .expect("create failed");
    start_collection_run(&pool, run.id).await.expect("start");

    fail_collection_run(&pool, run.id, "all sources failed")
        .await
        .expect("fail_collection_run failed");

    let failed = get_collection_run(&pool, run.id).await.expect("get");
    assert_eq!(failed.status, "failed");
    assert_eq!(failed.error_message.as_deref(), Some("all sources failed"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn per_source_outcomes_enumerate_success_and_error(pool: sqlx::PgPool) {
    let run = create_collection_run(&pool, "cli", "global", &[])
        .await
        .expect("create failed");

    insert_collection_run_source(&pool, run.id, "trends", "success", 12, None)
        .await
        .expect("insert success outcome");
    insert_collection_run_source(&pool, run.id, "social", "error", 0, Some("HTTP 503"))
        .await
        .expect("insert error outcome");

    let outcomes = list_collection_run_sources(&pool, run.id)
        .await
        .expect("list outcomes");
    assert_eq!(outcomes.len(), 2);

    let social = outcomes.iter().find(|o| o.source == "social").expect("social row");
    assert_eq!(social.status, "error");
    assert_eq!(social.error_message.as_deref(), Some("HTTP 503"));

    let trends = outcomes.iter().find(|o| o.source == "trends").expect("trends row");
    assert_eq!(trends.status, "success");
    assert_eq!(trends.record_count, 12);
}

// ---------------------------------------------------------------------------
// Section 2: Themes and observations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn get_or_create_theme_is_idempotent(pool: sqlx::PgPool) {
    let first = get_or_create_theme(&pool, "ai-note-taking")
        .await
        .expect("first create");
    let second = get_or_create_theme(&pool, "ai-note-taking")
        .await
        .expect("second create");

    assert_eq!(first.id, second.id);
    assert_eq!(second.title, "ai-note-taking");
    assert_eq!(second.monetization_score, 0);
    assert!(second.updated_at >= second.created_at);
}

#[sqlx::test(migrations = "../../migrations")]
async fn observation_upsert_key_prevents_duplicates(pool: sqlx::PgPool) {
    let theme = get_or_create_theme(&pool, "dup-test").await.expect("theme");

    let mut obs = make_observation(theme.id, "forum", 100);
    upsert_observation(&pool, &obs).await.expect("first upsert");

    // Same (theme, source, captured_at) with a new volume updates in place.
    obs.search_volume = 250;
    upsert_observation(&pool, &obs).await.expect("second upsert");

    let rows = list_observations_since(&pool, theme.id, Utc::now() - Duration::days(1))
        .await
        .expect("list");
    assert_eq!(rows.len(), 1, "upsert key must hold");
    assert_eq!(rows[0].search_volume, 250);
}

#[sqlx::test(migrations = "../../migrations")]
async fn data_source_append_is_idempotent(pool: sqlx::PgPool) {
    let theme = get_or_create_theme(&pool, "sources-test").await.expect("theme");

    add_theme_data_source(&pool, theme.id, "forum").await.expect("first add");
    add_theme_data_source(&pool, theme.id, "forum").await.expect("second add");
    add_theme_data_source(&pool, theme.id, "social").await.expect("third add");

    let refreshed = themeradar_db::get_theme(&pool, theme.id).await.expect("get");
    assert_eq!(refreshed.data_sources, vec!["forum", "social"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn retention_cleanup_deletes_only_old_observations(pool: sqlx::PgPool) {
    let theme = get_or_create_theme(&pool, "retention-test").await.expect("theme");

    let mut old = make_observation(theme.id, "trends", 50);
    old.captured_at = Utc::now() - Duration::days(120);
    upsert_observation(&pool, &old).await.expect("old upsert");

    let fresh = make_observation(theme.id, "trends", 80);
    upsert_observation(&pool, &fresh).await.expect("fresh upsert");

    let deleted = delete_observations_older_than(&pool, Utc::now() - Duration::days(90))
        .await
        .expect("cleanup");
    assert_eq!(deleted, 1);

    let remaining = list_observations_since(&pool, theme.id, Utc::now() - Duration::days(365))
        .await
        .expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].search_volume, 80);
}

#[sqlx::test(migrations = "../../migrations")]
async fn staleness_ordering_returns_least_recent_first(pool: sqlx::PgPool) {
    let older = get_or_create_theme(&pool, "older-theme").await.expect("older");
    let newer = get_or_create_theme(&pool, "newer-theme").await.expect("newer");

    // Bump the newer theme so its updated_at moves forward.
    let metrics = ThemeMetrics {
        monetization_score: 40,
        market_size: 1000,
        competition_level: CompetitionLevel::Medium,
        technical_difficulty: TechnicalDifficulty::Intermediate,
        estimated_revenue_min: 100,
        estimated_revenue_max: 500,
    };
    update_theme_metrics(&pool, newer.id, &metrics).await.expect("update");

    let page = list_themes_by_staleness(&pool, 10, 0).await.expect("page");
    assert_eq!(page.first().map(|t| t.id), Some(older.id));
    assert_eq!(page.last().map(|t| t.id), Some(newer.id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn distinct_sources_reports_each_source_once(pool: sqlx::PgPool) {
    let theme = get_or_create_theme(&pool, "distinct-test").await.expect("theme");

    upsert_observation(&pool, &make_observation(theme.id, "forum", 10)).await.expect("a");
    let mut second = make_observation(theme.id, "forum", 20);
    second.captured_at = Utc::now() - Duration::hours(2);
    upsert_observation(&pool, &second).await.expect("b");
    upsert_observation(&pool, &make_observation(theme.id, "codehost", 30)).await.expect("c");

    let sources = distinct_sources_for_theme(&pool, theme.id).await.expect("sources");
    assert_eq!(sources, vec!["codehost", "forum"]);
}

// ---------------------------------------------------------------------------
// Section 3: Insights
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn insight_upsert_replaces_by_type(pool: sqlx::PgPool) {
    let theme = get_or_create_theme(&pool, "insight-test").await.expect("theme");

    let mut insight = NewInsight {
        theme_id: theme.id,
        insight_type: "high_growth".to_string(),
        title: "Rapid growth".to_string(),
        description: "Growth at 60%".to_string(),
        confidence: 0.8,
        impact: "positive".to_string(),
    };
    upsert_insight(&pool, &insight).await.expect("first upsert");

    insight.description = "Growth at 75%".to_string();
    insight.confidence = 0.9;
    upsert_insight(&pool, &insight).await.expect("second upsert");

    let rows = list_insights_for_theme(&pool, theme.id).await.expect("list");
    assert_eq!(rows.len(), 1, "at most one insight per (theme, type)");
    assert_eq!(rows[0].description, "Growth at 75%");
    assert!((rows[0].confidence - 0.9).abs() < f64::EPSILON);
}

#[sqlx::test(migrations = "../../migrations")]
async fn stale_insight_retraction_keeps_only_supported_types(pool: sqlx::PgPool) {
    let theme = get_or_create_theme(&pool, "retract-test").await.expect("theme");

    for ty in ["high_growth", "blue_ocean", "niche_market"] {
        upsert_insight(
            &pool,
            &NewInsight {
                theme_id: theme.id,
                insight_type: ty.to_string(),
                title: ty.to_string(),
                description: String::new(),
                confidence: 0.5,
                impact: "neutral".to_string(),
            },
        )
        .await
        .expect("seed insight");
    }

    let retracted =
        delete_insights_not_in(&pool, theme.id, &["high_growth".to_string()])
            .await
            .expect("retract");
    assert_eq!(retracted, 2);

    let rows = list_insights_for_theme(&pool, theme.id).await.expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].insight_type, "high_growth");
}

// ---------------------------------------------------------------------------
// Section 4: Alert rules and notifications
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn active_alert_rules_exclude_inactive(pool: sqlx::PgPool) {
    let user = insert_test_user(&pool, "a@example.com", "pro").await;
    insert_test_alert_rule(&pool, user, None, "score_change", 75.0, true).await;
    insert_test_alert_rule(&pool, user, None, "growth_spike", 50.0, false).await;

    let rules = list_active_alert_rules(&pool).await.expect("rules");
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].alert_type, "score_change");
    assert!((rules[0].threshold_value - 75.0).abs() < f64::EPSILON);
}

#[sqlx::test(migrations = "../../migrations")]
async fn interested_users_include_global_and_theme_scoped_rules(pool: sqlx::PgPool) {
    let theme = get_or_create_theme(&pool, "interest-test").await.expect("theme");
    let other = get_or_create_theme(&pool, "other-theme").await.expect("other");

    let global_user = insert_test_user(&pool, "global@example.com", "free").await;
    let scoped_user = insert_test_user(&pool, "scoped@example.com", "free").await;
    let unrelated_user = insert_test_user(&pool, "unrelated@example.com", "free").await;

    insert_test_alert_rule(&pool, global_user, None, "score_change", 50.0, true).await;
    insert_test_alert_rule(&pool, scoped_user, Some(theme.id), "score_change", 50.0, true).await;
    insert_test_alert_rule(&pool, unrelated_user, Some(other.id), "score_change", 50.0, true).await;

    let ids = list_alert_user_ids_for_theme(&pool, theme.id).await.expect("ids");
    assert_eq!(ids, vec![global_user, scoped_user]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn paying_users_exclude_free_tier(pool: sqlx::PgPool) {
    insert_test_user(&pool, "free@example.com", "free").await;
    let pro = insert_test_user(&pool, "pro@example.com", "pro").await;
    let team = insert_test_user(&pool, "team@example.com", "team").await;

    let ids = list_paying_user_ids(&pool).await.expect("ids");
    assert_eq!(ids, vec![pro, team]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn notification_insert_returns_id(pool: sqlx::PgPool) {
    let user = insert_test_user(&pool, "notify@example.com", "pro").await;

    let id = insert_notification(
        &pool,
        &NewNotification {
            user_id: user,
            notification_type: "alert".to_string(),
            title: "Score alert".to_string(),
            message: "theme crossed your threshold".to_string(),
            payload: serde_json::json!({"monetization_score": 80}),
        },
    )
    .await
    .expect("insert notification");

    assert!(id > 0);
}
