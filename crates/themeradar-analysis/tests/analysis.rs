//! Batch scorer and theme analyzer tests against a real database.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use themeradar_analysis::{analyze_theme, run_batch_update, BatchMode};
use themeradar_core::{
    AppConfig, CompetitionLevel, Environment, TechnicalDifficulty, TrendsBackendKind,
};
use themeradar_db::{self as db, NewObservation, ThemeMetrics};

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_owned(),
        env: Environment::Test,
        bind_addr: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
        log_level: "debug".to_owned(),
        sources_path: PathBuf::from("config/sources.yaml"),
        trends_api_key: None,
        forum_api_key: None,
        social_api_key: None,
        launchboard_api_key: None,
        codehost_api_key: None,
        trends_backend: TrendsBackendKind::Fixture,
        db_max_connections: 5,
        db_min_connections: 1,
        db_acquire_timeout_secs: 5,
        collect_request_timeout_secs: 5,
        collect_user_agent: "themeradar-test/0.1".to_owned(),
        collect_max_concurrent_sources: 4,
        collect_max_attempts: 3,
        collect_backoff_base_ms: 0,
        collect_backoff_cap_ms: 0,
        collect_backoff_jitter_ms: 0,
        batch_size: 20,
        batch_max_concurrency: 4,
        score_change_threshold: 5,
        market_size_change_threshold: 500,
        market_size_change_threshold_light: 1000,
        observation_retention_days: 90,
        realtime_window_secs: 300,
        retract_stale_insights: false,
    }
}

async fn insert_observation(
    pool: &PgPool,
    theme_id: i64,
    source: &str,
    volume: i64,
    growth: f64,
    age_days: i64,
) {
    // Midnight-truncated so the same age always lands on the same upsert key.
    let captured_at = (Utc::now() - Duration::days(age_days))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    let obs = NewObservation {
        theme_id,
        source: source.to_owned(),
        search_volume: volume,
        growth_rate: growth,
        geographic_data: serde_json::json!({}),
        demographic_data: serde_json::json!({}),
        captured_at,
    };
    db::upsert_observation(pool, &obs).await.expect("insert observation");
}

#[sqlx::test(migrations = "../../migrations")]
async fn batch_scoring_persists_score_and_market(pool: PgPool) {
    let config = test_config();
    let theme = db::get_or_create_theme(&pool, "ai journaling")
        .await
        .expect("theme");
    insert_observation(&pool, theme.id, "forum", 5_000, 20.0, 1).await;

    let report = run_batch_update(&pool, &config, BatchMode::Full)
        .await
        .expect("batch");

    assert_eq!(report.themes_examined, 1);
    assert_eq!(report.themes_updated, 1);

    let updated = db::get_theme(&pool, theme.id).await.expect("theme");
    assert_eq!(updated.market_size, 5_000);
    assert!(updated.monetization_score > 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn batch_rerun_over_unchanged_inputs_persists_nothing(pool: PgPool) {
    let config = test_config();
    let theme = db::get_or_create_theme(&pool, "meal planning")
        .await
        .expect("theme");
    insert_observation(&pool, theme.id, "social", 2_000, 10.0, 1).await;

    run_batch_update(&pool, &config, BatchMode::Full)
        .await
        .expect("first run");
    let after_first = db::get_theme(&pool, theme.id).await.expect("theme");

    let report = run_batch_update(&pool, &config, BatchMode::Full)
        .await
        .expect("second run");
    let after_second = db::get_theme(&pool, theme.id).await.expect("theme");

    assert_eq!(report.themes_updated, 0);
    assert_eq!(after_first.updated_at, after_second.updated_at);
    assert_eq!(after_first.monetization_score, after_second.monetization_score);
}

#[sqlx::test(migrations = "../../migrations")]
async fn light_pass_ignores_small_market_moves(pool: PgPool) {
    let config = test_config();
    let theme = db::get_or_create_theme(&pool, "budget tracking")
        .await
        .expect("theme");

    // Baseline chosen so the new data moves the market by 600: above the
    // full threshold (500), below the light one (1000). The stored score
    // matches the recomputed one so only the market delta decides.
    let baseline = ThemeMetrics {
        monetization_score: 46,
        market_size: 1_000,
        competition_level: CompetitionLevel::Medium,
        technical_difficulty: TechnicalDifficulty::Intermediate,
        estimated_revenue_min: 0,
        estimated_revenue_max: 0,
    };
    db::update_theme_metrics(&pool, theme.id, &baseline)
        .await
        .expect("baseline");
    insert_observation(&pool, theme.id, "forum", 1_600, 0.0, 1).await;

    let light = run_batch_update(&pool, &config, BatchMode::Light)
        .await
        .expect("light pass");
    assert_eq!(light.themes_updated, 0);

    let full = run_batch_update(&pool, &config, BatchMode::Full)
        .await
        .expect("full pass");
    assert_eq!(full.themes_updated, 1);

    let updated = db::get_theme(&pool, theme.id).await.expect("theme");
    assert_eq!(updated.market_size, 1_600);
}

#[sqlx::test(migrations = "../../migrations")]
async fn retention_cleanup_removes_only_expired_observations(pool: PgPool) {
    let config = test_config();
    let theme = db::get_or_create_theme(&pool, "habit tracker")
        .await
        .expect("theme");
    insert_observation(&pool, theme.id, "forum", 100, 0.0, 100).await;
    insert_observation(&pool, theme.id, "forum", 200, 0.0, 1).await;

    let report = run_batch_update(&pool, &config, BatchMode::Full)
        .await
        .expect("batch");
    assert_eq!(report.observations_deleted, 1);

    let remaining = db::list_observations_since(
        &pool,
        theme.id,
        Utc::now() - Duration::days(365),
    )
    .await
    .expect("observations");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].search_volume, 200);
}

#[sqlx::test(migrations = "../../migrations")]
async fn analyzer_classifies_and_writes_insights(pool: PgPool) {
    let config = test_config();
    let theme = db::get_or_create_theme(&pool, "ai journaling")
        .await
        .expect("theme");
    insert_observation(&pool, theme.id, "forum", 120_000, 62.0, 1).await;
    insert_observation(&pool, theme.id, "social", 120_000, 62.0, 2).await;
    insert_observation(&pool, theme.id, "codehost", 120_000, 62.0, 3).await;

    let analysis = analyze_theme(&pool, &config, theme.id)
        .await
        .expect("analyze");

    assert_eq!(analysis.market_size, 120_000);
    assert_eq!(analysis.competition, CompetitionLevel::High);
    assert!(analysis.metrics_persisted);

    let stored = db::get_theme(&pool, theme.id).await.expect("theme");
    assert_eq!(stored.competition_level, "high");
    assert!(stored.monetization_score >= 70);
    assert!(stored.estimated_revenue_min <= stored.estimated_revenue_max);

    let insights = db::list_insights_for_theme(&pool, theme.id)
        .await
        .expect("insights");
    let types: Vec<&str> = insights.iter().map(|i| i.insight_type.as_str()).collect();
    assert!(types.contains(&"high_growth"), "got {types:?}");
    assert!(types.contains(&"multi_source_validation"), "got {types:?}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn stale_insights_survive_unless_retraction_is_enabled(pool: PgPool) {
    let mut config = test_config();
    let theme = db::get_or_create_theme(&pool, "fitness coaching")
        .await
        .expect("theme");

    insert_observation(&pool, theme.id, "forum", 5_000, 80.0, 1).await;
    analyze_theme(&pool, &config, theme.id).await.expect("first analysis");

    let initial = db::list_insights_for_theme(&pool, theme.id)
        .await
        .expect("insights");
    assert!(initial
        .iter()
        .any(|i| i.insight_type == "high_growth"));

    // Same capture key, growth gone: the high_growth condition no longer
    // holds on re-analysis.
    insert_observation(&pool, theme.id, "forum", 5_000, 0.0, 1).await;

    let kept = analyze_theme(&pool, &config, theme.id)
        .await
        .expect("second analysis");
    assert_eq!(kept.insights_retracted, 0);
    let after_default = db::list_insights_for_theme(&pool, theme.id)
        .await
        .expect("insights");
    assert!(
        after_default.iter().any(|i| i.insight_type == "high_growth"),
        "historical insight must survive with retraction off"
    );

    config.retract_stale_insights = true;
    let retracted = analyze_theme(&pool, &config, theme.id)
        .await
        .expect("third analysis");
    assert!(retracted.insights_retracted >= 1);
    let after_retraction = db::list_insights_for_theme(&pool, theme.id)
        .await
        .expect("insights");
    assert!(
        !after_retraction.iter().any(|i| i.insight_type == "high_growth"),
        "stale insight must be retracted when the policy is on"
    );
}
