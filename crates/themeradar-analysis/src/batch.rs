//! Periodic batch scoring over themes ordered by staleness.

use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use themeradar_core::{AppConfig, CompetitionLevel, TechnicalDifficulty};
use themeradar_db::{self as db, ThemeMetrics, ThemeRow};

use crate::scoring;
use crate::AnalysisError;

/// Full nightly run or the lighter periodic pass.
///
/// The light pass uses the larger market-size persistence threshold so
/// hourly noise does not generate update storms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Full,
    Light,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchReport {
    pub themes_examined: usize,
    pub themes_updated: usize,
    pub observations_deleted: u64,
}

/// Rescores every theme, stalest first, and runs retention cleanup.
///
/// Themes are processed in fixed-size batches; workers within a batch run
/// concurrently up to the configured bound and are joined before the next
/// batch starts. Idempotent: a rerun over unchanged inputs persists
/// nothing.
///
/// # Errors
///
/// Returns [`AnalysisError::Db`] when the theme list or an update cannot
/// be read or written. Per-theme read failures inside a batch are logged
/// and skipped.
pub async fn run_batch_update(
    pool: &PgPool,
    config: &AppConfig,
    mode: BatchMode,
) -> Result<BatchReport, AnalysisError> {
    let market_threshold = match mode {
        BatchMode::Full => config.market_size_change_threshold,
        BatchMode::Light => config.market_size_change_threshold_light,
    };

    let total = db::count_themes(pool).await?;
    // Snapshot the staleness ordering up front: scoring bumps updated_at,
    // which would otherwise shift pages under the iteration.
    let themes = db::list_themes_by_staleness(pool, total, 0).await?;

    tracing::info!(
        mode = ?mode,
        theme_count = themes.len(),
        market_threshold,
        "batch scoring started"
    );

    let mut report = BatchReport {
        themes_examined: themes.len(),
        ..BatchReport::default()
    };

    for batch in themes.chunks(config.batch_size.max(1)) {
        // Iterating owned rows sidesteps a rustc higher-ranked lifetime error
        // when the returned future is checked for `Send` inside `Box::pin`
        // callers.
        let results: Vec<bool> = stream::iter(batch.to_vec())
            .map(|theme| async move { score_theme(pool, config, &theme, market_threshold).await })
            .buffer_unordered(config.batch_max_concurrency.max(1))
            .collect()
            .await;
        report.themes_updated += results.into_iter().filter(|updated| *updated).count();
    }

    let cutoff = Utc::now() - Duration::days(config.observation_retention_days);
    report.observations_deleted = db::delete_observations_older_than(pool, cutoff).await?;

    tracing::info!(
        themes_examined = report.themes_examined,
        themes_updated = report.themes_updated,
        observations_deleted = report.observations_deleted,
        "batch scoring finished"
    );

    Ok(report)
}

/// Rescores one theme. Returns whether an update was persisted.
///
/// Classification fields are carried over unchanged: the batch scorer only
/// refreshes score and market size, the analyzer owns the rest.
async fn score_theme(
    pool: &PgPool,
    config: &AppConfig,
    theme: &ThemeRow,
    market_threshold: i64,
) -> bool {
    let window_start = Utc::now() - Duration::days(config.observation_retention_days);
    let observations = match db::list_observations_since(pool, theme.id, window_start).await {
        Ok(rows) => rows,
        Err(error) => {
            tracing::error!(theme_id = theme.id, error = %error, "failed to load observations");
            return false;
        }
    };

    if observations.is_empty() {
        return false;
    }

    let now = Utc::now();
    let volumes: Vec<_> = observations
        .iter()
        .map(|o| (o.captured_at, o.search_volume))
        .collect();
    let rates: Vec<_> = observations
        .iter()
        .map(|o| (o.captured_at, o.growth_rate))
        .collect();

    let competition =
        CompetitionLevel::parse(&theme.competition_level).unwrap_or(CompetitionLevel::Medium);
    let new_market = scoring::market_size(&volumes, now);
    let avg_growth = scoring::recent_growth(&rates, now);
    let new_score = scoring::monetization_score(new_market, avg_growth, competition, &theme.category);

    let score_delta = (new_score - theme.monetization_score).abs();
    let market_delta = (new_market - theme.market_size).abs();
    if i64::from(score_delta) < i64::from(config.score_change_threshold)
        && market_delta < market_threshold
    {
        return false;
    }

    let metrics = ThemeMetrics {
        monetization_score: new_score,
        market_size: new_market,
        competition_level: competition,
        technical_difficulty: TechnicalDifficulty::parse(&theme.technical_difficulty)
            .unwrap_or(TechnicalDifficulty::Intermediate),
        estimated_revenue_min: theme.estimated_revenue_min,
        estimated_revenue_max: theme.estimated_revenue_max,
    };

    match db::update_theme_metrics(pool, theme.id, &metrics).await {
        Ok(()) => {
            tracing::debug!(
                theme_id = theme.id,
                old_score = theme.monetization_score,
                new_score,
                old_market = theme.market_size,
                new_market,
                "theme rescored"
            );
            true
        }
        Err(error) => {
            tracing::error!(theme_id = theme.id, error = %error, "failed to persist theme metrics");
            false
        }
    }
}
