//! Per-theme deep analysis: classification, revenue estimation, and
//! insight derivation on top of the shared scoring formulas.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use themeradar_core::{AppConfig, CompetitionLevel, TechnicalDifficulty};
use themeradar_db::{self as db, NewInsight, ThemeMetrics};

use crate::scoring::{self, DerivedInsight, ThemeSignals};
use crate::AnalysisError;

/// Everything the analyzer computed for one theme.
#[derive(Debug, Clone)]
pub struct ThemeAnalysis {
    pub theme_id: i64,
    pub monetization_score: i32,
    pub market_size: i64,
    pub avg_recent_growth: f64,
    pub competition: CompetitionLevel,
    pub difficulty: TechnicalDifficulty,
    pub insights: Vec<DerivedInsight>,
    pub metrics_persisted: bool,
    pub insights_retracted: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeReport {
    pub themes_analyzed: usize,
    pub insights_written: usize,
    pub insights_retracted: u64,
}

/// Analyzes one theme end to end.
///
/// Recomputes market size and score through the same formulas as the batch
/// scorer, reclassifies competition and difficulty, re-estimates revenue,
/// and upserts the derived insights. Metrics are persisted only when
/// something materially changed, so re-analysis of unchanged data does not
/// bump `updated_at`.
///
/// # Errors
///
/// Returns [`AnalysisError::Db`] if the theme cannot be read or any write
/// fails.
pub async fn analyze_theme(
    pool: &PgPool,
    config: &AppConfig,
    theme_id: i64,
) -> Result<ThemeAnalysis, AnalysisError> {
    let theme = db::get_theme(pool, theme_id).await?;
    let window_start = Utc::now() - Duration::days(config.observation_retention_days);
    let observations = db::list_observations_since(pool, theme_id, window_start).await?;
    let sources = db::distinct_sources_for_theme(pool, theme_id).await?;

    let now = Utc::now();
    let volumes: Vec<_> = observations
        .iter()
        .map(|o| (o.captured_at, o.search_volume))
        .collect();
    let rates: Vec<_> = observations
        .iter()
        .map(|o| (o.captured_at, o.growth_rate))
        .collect();

    let market_size = scoring::market_size(&volumes, now);
    let avg_recent_growth = scoring::recent_growth(&rates, now);
    let competition = scoring::classify_competition(market_size);
    let difficulty = scoring::classify_difficulty(&theme.title, &theme.description);
    let score =
        scoring::monetization_score(market_size, avg_recent_growth, competition, &theme.category);
    let revenue = scoring::revenue_range(market_size, score, competition);

    let metrics = ThemeMetrics {
        monetization_score: score,
        market_size,
        competition_level: competition,
        technical_difficulty: difficulty,
        estimated_revenue_min: revenue.min,
        estimated_revenue_max: revenue.max,
    };

    let changed = (score - theme.monetization_score).abs()
        >= config.score_change_threshold
        || (market_size - theme.market_size).abs() >= config.market_size_change_threshold
        || theme.competition_level != competition.as_str()
        || theme.technical_difficulty != difficulty.as_str()
        || theme.estimated_revenue_min != revenue.min
        || theme.estimated_revenue_max != revenue.max;
    if changed {
        db::update_theme_metrics(pool, theme_id, &metrics).await?;
    }

    let signals = ThemeSignals {
        market_size,
        avg_recent_growth,
        distinct_sources: sources.len(),
        competition,
    };
    let insights = scoring::derive_insights(&signals);

    for insight in &insights {
        let new_insight = NewInsight {
            theme_id,
            insight_type: insight.insight_type.as_str().to_owned(),
            title: insight.title.clone(),
            description: insight.description.clone(),
            confidence: insight.confidence,
            impact: insight.impact.as_str().to_owned(),
        };
        db::upsert_insight(pool, &new_insight).await?;
    }

    // Retraction is a deliberate policy switch: the default keeps stale
    // insights as a historical record.
    let insights_retracted = if config.retract_stale_insights {
        let keep: Vec<String> = insights
            .iter()
            .map(|i| i.insight_type.as_str().to_owned())
            .collect();
        db::delete_insights_not_in(pool, theme_id, &keep).await?
    } else {
        0
    };

    tracing::debug!(
        theme_id,
        score,
        market_size,
        competition = %competition,
        insight_count = insights.len(),
        insights_retracted,
        "theme analyzed"
    );

    Ok(ThemeAnalysis {
        theme_id,
        monetization_score: score,
        market_size,
        avg_recent_growth,
        competition,
        difficulty,
        insights,
        metrics_persisted: changed,
        insights_retracted,
    })
}

/// Analyzes every tracked theme, stalest first.
///
/// # Errors
///
/// Returns [`AnalysisError::Db`] if the theme list cannot be read.
/// Per-theme analysis failures are logged and skipped.
pub async fn analyze_themes(pool: &PgPool, config: &AppConfig) -> Result<AnalyzeReport, AnalysisError> {
    let total = db::count_themes(pool).await?;
    let themes = db::list_themes_by_staleness(pool, total, 0).await?;

    let mut report = AnalyzeReport::default();
    for theme in &themes {
        match analyze_theme(pool, config, theme.id).await {
            Ok(analysis) => {
                report.themes_analyzed += 1;
                report.insights_written += analysis.insights.len();
                report.insights_retracted += analysis.insights_retracted;
            }
            Err(error) => {
                tracing::error!(theme_id = theme.id, error = %error, "theme analysis failed");
            }
        }
    }

    tracing::info!(
        themes_analyzed = report.themes_analyzed,
        insights_written = report.insights_written,
        insights_retracted = report.insights_retracted,
        "analysis pass finished"
    );

    Ok(report)
}
