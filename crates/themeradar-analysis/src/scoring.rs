//! The scoring formulas shared by the batch scorer and the theme analyzer.
//!
//! Both components call into this module so a theme never gets two
//! different scores depending on which pipeline touched it last.

use chrono::{DateTime, Utc};
use themeradar_core::{CompetitionLevel, Impact, InsightType, RevenueRange, TechnicalDifficulty};

/// Horizon over which observation weight decays linearly.
const DECAY_DAYS: f64 = 30.0;
/// Weight floor for observations older than the decay horizon.
const DECAY_FLOOR: f64 = 0.1;
/// Window feeding the growth component.
pub const GROWTH_WINDOW_DAYS: i64 = 7;

const MARKET_COMPONENT_CAP: f64 = 40.0;
const GROWTH_COMPONENT_CAP: f64 = 30.0;
const COMPETITION_COMPONENT_CAP: f64 = 30.0;

/// Recency-weighted mean search volume.
///
/// Weight decays linearly from 1.0 at age zero to the 0.1 floor at the
/// 30-day horizon and stays there, so old observations still count but
/// cannot drown out fresh signal.
#[must_use]
pub fn market_size(volumes: &[(DateTime<Utc>, i64)], now: DateTime<Utc>) -> i64 {
    if volumes.is_empty() {
        return 0;
    }

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for &(captured_at, volume) in volumes {
        let age_days = (now - captured_at).num_seconds().max(0) as f64 / 86_400.0;
        let weight = (1.0 - (1.0 - DECAY_FLOOR) * (age_days / DECAY_DAYS)).max(DECAY_FLOOR);
        #[allow(clippy::cast_precision_loss)]
        {
            weighted_sum += weight * volume.max(0) as f64;
        }
        weight_sum += weight;
    }

    #[allow(clippy::cast_possible_truncation)]
    let size = (weighted_sum / weight_sum).round() as i64;
    size
}

/// Mean growth rate across observations captured in the trailing 7 days.
/// No recent observations means no growth signal, not an error.
#[must_use]
pub fn recent_growth(growth_rates: &[(DateTime<Utc>, f64)], now: DateTime<Utc>) -> f64 {
    let cutoff = now - chrono::Duration::days(GROWTH_WINDOW_DAYS);
    let recent: Vec<f64> = growth_rates
        .iter()
        .filter(|(captured_at, _)| *captured_at >= cutoff)
        .map(|(_, rate)| *rate)
        .collect();

    if recent.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = recent.len() as f64;
    recent.iter().sum::<f64>() / n
}

#[must_use]
pub fn market_component(market_size: i64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let log = ((market_size.max(0) + 1) as f64).log10();
    (log * 8.0).min(MARKET_COMPONENT_CAP)
}

#[must_use]
pub fn growth_component(avg_recent_growth: f64) -> f64 {
    avg_recent_growth.max(0.0).min(GROWTH_COMPONENT_CAP)
}

/// Category bonus feeding the competition/category component.
///
/// Small nudges for categories with proven willingness to pay; anything
/// unrecognized gets no bonus.
#[must_use]
pub fn category_bonus(category: &str) -> f64 {
    match category {
        "finance" => 8.0,
        "health" => 6.0,
        "productivity" => 5.0,
        "education" => 4.0,
        "entertainment" => 2.0,
        _ => 0.0,
    }
}

#[must_use]
pub fn competition_component(level: CompetitionLevel, category: &str) -> f64 {
    let base = match level {
        CompetitionLevel::Low => 30.0,
        CompetitionLevel::Medium => 20.0,
        CompetitionLevel::High => 10.0,
    };
    (base + category_bonus(category)).min(COMPETITION_COMPONENT_CAP)
}

/// The monetization score: three independently capped components, clamped
/// to [0, 100].
#[must_use]
pub fn monetization_score(
    market_size: i64,
    avg_recent_growth: f64,
    competition: CompetitionLevel,
    category: &str,
) -> i32 {
    let total = market_component(market_size)
        + growth_component(avg_recent_growth)
        + competition_component(competition, category);
    #[allow(clippy::cast_possible_truncation)]
    let score = total.round().clamp(0.0, 100.0) as i32;
    score
}

/// Competition classification from market size alone.
#[must_use]
pub fn classify_competition(market_size: i64) -> CompetitionLevel {
    if market_size > 100_000 {
        CompetitionLevel::High
    } else if market_size > 10_000 {
        CompetitionLevel::Medium
    } else {
        CompetitionLevel::Low
    }
}

const ADVANCED_KEYWORDS: &[&str] = &[
    "machine learning",
    "artificial intelligence",
    "blockchain",
    "real-time",
    "realtime",
    "encryption",
    "computer vision",
    "distributed",
];

const BEGINNER_KEYWORDS: &[&str] = &[
    "tracker",
    "checklist",
    "journal",
    "template",
    "planner",
    "directory",
    "landing page",
];

/// Keyword heuristic over title and description. Complexity keywords win
/// over simplicity keywords when both appear.
#[must_use]
pub fn classify_difficulty(title: &str, description: &str) -> TechnicalDifficulty {
    let text = format!("{title} {description}").to_lowercase();
    if ADVANCED_KEYWORDS.iter().any(|k| text.contains(k)) {
        TechnicalDifficulty::Advanced
    } else if BEGINNER_KEYWORDS.iter().any(|k| text.contains(k)) {
        TechnicalDifficulty::Beginner
    } else {
        TechnicalDifficulty::Intermediate
    }
}

/// Estimated monthly revenue range in whole dollars.
///
/// Base estimate: market size scaled by score, times a competition
/// multiplier (an uncontested market converts better). The range spans
/// 0.3x to 1.5x of the base.
#[must_use]
pub fn revenue_range(market_size: i64, score: i32, competition: CompetitionLevel) -> RevenueRange {
    let multiplier = match competition {
        CompetitionLevel::Low => 1.5,
        CompetitionLevel::Medium => 1.0,
        CompetitionLevel::High => 0.6,
    };
    #[allow(clippy::cast_precision_loss)]
    let base = market_size.max(0) as f64 * (f64::from(score.clamp(0, 100)) / 100.0) * multiplier;

    #[allow(clippy::cast_possible_truncation)]
    RevenueRange::new((base * 0.3).round() as i64, (base * 1.5).round() as i64)
}

/// Inputs to insight derivation, produced by either scoring pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ThemeSignals {
    pub market_size: i64,
    pub avg_recent_growth: f64,
    pub distinct_sources: usize,
    pub competition: CompetitionLevel,
}

/// One derived insight, ready for the (theme, type) upsert.
#[derive(Debug, Clone)]
pub struct DerivedInsight {
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub impact: Impact,
}

/// Derives zero or more insights from the current signals.
///
/// The supplied competition level is trusted as-is rather than re-derived
/// from market size. Note the consequence for `blue_ocean`: it needs a
/// market above 50k together with low competition, while
/// [`classify_competition`] only yields low for markets up to 10k, so a
/// caller that classifies competition from market size (the analyzer
/// does) can never produce it. It fires only for callers with an
/// independent low-competition signal.
#[must_use]
pub fn derive_insights(signals: &ThemeSignals) -> Vec<DerivedInsight> {
    let mut insights = Vec::new();

    if signals.avg_recent_growth > 50.0 {
        insights.push(DerivedInsight {
            insight_type: InsightType::HighGrowth,
            title: "Rapidly growing interest".to_owned(),
            description: format!(
                "Average growth of {:.0}% across recent observations.",
                signals.avg_recent_growth
            ),
            confidence: 0.8,
            impact: Impact::Positive,
        });
    }

    if signals.avg_recent_growth < -20.0 {
        insights.push(DerivedInsight {
            insight_type: InsightType::DecliningTrend,
            title: "Interest is declining".to_owned(),
            description: format!(
                "Average growth of {:.0}% across recent observations.",
                signals.avg_recent_growth
            ),
            confidence: 0.7,
            impact: Impact::Negative,
        });
    }

    if signals.distinct_sources >= 3 {
        #[allow(clippy::cast_precision_loss)]
        let confidence = (0.5 + 0.1 * signals.distinct_sources as f64).min(1.0);
        insights.push(DerivedInsight {
            insight_type: InsightType::MultiSourceValidation,
            title: "Validated across sources".to_owned(),
            description: format!(
                "{} independent sources report this theme.",
                signals.distinct_sources
            ),
            confidence,
            impact: Impact::Positive,
        });
    }

    if signals.market_size > 50_000 && signals.competition == CompetitionLevel::Low {
        insights.push(DerivedInsight {
            insight_type: InsightType::BlueOcean,
            title: "Large market, little competition".to_owned(),
            description: format!(
                "Market size around {} with low competition.",
                signals.market_size
            ),
            confidence: 0.75,
            impact: Impact::Positive,
        });
    }

    if signals.market_size > 1_000 && signals.market_size < 10_000 {
        insights.push(DerivedInsight {
            insight_type: InsightType::NicheMarket,
            title: "Focused niche market".to_owned(),
            description: format!(
                "Market size around {} suits a targeted product.",
                signals.market_size
            ),
            confidence: 0.6,
            impact: Impact::Neutral,
        });
    }

    insights
}
