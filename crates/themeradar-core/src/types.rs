//! Shared domain enums and value types.

use serde::{Deserialize, Serialize};

/// Competition level for a theme, classified from market-size thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionLevel {
    Low,
    Medium,
    High,
}

impl CompetitionLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompetitionLevel::Low => "low",
            CompetitionLevel::Medium => "medium",
            CompetitionLevel::High => "high",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<CompetitionLevel> {
        match s {
            "low" => Some(CompetitionLevel::Low),
            "medium" => Some(CompetitionLevel::Medium),
            "high" => Some(CompetitionLevel::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompetitionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnicalDifficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl TechnicalDifficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TechnicalDifficulty::Beginner => "beginner",
            TechnicalDifficulty::Intermediate => "intermediate",
            TechnicalDifficulty::Advanced => "advanced",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<TechnicalDifficulty> {
        match s {
            "beginner" => Some(TechnicalDifficulty::Beginner),
            "intermediate" => Some(TechnicalDifficulty::Intermediate),
            "advanced" => Some(TechnicalDifficulty::Advanced),
            _ => None,
        }
    }
}

impl std::fmt::Display for TechnicalDifficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived insight categories. At most one live insight per (theme, type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    HighGrowth,
    DecliningTrend,
    MultiSourceValidation,
    BlueOcean,
    NicheMarket,
}

impl InsightType {
    pub const ALL: [InsightType; 5] = [
        InsightType::HighGrowth,
        InsightType::DecliningTrend,
        InsightType::MultiSourceValidation,
        InsightType::BlueOcean,
        InsightType::NicheMarket,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InsightType::HighGrowth => "high_growth",
            InsightType::DecliningTrend => "declining_trend",
            InsightType::MultiSourceValidation => "multi_source_validation",
            InsightType::BlueOcean => "blue_ocean",
            InsightType::NicheMarket => "niche_market",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<InsightType> {
        match s {
            "high_growth" => Some(InsightType::HighGrowth),
            "declining_trend" => Some(InsightType::DecliningTrend),
            "multi_source_validation" => Some(InsightType::MultiSourceValidation),
            "blue_ocean" => Some(InsightType::BlueOcean),
            "niche_market" => Some(InsightType::NicheMarket),
            _ => None,
        }
    }
}

impl std::fmt::Display for InsightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-configurable alert conditions evaluated against change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ScoreChange,
    MarketOpportunity,
    GrowthSpike,
    NewCompetitor,
}

impl AlertType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::ScoreChange => "score_change",
            AlertType::MarketOpportunity => "market_opportunity",
            AlertType::GrowthSpike => "growth_spike",
            AlertType::NewCompetitor => "new_competitor",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<AlertType> {
        match s {
            "score_change" => Some(AlertType::ScoreChange),
            "market_opportunity" => Some(AlertType::MarketOpportunity),
            "growth_spike" => Some(AlertType::GrowthSpike),
            "new_competitor" => Some(AlertType::NewCompetitor),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional impact of an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Neutral,
    Negative,
}

impl Impact {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Impact::Positive => "positive",
            Impact::Neutral => "neutral",
            Impact::Negative => "negative",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Impact> {
        match s {
            "positive" => Some(Impact::Positive),
            "neutral" => Some(Impact::Neutral),
            "negative" => Some(Impact::Negative),
            _ => None,
        }
    }
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated monthly revenue range in whole dollars. `min <= max` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueRange {
    pub min: i64,
    pub max: i64,
}

impl RevenueRange {
    /// Construct a range, swapping bounds if given out of order.
    #[must_use]
    pub fn new(min: i64, max: i64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }
}
