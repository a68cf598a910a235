//! Alert-rule evaluation: one predicate per rule type.

use themeradar_core::AlertType;
use themeradar_db::AlertRuleRow;

/// How a theme changed within the sync window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    NewTheme,
    ThemeUpdate,
    TrendData,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::NewTheme => "new_theme",
            ChangeKind::ThemeUpdate => "theme_update",
            ChangeKind::TrendData => "trend_data",
        }
    }
}

/// One detected change, with the signals the rule predicates read.
#[derive(Debug, Clone)]
pub struct ThemeChange {
    pub theme_id: i64,
    pub theme_name: String,
    pub category: String,
    pub kind: ChangeKind,
    pub monetization_score: i32,
    pub market_size: i64,
    pub avg_recent_growth: f64,
}

/// Whether an active rule fires for this change.
///
/// Scope first: a theme-bound rule only sees its own theme. Then the
/// per-type predicate; thresholds are inclusive, so a score rule at 75
/// fires on exactly 75. Unknown rule types never fire.
#[must_use]
pub fn rule_matches(rule: &AlertRuleRow, change: &ThemeChange) -> bool {
    if rule.theme_id.is_some_and(|id| id != change.theme_id) {
        return false;
    }

    match AlertType::parse(&rule.alert_type) {
        Some(AlertType::ScoreChange) => {
            f64::from(change.monetization_score) >= rule.threshold_value
        }
        Some(AlertType::MarketOpportunity) => {
            f64::from(change.monetization_score) >= rule.threshold_value
                && change.market_size > 1_000
        }
        Some(AlertType::GrowthSpike) => change.avg_recent_growth >= rule.threshold_value,
        Some(AlertType::NewCompetitor) => {
            change.kind == ChangeKind::NewTheme
                && rule
                    .category
                    .as_deref()
                    .is_none_or(|category| category == change.category)
        }
        None => false,
    }
}
