//! Shared collector types: the normalized observation shape and the context
//! threaded through every collector call.

use chrono::{DateTime, Utc};
use themeradar_core::{AppConfig, SourceId, SourcesFile};

use crate::cancel::CancelFlag;
use crate::error::CollectError;
use crate::failure::FailureClassifier;
use crate::rate::RateGovernor;

/// One normalized data point for one theme from one source.
///
/// Collectors flatten heterogeneous payloads (posts, tweets, repositories,
/// launches, interest series) into this shape; the orchestrator resolves the
/// theme name to a row id and persists it.
#[derive(Debug, Clone)]
pub struct Observation {
    pub theme: String,
    pub search_volume: i64,
    pub growth_rate: f64,
    /// Region name to interest weight, as reported by the source.
    pub geographic_data: serde_json::Value,
    /// Source-specific segment to share-of-volume weight.
    pub demographic_data: serde_json::Value,
    /// When the underlying data was measured. Derived from the source
    /// payload so a retried run lands on the same upsert key.
    pub captured_at: DateTime<Utc>,
}

/// Borrowed dependencies handed to every collector call.
#[derive(Clone, Copy)]
pub struct CollectorContext<'a> {
    pub http: &'a reqwest::Client,
    pub governor: &'a RateGovernor,
    pub classifier: &'a FailureClassifier,
    pub cancel: &'a CancelFlag,
    pub config: &'a AppConfig,
    pub sources: &'a SourcesFile,
}

impl CollectorContext<'_> {
    /// Endpoint base for a source: the `sources.yaml` override when present,
    /// otherwise the collector's production default.
    #[must_use]
    pub fn base_url(&self, source: SourceId, default: &str) -> String {
        self.sources
            .settings_for(source)
            .base_url
            .unwrap_or_else(|| default.to_owned())
    }

    /// Configured credential for a source.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::MissingCredential`] when none is configured,
    /// which disables the source for the run.
    pub fn credential(&self, source: SourceId) -> Result<&str, CollectError> {
        self.config
            .credential_for(source)
            .ok_or(CollectError::MissingCredential { source })
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.config.collect_max_attempts
    }
}

/// Fallback `captured_at` when a payload carries no item timestamps: the
/// current UTC day at midnight, so retried runs still dedupe.
#[must_use]
pub fn day_bucket(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_bucket_truncates_to_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(day_bucket(now), expected);
    }

    #[test]
    fn day_bucket_is_stable_within_one_day() {
        let morning = Utc.with_ymd_and_hms(2025, 3, 14, 1, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2025, 3, 14, 23, 59, 59).unwrap();
        assert_eq!(day_bucket(morning), day_bucket(evening));
    }
}
