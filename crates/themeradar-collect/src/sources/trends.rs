//! Search-interest collector with a pluggable backend.
//!
//! The HTTP backend talks to a real interest-over-time API; the fixture
//! backend produces deterministic series for tests and credential-less
//! deployments. Which one runs is a deployment decision made in config,
//! never an implicit branch inside the collector.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::{NaiveDate, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use themeradar_core::{AppConfig, SourceId, TrendsBackendKind};

use crate::error::CollectError;
use crate::growth::windowed_growth;
use crate::retry::fetch_with_retry;
use crate::sources::{collect_each_theme, get_json, share_map, Auth, SourceCollector};
use crate::types::{day_bucket, CollectorContext, Observation};

const DEFAULT_BASE_URL: &str = "https://api.trendpulse.io";
const FIXTURE_SERIES_DAYS: u64 = 30;

#[derive(Debug, Deserialize)]
struct InterestResponse {
    #[serde(default)]
    series: Vec<SeriesPoint>,
    #[serde(default)]
    regions: HashMap<String, f64>,
    #[serde(default)]
    age_groups: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct SeriesPoint {
    date: NaiveDate,
    value: f64,
}

#[derive(Debug, Clone, Copy)]
enum TrendsBackend {
    Http,
    Fixture,
}

pub struct TrendsCollector {
    backend: TrendsBackend,
}

impl TrendsCollector {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let backend = match config.trends_backend {
            TrendsBackendKind::Http => TrendsBackend::Http,
            TrendsBackendKind::Fixture => TrendsBackend::Fixture,
        };
        Self { backend }
    }
}

impl SourceCollector for TrendsCollector {
    fn id(&self) -> SourceId {
        SourceId::Trends
    }

    async fn collect(
        &self,
        ctx: &CollectorContext<'_>,
        themes: &[String],
        region: &str,
        force_refresh: bool,
    ) -> Result<Vec<Observation>, CollectError> {
        match self.backend {
            TrendsBackend::Http => {
                let token = ctx.credential(SourceId::Trends)?.to_owned();
                let base = ctx.base_url(SourceId::Trends, DEFAULT_BASE_URL);

                collect_each_theme(SourceId::Trends, themes, |theme| {
                    let token = token.clone();
                    let base = base.clone();
                    async move {
                        collect_theme_http(ctx, &base, &token, &theme, region, force_refresh).await
                    }
                })
                .await
            }
            TrendsBackend::Fixture => Ok(themes
                .iter()
                .map(|theme| fixture_observation(theme, region))
                .collect()),
        }
    }
}

async fn collect_theme_http(
    ctx: &CollectorContext<'_>,
    base: &str,
    token: &str,
    theme: &str,
    region: &str,
    force_refresh: bool,
) -> Result<Observation, CollectError> {
    let url = interest_url(base, theme, region, force_refresh);
    let response: InterestResponse = fetch_with_retry(
        SourceId::Trends,
        ctx.governor,
        ctx.classifier,
        ctx.cancel,
        ctx.max_attempts(),
        || get_json(ctx, SourceId::Trends, &url, Auth::Bearer(token)),
    )
    .await?;

    Ok(normalize(theme, &response))
}

fn interest_url(base: &str, theme: &str, region: &str, force_refresh: bool) -> String {
    let theme = utf8_percent_encode(theme, NON_ALPHANUMERIC);
    let region = utf8_percent_encode(region, NON_ALPHANUMERIC);
    let mut url = format!("{base}/v1/interest?theme={theme}&region={region}");
    if force_refresh {
        url.push_str("&refresh=1");
    }
    url
}

fn normalize(theme: &str, response: &InterestResponse) -> Observation {
    let values: Vec<f64> = response.series.iter().map(|p| p.value).collect();

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let search_volume = if values.is_empty() {
        0
    } else {
        (values.iter().sum::<f64>() / values.len() as f64).round() as i64
    };

    let captured_at = response
        .series
        .iter()
        .map(|p| p.date)
        .max()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or_else(|| day_bucket(Utc::now()), |naive| naive.and_utc());

    Observation {
        theme: theme.to_owned(),
        search_volume,
        growth_rate: windowed_growth(&values),
        geographic_data: share_map(response.regions.clone()),
        demographic_data: share_map(response.age_groups.clone()),
        captured_at,
    }
}

/// Deterministic interest series keyed on (theme, region, day).
///
/// Stable within a calendar day so retried runs land on the same upsert key
/// with the same values.
fn fixture_observation(theme: &str, region: &str) -> Observation {
    let today = Utc::now().date_naive();
    let mut hasher = DefaultHasher::new();
    theme.hash(&mut hasher);
    region.hash(&mut hasher);
    let seed = hasher.finish();

    let base_volume = 500 + (seed % 9_000);
    let slope = (seed >> 16) % 20;

    #[allow(clippy::cast_precision_loss)]
    let values: Vec<f64> = (0..FIXTURE_SERIES_DAYS)
        .map(|day| (base_volume + day * slope) as f64)
        .collect();

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let search_volume = (values.iter().sum::<f64>() / values.len() as f64).round() as i64;

    let regions = share_map(vec![
        ("US".to_owned(), 40.0),
        ("DE".to_owned(), 25.0),
        ("IN".to_owned(), 20.0),
        ("BR".to_owned(), 15.0),
    ]);
    let age_groups = share_map(vec![
        ("18-24".to_owned(), 30.0),
        ("25-34".to_owned(), 45.0),
        ("35-44".to_owned(), 25.0),
    ]);

    Observation {
        theme: theme.to_owned(),
        search_volume,
        growth_rate: windowed_growth(&values),
        geographic_data: regions,
        demographic_data: age_groups,
        captured_at: today
            .and_hms_opt(0, 0, 0)
            .map_or_else(|| day_bucket(Utc::now()), |naive| naive.and_utc()),
    }
}
