//! Product-launch board collector: searches recent launches per theme,
//! using votes plus comments as engagement and launch topics as the
//! demographic axis.

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use themeradar_core::SourceId;

use crate::error::CollectError;
use crate::growth::timed_growth;
use crate::retry::fetch_with_retry;
use crate::sources::{collect_each_theme, get_json, share_map, Auth, SourceCollector};
use crate::types::{day_bucket, CollectorContext, Observation};

const DEFAULT_BASE_URL: &str = "https://api.launchboard.app";
const PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
struct LaunchPage {
    #[serde(default)]
    posts: Vec<Launch>,
}

#[derive(Debug, Deserialize)]
struct Launch {
    #[serde(default)]
    votes_count: i64,
    #[serde(default)]
    comments_count: i64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    topics: Vec<String>,
}

impl Launch {
    fn engagement(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let e = (self.votes_count.max(0) + self.comments_count.max(0)) as f64;
        e
    }
}

pub struct LaunchboardCollector;

impl SourceCollector for LaunchboardCollector {
    fn id(&self) -> SourceId {
        SourceId::Launchboard
    }

    async fn collect(
        &self,
        ctx: &CollectorContext<'_>,
        themes: &[String],
        _region: &str,
        _force_refresh: bool,
    ) -> Result<Vec<Observation>, CollectError> {
        let token = ctx.credential(SourceId::Launchboard)?.to_owned();
        let base = ctx.base_url(SourceId::Launchboard, DEFAULT_BASE_URL);

        collect_each_theme(SourceId::Launchboard, themes, |theme| {
            let token = token.clone();
            let base = base.clone();
            async move { collect_theme(ctx, &base, &token, &theme).await }
        })
        .await
    }
}

async fn collect_theme(
    ctx: &CollectorContext<'_>,
    base: &str,
    token: &str,
    theme: &str,
) -> Result<Observation, CollectError> {
    let url = search_url(base, theme);
    let page: LaunchPage = fetch_with_retry(
        SourceId::Launchboard,
        ctx.governor,
        ctx.classifier,
        ctx.cancel,
        ctx.max_attempts(),
        || get_json(ctx, SourceId::Launchboard, &url, Auth::Bearer(token)),
    )
    .await?;

    Ok(normalize(theme, &page.posts))
}

fn search_url(base: &str, theme: &str) -> String {
    let query = utf8_percent_encode(theme, NON_ALPHANUMERIC);
    format!("{base}/v1/posts?search={query}&sort=newest&per_page={PAGE_SIZE}")
}

fn normalize(theme: &str, launches: &[Launch]) -> Observation {
    let points: Vec<(DateTime<Utc>, f64)> = launches
        .iter()
        .map(|l| (l.created_at, l.engagement()))
        .collect();

    #[allow(clippy::cast_possible_truncation)]
    let search_volume = launches.iter().map(Launch::engagement).sum::<f64>() as i64;

    // A launch tagged with several topics contributes its engagement to
    // each of them; shares are normalized afterwards.
    let demographic_data = share_map(launches.iter().flat_map(|l| {
        let engagement = l.engagement();
        l.topics
            .iter()
            .map(move |topic| (topic.clone(), engagement))
    }));

    let captured_at = launches
        .iter()
        .map(|l| l.created_at)
        .max()
        .unwrap_or_else(|| day_bucket(Utc::now()));

    Observation {
        theme: theme.to_owned(),
        search_volume,
        growth_rate: timed_growth(&points),
        geographic_data: serde_json::json!({}),
        demographic_data,
        captured_at,
    }
}
