//! Microblogging collector: recent-search over short posts, with engagement
//! (likes, reposts, replies) as the volume signal and post language as the
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

const DEFAULT_BASE_URL: &str = "https://api.socialgrid.dev";
const PAGE_SIZE: u32 = 100;
const MAX_PAGES: usize = 2;

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    public_metrics: PublicMetrics,
    created_at: DateTime<Utc>,
    #[serde(default)]
    lang: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    retweet_count: i64,
    #[serde(default)]
    reply_count: i64,
}

impl Tweet {
    fn engagement(&self) -> f64 {
        let m = &self.public_metrics;
        #[allow(clippy::cast_precision_loss)]
        let e = (m.like_count.max(0) + m.retweet_count.max(0) + m.reply_count.max(0)) as f64;
        e
    }
}

pub struct SocialCollector;

impl SourceCollector for SocialCollector {
    fn id(&self) -> SourceId {
        SourceId::Social
    }

    async fn collect(
        &self,
        ctx: &CollectorContext<'_>,
        themes: &[String],
        _region: &str,
        _force_refresh: bool,
    ) -> Result<Vec<Observation>, CollectError> {
        let token = ctx.credential(SourceId::Social)?.to_owned();
        let base = ctx.base_url(SourceId::Social, DEFAULT_BASE_URL);

        collect_each_theme(SourceId::Social, themes, |theme| {
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
    let mut tweets: Vec<Tweet> = Vec::new();
    let mut next_token: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let url = search_url(base, theme, next_token.as_deref());
        let page: SearchPage = fetch_with_retry(
            SourceId::Social,
            ctx.governor,
            ctx.classifier,
            ctx.cancel,
            ctx.max_attempts(),
            || get_json(ctx, SourceId::Social, &url, Auth::Bearer(token)),
        )
        .await?;

        next_token = page.meta.next_token;
        tweets.extend(page.data);
        if next_token.is_none() {
            break;
        }
    }

    Ok(normalize(theme, &tweets))
}

fn search_url(base: &str, theme: &str, next_token: Option<&str>) -> String {
    let query = utf8_percent_encode(theme, NON_ALPHANUMERIC);
    let mut url = format!(
        "{base}/2/posts/search/recent?query={query}&max_results={PAGE_SIZE}\
         &post.fields=public_metrics,created_at,lang"
    );
    if let Some(cursor) = next_token {
        url.push_str("&next_token=");
        url.push_str(&utf8_percent_encode(cursor, NON_ALPHANUMERIC).to_string());
    }
    url
}

fn normalize(theme: &str, tweets: &[Tweet]) -> Observation {
    let points: Vec<(DateTime<Utc>, f64)> = tweets
        .iter()
        .map(|t| (t.created_at, t.engagement()))
        .collect();

    #[allow(clippy::cast_possible_truncation)]
    let search_volume = tweets.iter().map(Tweet::engagement).sum::<f64>() as i64;

    let demographic_data = share_map(
        tweets
            .iter()
            .filter_map(|t| t.lang.as_ref().map(|lang| (lang.clone(), t.engagement()))),
    );

    let captured_at = tweets
        .iter()
        .map(|t| t.created_at)
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
