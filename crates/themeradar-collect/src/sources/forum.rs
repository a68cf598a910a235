//! Discussion-forum collector: searches recent posts for each theme and
//! folds post engagement (score plus comments) into an observation.

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use themeradar_core::SourceId;

use crate::error::CollectError;
use crate::growth::timed_growth;
use crate::retry::fetch_with_retry;
use crate::sources::{collect_each_theme, get_json, share_map, Auth, SourceCollector};
use crate::types::{day_bucket, CollectorContext, Observation};

const DEFAULT_BASE_URL: &str = "https://oauth.forum-api.net";
const PAGE_SIZE: u32 = 100;
const MAX_PAGES: usize = 2;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    /// Epoch seconds, fractional.
    created_utc: f64,
    #[serde(default)]
    community: Option<String>,
}

impl Post {
    fn engagement(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let e = (self.score.max(0) + self.num_comments.max(0)) as f64;
        e
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        #[allow(clippy::cast_possible_truncation)]
        DateTime::from_timestamp(self.created_utc as i64, 0)
    }
}

pub struct ForumCollector;

impl SourceCollector for ForumCollector {
    fn id(&self) -> SourceId {
        SourceId::Forum
    }

    async fn collect(
        &self,
        ctx: &CollectorContext<'_>,
        themes: &[String],
        _region: &str,
        _force_refresh: bool,
    ) -> Result<Vec<Observation>, CollectError> {
        let token = ctx.credential(SourceId::Forum)?.to_owned();
        let base = ctx.base_url(SourceId::Forum, DEFAULT_BASE_URL);

        collect_each_theme(SourceId::Forum, themes, |theme| {
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
    let mut posts: Vec<Post> = Vec::new();
    let mut after: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let url = search_url(base, theme, after.as_deref());
        let listing: Listing = fetch_with_retry(
            SourceId::Forum,
            ctx.governor,
            ctx.classifier,
            ctx.cancel,
            ctx.max_attempts(),
            || get_json(ctx, SourceId::Forum, &url, Auth::Bearer(token)),
        )
        .await?;

        after = listing.data.after;
        posts.extend(listing.data.children.into_iter().map(|c| c.data));
        if after.is_none() {
            break;
        }
    }

    Ok(normalize(theme, &posts))
}

fn search_url(base: &str, theme: &str, after: Option<&str>) -> String {
    let query = utf8_percent_encode(theme, NON_ALPHANUMERIC);
    let mut url = format!("{base}/search.json?q={query}&sort=new&limit={PAGE_SIZE}");
    if let Some(cursor) = after {
        url.push_str("&after=");
        url.push_str(&utf8_percent_encode(cursor, NON_ALPHANUMERIC).to_string());
    }
    url
}

fn normalize(theme: &str, posts: &[Post]) -> Observation {
    let points: Vec<(DateTime<Utc>, f64)> = posts
        .iter()
        .filter_map(|p| p.created_at().map(|t| (t, p.engagement())))
        .collect();

    #[allow(clippy::cast_possible_truncation)]
    let search_volume = posts.iter().map(Post::engagement).sum::<f64>() as i64;

    let demographic_data = share_map(posts.iter().filter_map(|p| {
        p.community
            .as_ref()
            .map(|name| (name.clone(), p.engagement()))
    }));

    let captured_at = points
        .iter()
        .map(|(t, _)| *t)
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
