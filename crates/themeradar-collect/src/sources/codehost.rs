//! Code-hosting collector: repository search per theme. The match count is
//! the volume signal, repository creation dates drive growth, and primary
//! language is the demographic axis.

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use themeradar_core::SourceId;

use crate::error::CollectError;
use crate::growth::timed_growth;
use crate::retry::fetch_with_retry;
use crate::sources::{collect_each_theme, get_json, share_map, Auth, SourceCollector};
use crate::types::{day_bucket, CollectorContext, Observation};

const DEFAULT_BASE_URL: &str = "https://api.codehost.dev";
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct RepoSearch {
    total_count: i64,
    #[serde(default)]
    items: Vec<Repo>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    #[serde(default)]
    stargazers_count: i64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    language: Option<String>,
}

pub struct CodehostCollector;

impl SourceCollector for CodehostCollector {
    fn id(&self) -> SourceId {
        SourceId::Codehost
    }

    async fn collect(
        &self,
        ctx: &CollectorContext<'_>,
        themes: &[String],
        _region: &str,
        _force_refresh: bool,
    ) -> Result<Vec<Observation>, CollectError> {
        let token = ctx.credential(SourceId::Codehost)?.to_owned();
        let base = ctx.base_url(SourceId::Codehost, DEFAULT_BASE_URL);

        collect_each_theme(SourceId::Codehost, themes, |theme| {
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
    let page: RepoSearch = fetch_with_retry(
        SourceId::Codehost,
        ctx.governor,
        ctx.classifier,
        ctx.cancel,
        ctx.max_attempts(),
        || get_json(ctx, SourceId::Codehost, &url, Auth::Bearer(token)),
    )
    .await?;

    Ok(normalize(theme, &page))
}

fn search_url(base: &str, theme: &str) -> String {
    let query = utf8_percent_encode(theme, NON_ALPHANUMERIC);
    format!("{base}/search/repositories?q={query}&sort=stars&order=desc&per_page={PAGE_SIZE}")
}

fn normalize(theme: &str, page: &RepoSearch) -> Observation {
    // Repository creation velocity, weighted by stars, stands in for
    // interest growth; the raw match count is the market-size signal.
    let points: Vec<(DateTime<Utc>, f64)> = page
        .items
        .iter()
        .map(|r| {
            #[allow(clippy::cast_precision_loss)]
            let stars = (r.stargazers_count.max(0) + 1) as f64;
            (r.created_at, stars)
        })
        .collect();

    let demographic_data = share_map(page.items.iter().filter_map(|r| {
        r.language.as_ref().map(|lang| {
            #[allow(clippy::cast_precision_loss)]
            let stars = (r.stargazers_count.max(0) + 1) as f64;
            (lang.clone(), stars)
        })
    }));

    let captured_at = page
        .items
        .iter()
        .map(|r| r.created_at)
        .max()
        .unwrap_or_else(|| day_bucket(Utc::now()));

    Observation {
        theme: theme.to_owned(),
        search_volume: page.total_count.max(0),
        growth_rate: timed_growth(&points),
        geographic_data: serde_json::json!({}),
        demographic_data,
        captured_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn repo(stars: i64, year: i32, language: Option<&str>) -> Repo {
        Repo {
            stargazers_count: stars,
            created_at: Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap(),
            language: language.map(str::to_owned),
        }
    }

    #[test]
    fn volume_is_the_total_match_count_not_page_size() {
        let page = RepoSearch {
            total_count: 12_345,
            items: vec![repo(10, 2024, Some("Rust"))],
        };
        let obs = normalize("cli tools", &page);
        assert_eq!(obs.search_volume, 12_345);
    }

    #[test]
    fn demographics_weight_languages_by_stars() {
        let page = RepoSearch {
            total_count: 2,
            items: vec![repo(299, 2024, Some("Rust")), repo(99, 2024, Some("Go"))],
        };
        let obs = normalize("x", &page);
        let map = obs.demographic_data.as_object().expect("object");
        assert!((map["Rust"].as_f64().unwrap() - 0.75).abs() < 1e-9);
        assert!((map["Go"].as_f64().unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn repos_without_language_are_skipped_in_demographics() {
        let page = RepoSearch {
            total_count: 1,
            items: vec![repo(5, 2024, None)],
        };
        let obs = normalize("x", &page);
        assert_eq!(obs.demographic_data, serde_json::json!({}));
    }

    #[test]
    fn empty_result_is_a_zero_count_observation() {
        let page = RepoSearch {
            total_count: 0,
            items: vec![],
        };
        let obs = normalize("obscure", &page);
        assert_eq!(obs.search_volume, 0);
        assert!(obs.growth_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn payload_deserializes_with_extra_fields() {
        let body = serde_json::json!({
            "total_count": 7,
            "incomplete_results": false,
            "items": [
                {"stargazers_count": 42, "created_at": "2024-05-01T00:00:00Z",
                 "language": "Rust", "full_name": "ignored/extra"}
            ]
        });
        let page: RepoSearch = serde_json::from_value(body).expect("parse");
        assert_eq!(page.total_count, 7);
        assert_eq!(page.items[0].stargazers_count, 42);
    }
}
