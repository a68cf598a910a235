//! The five source collectors and their shared plumbing.
//!
//! Each collector normalizes one external API's payloads into
//! [`Observation`]s: a search-interest backend (`trends`), a discussion
//! forum (`forum`), a microblogging search (`social`), a product-launch
//! board (`launchboard`), and a code-hosting repository search (`codehost`).

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use themeradar_core::SourceId;

use crate::error::CollectError;
use crate::types::{CollectorContext, Observation};

pub mod codehost;
pub mod forum;
pub mod launchboard;
pub mod social;
pub mod trends;

/// One external signal source.
///
/// Implementations own their payload shapes and pagination; the shared
/// retry/backoff/rate plumbing comes in through the context.
pub trait SourceCollector {
    fn id(&self) -> SourceId;

    /// Collects observations for `themes` in `region`.
    ///
    /// Returns partial results: a failure for one theme is logged and
    /// skipped rather than aborting the remaining themes. Only credential
    /// problems and cancellation abort the whole call.
    fn collect(
        &self,
        ctx: &CollectorContext<'_>,
        themes: &[String],
        region: &str,
        force_refresh: bool,
    ) -> impl std::future::Future<Output = Result<Vec<Observation>, CollectError>> + Send;
}

/// Dispatches one source identifier to its collector.
///
/// # Errors
///
/// Propagates the collector's source-fatal errors (missing or rejected
/// credential, cancellation, exhausted retries on every theme).
pub async fn collect_source(
    ctx: &CollectorContext<'_>,
    source: SourceId,
    themes: &[String],
    region: &str,
    force_refresh: bool,
) -> Result<Vec<Observation>, CollectError> {
    match source {
        SourceId::Trends => {
            trends::TrendsCollector::from_config(ctx.config)
                .collect(ctx, themes, region, force_refresh)
                .await
        }
        SourceId::Forum => {
            forum::ForumCollector
                .collect(ctx, themes, region, force_refresh)
                .await
        }
        SourceId::Social => {
            social::SocialCollector
                .collect(ctx, themes, region, force_refresh)
                .await
        }
        SourceId::Launchboard => {
            launchboard::LaunchboardCollector
                .collect(ctx, themes, region, force_refresh)
                .await
        }
        SourceId::Codehost => {
            codehost::CodehostCollector
                .collect(ctx, themes, region, force_refresh)
                .await
        }
    }
}

/// Per-theme isolation loop shared by the collectors.
///
/// Credential failures and cancellation are source-fatal; everything else
/// is logged (the retry loop already counted it) and the remaining themes
/// still run.
pub(crate) async fn collect_each_theme<F, Fut>(
    source: SourceId,
    themes: &[String],
    mut fetch: F,
) -> Result<Vec<Observation>, CollectError>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<Observation, CollectError>>,
{
    let mut observations = Vec::with_capacity(themes.len());
    for theme in themes {
        match fetch(theme.clone()).await {
            Ok(obs) => observations.push(obs),
            Err(CollectError::Cancelled) => return Err(CollectError::Cancelled),
            Err(
                error @ (CollectError::Unauthorized { .. } | CollectError::MissingCredential { .. }),
            ) => return Err(error),
            Err(error) => {
                tracing::warn!(
                    source = %source,
                    theme = %theme,
                    error = %error,
                    "theme collection failed, continuing with remaining themes"
                );
            }
        }
    }
    Ok(observations)
}

/// Optional bearer credential for a request.
#[derive(Clone, Copy)]
pub(crate) enum Auth<'a> {
    Bearer(&'a str),
    None,
}

/// One GET against a source API: status classification plus JSON decode.
///
/// The rate-window wait and retry policy live in the caller's
/// `fetch_with_retry` loop; this performs exactly one request.
pub(crate) async fn get_json<T: DeserializeOwned>(
    ctx: &CollectorContext<'_>,
    source: SourceId,
    url: &str,
    auth: Auth<'_>,
) -> Result<T, CollectError> {
    let mut request = ctx.http.get(url);
    if let Auth::Bearer(token) = auth {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return Err(CollectError::RateLimited {
            source,
            retry_after_secs,
        });
    }
    if status == 401 || status == 403 {
        return Err(CollectError::Unauthorized { source, status });
    }
    if !(200..300).contains(&status) {
        return Err(CollectError::UnexpectedStatus {
            status,
            url: url.to_owned(),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| CollectError::Deserialize {
        context: format!("{source} response from {url}"),
        source: e,
    })
}

/// Normalizes weighted counts into a share map summing to 1.0.
///
/// Missing metadata yields an empty object, never an error.
pub(crate) fn share_map<I>(weights: I) -> serde_json::Value
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut totals: HashMap<String, f64> = HashMap::new();
    for (key, weight) in weights {
        if weight > 0.0 {
            *totals.entry(key).or_default() += weight;
        }
    }

    let sum: f64 = totals.values().sum();
    if sum <= 0.0 {
        return serde_json::Value::Object(serde_json::Map::new());
    }

    let map = totals
        .into_iter()
        .map(|(key, weight)| {
            let share = weight / sum;
            (
                key,
                serde_json::Number::from_f64(share)
                    .map_or(serde_json::Value::Null, serde_json::Value::Number),
            )
        })
        .collect();
    serde_json::Value::Object(map)
}
