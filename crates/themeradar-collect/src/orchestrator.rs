//! Collection orchestration: fan-out across the requested sources, theme
//! resolution, observation persistence, and the run/outcome audit trail.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use themeradar_core::{AppConfig, SourceId, SourcesFile};
use themeradar_db::{self as db, DbError, NewObservation};
use thiserror::Error;
use uuid::Uuid;

use crate::cancel::CancelFlag;
use crate::failure::{ErrorSummary, FailureClassifier};
use crate::rate::RateGovernor;
use crate::sources::collect_source;
use crate::types::{CollectorContext, Observation};

/// Which sources a collection request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    All,
    Only(Vec<SourceId>),
}

impl SourceSelection {
    /// Parses the wire form: empty or `["all"]` selects every source.
    ///
    /// # Errors
    ///
    /// Returns the offending name when it matches no known source.
    pub fn parse(names: &[String]) -> Result<Self, String> {
        if names.is_empty() || (names.len() == 1 && names[0] == "all") {
            return Ok(Self::All);
        }

        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            match SourceId::parse(name) {
                Some(source) => {
                    if !selected.contains(&source) {
                        selected.push(source);
                    }
                }
                None => return Err(format!("unknown source '{name}'")),
            }
        }
        Ok(Self::Only(selected))
    }

    #[must_use]
    pub fn resolve(&self) -> Vec<SourceId> {
        match self {
            SourceSelection::All => SourceId::ALL.to_vec(),
            SourceSelection::Only(sources) => sources.clone(),
        }
    }
}

/// One collection trigger, as received from the API, CLI, or scheduler.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub themes: Vec<String>,
    pub sources: SourceSelection,
    pub region: String,
    /// Authenticated actor, recorded for audit attribution only.
    pub requested_by: String,
    pub force_refresh: bool,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The request itself is malformed. The only whole-run-fatal condition
    /// besides storage being unreachable.
    #[error("invalid collection request: {0}")]
    Validation(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Error,
}

impl OutcomeStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Error => "error",
        }
    }
}

/// Outcome of one source within one run.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: SourceId,
    pub status: OutcomeStatus,
    pub record_count: i32,
    pub error_message: Option<String>,
}

/// End-of-run report handed back to the trigger.
#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub run_id: i64,
    pub public_id: Uuid,
    pub status: String,
    pub records_processed: i32,
    pub outcomes: Vec<SourceOutcome>,
    pub errors: ErrorSummary,
}

/// Runs one collection end to end.
///
/// Sources run concurrently with bounded fan-out; themes run serially
/// within each source call. One source's total failure is recorded as an
/// `error` outcome and never aborts the others; the run itself only fails
/// when every requested source failed.
///
/// # Errors
///
/// Returns [`OrchestratorError::Validation`] for a malformed request and
/// [`OrchestratorError::Db`] when the audit trail itself cannot be written.
pub async fn run_collection(
    pool: &PgPool,
    config: &AppConfig,
    sources_file: &SourcesFile,
    governor: &RateGovernor,
    cancel: &CancelFlag,
    request: &CollectRequest,
) -> Result<CollectionSummary, OrchestratorError> {
    validate(request)?;

    let sources = request.sources.resolve();
    let source_names: Vec<String> = sources.iter().map(|s| s.as_str().to_owned()).collect();

    let run = db::create_collection_run(
        pool,
        &request.requested_by,
        &request.region,
        &source_names,
    )
    .await?;
    db::start_collection_run(pool, run.id).await?;

    tracing::info!(
        run_id = run.id,
        public_id = %run.public_id,
        requested_by = %request.requested_by,
        region = %request.region,
        sources = ?source_names,
        theme_count = request.themes.len(),
        "collection run started"
    );

    // Themes are resolved up front so concurrent source tasks share one
    // id map instead of racing get-or-create per observation.
    let mut theme_ids: HashMap<String, i64> = HashMap::with_capacity(request.themes.len());
    for name in &request.themes {
        let theme = db::get_or_create_theme(pool, name).await?;
        theme_ids.insert(name.clone(), theme.id);
    }

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(
            config.collect_request_timeout_secs,
        ))
        .user_agent(&config.collect_user_agent)
        .build()?;

    let classifier = FailureClassifier::new();
    let ctx = CollectorContext {
        http: &http,
        governor,
        classifier: &classifier,
        cancel,
        config,
        sources: sources_file,
    };

    let outcomes: Vec<SourceOutcome> = stream::iter(sources)
        .map(|source| {
            let theme_ids = &theme_ids;
            let request = &request;
            async move {
                let result = collect_source(
                    &ctx,
                    source,
                    &request.themes,
                    &request.region,
                    request.force_refresh,
                )
                .await;
                match result {
                    Ok(observations) => {
                        let stored = store_observations(pool, source, theme_ids, observations).await;
                        SourceOutcome {
                            source,
                            status: OutcomeStatus::Success,
                            record_count: stored,
                            error_message: None,
                        }
                    }
                    Err(error) => SourceOutcome {
                        source,
                        status: OutcomeStatus::Error,
                        record_count: 0,
                        error_message: Some(error.to_string()),
                    },
                }
            }
        })
        .buffer_unordered(config.collect_max_concurrent_sources.max(1))
        .collect()
        .await;

    for outcome in &outcomes {
        db::insert_collection_run_source(
            pool,
            run.id,
            outcome.source.as_str(),
            outcome.status.as_str(),
            outcome.record_count,
            outcome.error_message.as_deref(),
        )
        .await?;
    }

    let records_processed: i32 = outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Success)
        .map(|o| o.record_count)
        .sum();
    let all_failed = outcomes.iter().all(|o| o.status == OutcomeStatus::Error);

    let status = if all_failed {
        let message = outcomes
            .iter()
            .filter_map(|o| o.error_message.as_deref())
            .collect::<Vec<_>>()
            .join("; ");
        db::fail_collection_run(pool, run.id, &message).await?;
        tracing::error!(run_id = run.id, error = %message, "collection run failed");
        "failed"
    } else {
        db::complete_collection_run(pool, run.id, records_processed).await?;
        tracing::info!(
            run_id = run.id,
            records_processed,
            "collection run succeeded"
        );
        "succeeded"
    };

    Ok(CollectionSummary {
        run_id: run.id,
        public_id: run.public_id,
        status: status.to_owned(),
        records_processed,
        outcomes,
        errors: classifier.error_summary(),
    })
}

/// Persists one source's observations. Storage failures are logged and
/// excluded from the stored count, never escalated: data already gathered
/// from other themes and sources must survive.
async fn store_observations(
    pool: &PgPool,
    source: SourceId,
    theme_ids: &HashMap<String, i64>,
    observations: Vec<Observation>,
) -> i32 {
    let mut stored: i32 = 0;
    for obs in observations {
        let Some(&theme_id) = theme_ids.get(&obs.theme) else {
            tracing::warn!(source = %source, theme = %obs.theme, "observation for unresolved theme dropped");
            continue;
        };

        let new_obs = NewObservation {
            theme_id,
            source: source.as_str().to_owned(),
            search_volume: obs.search_volume,
            growth_rate: obs.growth_rate,
            geographic_data: obs.geographic_data,
            demographic_data: obs.demographic_data,
            captured_at: obs.captured_at,
        };

        if let Err(error) = db::upsert_observation(pool, &new_obs).await {
            tracing::error!(source = %source, theme = %obs.theme, error = %error, "failed to store observation");
            continue;
        }
        if let Err(error) = db::add_theme_data_source(pool, theme_id, source.as_str()).await {
            tracing::error!(source = %source, theme = %obs.theme, error = %error, "failed to record theme data source");
        }
        stored += 1;
    }
    stored
}

fn validate(request: &CollectRequest) -> Result<(), OrchestratorError> {
    if request.themes.is_empty() {
        return Err(OrchestratorError::Validation(
            "at least one theme is required".to_owned(),
        ));
    }
    if request.themes.iter().any(|t| t.trim().is_empty()) {
        return Err(OrchestratorError::Validation(
            "theme names must be non-empty".to_owned(),
        ));
    }
    if request.region.trim().is_empty() {
        return Err(OrchestratorError::Validation(
            "region must be non-empty".to_owned(),
        ));
    }
    if request.requested_by.trim().is_empty() {
        return Err(OrchestratorError::Validation(
            "requested_by must identify the triggering actor".to_owned(),
        ));
    }
    if request.sources.resolve().is_empty() {
        return Err(OrchestratorError::Validation(
            "source selection resolved to nothing".to_owned(),
        ));
    }
    Ok(())
}
