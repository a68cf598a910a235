use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use themeradar_collect::{
    run_collection, CollectRequest, ErrorSummary, OrchestratorError, SourceSelection,
};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CollectBody {
    pub themes: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_requested_by")]
    pub requested_by: String,
    #[serde(default)]
    pub force_refresh: bool,
}

fn default_region() -> String {
    "US".to_owned()
}

fn default_requested_by() -> String {
    "api".to_owned()
}

#[derive(Debug, Serialize)]
pub(super) struct CollectResult {
    collection_run_id: Uuid,
    status: String,
    records_processed: i32,
    sources: Vec<SourceOutcomeItem>,
    errors: ErrorSummary,
}

#[derive(Debug, Serialize)]
pub(super) struct SourceOutcomeItem {
    source: String,
    status: String,
    record_count: i32,
    error_message: Option<String>,
}

pub(super) async fn trigger_collect(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CollectBody>,
) -> Result<Json<ApiResponse<CollectResult>>, ApiError> {
    let sources = SourceSelection::parse(&body.sources)
        .map_err(|message| ApiError::new(req_id.0.clone(), "validation_error", message))?;

    let request = CollectRequest {
        themes: body.themes,
        sources,
        region: body.region,
        requested_by: body.requested_by,
        force_refresh: body.force_refresh,
    };

    let summary = run_collection(
        &state.pool,
        &state.config,
        &state.sources,
        &state.governor,
        &state.cancel,
        &request,
    )
    .await
    .map_err(|error| map_orchestrator_error(req_id.0.clone(), &error))?;

    let data = CollectResult {
        collection_run_id: summary.public_id,
        status: summary.status,
        records_processed: summary.records_processed,
        sources: summary
            .outcomes
            .into_iter()
            .map(|outcome| SourceOutcomeItem {
                source: outcome.source.as_str().to_owned(),
                status: outcome.status.as_str().to_owned(),
                record_count: outcome.record_count,
                error_message: outcome.error_message,
            })
            .collect(),
        errors: summary.errors,
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn map_orchestrator_error(request_id: String, error: &OrchestratorError) -> ApiError {
    match error {
        OrchestratorError::Validation(message) => {
            ApiError::new(request_id, "validation_error", message.clone())
        }
        OrchestratorError::Db(e) => {
            tracing::error!(error = %e, "collection run failed on the database");
            ApiError::new(request_id, "internal_error", "collection run failed")
        }
        OrchestratorError::HttpClient(e) => {
            tracing::error!(error = %e, "failed to build the outbound http client");
            ApiError::new(request_id, "internal_error", "collection run failed")
        }
    }
}
