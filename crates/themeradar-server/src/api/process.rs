use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use themeradar_analysis::{analyze_themes, run_batch_update, BatchMode};
use themeradar_broadcast::run_realtime_sync;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ProcessBody {
    pub operation: String,
    /// Only meaningful for `batch_update`; defaults to the full pass.
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProcessResult {
    operation: String,
    report: serde_json::Value,
}

pub(super) async fn trigger_process(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ProcessBody>,
) -> Result<Json<ApiResponse<ProcessResult>>, ApiError> {
    let report = match body.operation.as_str() {
        "batch_update" => {
            let mode = match body.mode.as_deref() {
                None | Some("full") => BatchMode::Full,
                Some("light") => BatchMode::Light,
                Some(other) => {
                    return Err(ApiError::new(
                        req_id.0,
                        "validation_error",
                        format!("unknown batch mode '{other}'"),
                    ))
                }
            };
            let report = run_batch_update(&state.pool, &state.config, mode)
                .await
                .map_err(|e| map_analysis_error(req_id.0.clone(), &e))?;
            serde_json::json!({
                "themes_examined": report.themes_examined,
                "themes_updated": report.themes_updated,
                "observations_deleted": report.observations_deleted,
            })
        }
        "analyze_themes" => {
            let report = analyze_themes(&state.pool, &state.config)
                .await
                .map_err(|e| map_analysis_error(req_id.0.clone(), &e))?;
            serde_json::json!({
                "themes_analyzed": report.themes_analyzed,
                "insights_written": report.insights_written,
                "insights_retracted": report.insights_retracted,
            })
        }
        "realtime_sync" => {
            let report = run_realtime_sync(&state.pool, &state.config, &state.hub)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "realtime sync failed");
                    ApiError::new(req_id.0.clone(), "internal_error", "realtime sync failed")
                })?;
            serde_json::json!({
                "changes_detected": report.changes_detected,
                "notifications_written": report.notifications_written,
                "alerts_fired": report.alerts_fired,
                "direct_delivery_misses": report.direct_delivery_misses,
            })
        }
        other => {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                format!("unknown operation '{other}'"),
            ))
        }
    };

    Ok(Json(ApiResponse {
        data: ProcessResult {
            operation: body.operation,
            report,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn map_analysis_error(request_id: String, error: &themeradar_analysis::AnalysisError) -> ApiError {
    tracing::error!(error = %error, "processing operation failed");
    ApiError::new(request_id, "internal_error", "processing operation failed")
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_state;
    use super::super::build_app;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn process_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/process")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_operation_is_a_validation_error(pool: sqlx::PgPool) {
        let app = build_app(test_state(pool));
        let response = app
            .oneshot(process_request(
                serde_json::json!({ "operation": "reticulate_splines" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn batch_update_runs_against_an_empty_database(pool: sqlx::PgPool) {
        let app = build_app(test_state(pool));
        let response = app
            .oneshot(process_request(
                serde_json::json!({ "operation": "batch_update" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["data"]["operation"], "batch_update");
        assert_eq!(json["data"]["report"]["themes_examined"], 0);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn realtime_sync_reports_a_quiet_window(pool: sqlx::PgPool) {
        let app = build_app(test_state(pool));
        let response = app
            .oneshot(process_request(
                serde_json::json!({ "operation": "realtime_sync" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["data"]["report"]["changes_detected"], 0);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_batch_mode_is_rejected(pool: sqlx::PgPool) {
        let app = build_app(test_state(pool));
        let response = app
            .oneshot(process_request(serde_json::json!({
                "operation": "batch_update",
                "mode": "turbo",
            })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
