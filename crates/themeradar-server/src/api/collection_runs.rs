use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CollectionRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct CollectionRunItem {
    collection_run_id: Uuid,
    requested_by: String,
    region: String,
    requested_sources: Vec<String>,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    records_processed: i32,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

pub(super) async fn list_collection_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CollectionRunsQuery>,
) -> Result<Json<ApiResponse<Vec<CollectionRunItem>>>, ApiError> {
    let rows = themeradar_db::list_collection_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| CollectionRunItem {
            collection_run_id: row.public_id,
            requested_by: row.requested_by,
            region: row.region,
            requested_sources: row.requested_sources,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            records_processed: row.records_processed,
            error_message: row.error_message,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_state;
    use super::super::build_app;
    use super::CollectionRunItem;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[test]
    fn collection_run_item_is_serializable() {
        let item = CollectionRunItem {
            collection_run_id: Uuid::new_v4(),
            requested_by: "api".to_string(),
            region: "US".to_string(),
            requested_sources: vec!["trends".to_string()],
            status: "succeeded".to_string(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            records_processed: 12,
            error_message: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize collection run");
        assert!(json.contains("\"status\":\"succeeded\""));
        assert!(json.contains("\"records_processed\":12"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn runs_are_listed_newest_first(pool: sqlx::PgPool) {
        let first = themeradar_db::create_collection_run(
            &pool,
            "test",
            "US",
            &["trends".to_string()],
        )
        .await
        .expect("first run");
        let second = themeradar_db::create_collection_run(
            &pool,
            "test",
            "US",
            &["forum".to_string()],
        )
        .await
        .expect("second run");

        let app = build_app(test_state(pool));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/collection-runs?limit=10")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 2);
        assert_eq!(
            data[0]["collection_run_id"],
            second.public_id.to_string(),
            "newest run first"
        );
        assert_eq!(data[1]["collection_run_id"], first.public_id.to_string());
        assert_eq!(data[0]["status"], "queued");
    }
}
