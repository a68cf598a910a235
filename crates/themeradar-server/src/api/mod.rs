mod collect;
mod collection_runs;
mod events;
mod process;
mod themes;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use themeradar_broadcast::BroadcastHub;
use themeradar_collect::{CancelFlag, RateGovernor};
use themeradar_core::{AppConfig, SourcesFile};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{request_id, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub sources: Arc<SourcesFile>,
    pub governor: Arc<RateGovernor>,
    pub hub: Arc<BroadcastHub>,
    pub cancel: CancelFlag,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &themeradar_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/collect", post(collect::trigger_collect))
        .route("/api/v1/process", post(process::trigger_process))
        .route(
            "/api/v1/collection-runs",
            get(collection_runs::list_collection_runs),
        )
        .route("/api/v1/themes", get(themes::list_themes))
        .route(
            "/api/v1/themes/{theme_id}/insights",
            get(themes::list_theme_insights),
        )
        .route("/api/v1/events", get(events::subscribe_events))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match themeradar_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::sync::Arc;

    use themeradar_broadcast::BroadcastHub;
    use themeradar_collect::{BackoffPolicy, CancelFlag, RateGovernor};
    use themeradar_core::{AppConfig, Environment, SourcesFile, TrendsBackendKind};

    use super::AppState;

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".to_owned(),
            env: Environment::Test,
            bind_addr: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
            log_level: "debug".to_owned(),
            sources_path: PathBuf::from("config/sources.yaml"),
            trends_api_key: None,
            forum_api_key: None,
            social_api_key: None,
            launchboard_api_key: None,
            codehost_api_key: None,
            trends_backend: TrendsBackendKind::Fixture,
            db_max_connections: 5,
            db_min_connections: 1,
            db_acquire_timeout_secs: 5,
            collect_request_timeout_secs: 5,
            collect_user_agent: "themeradar-test/0.1".to_owned(),
            collect_max_concurrent_sources: 4,
            collect_max_attempts: 2,
            collect_backoff_base_ms: 0,
            collect_backoff_cap_ms: 0,
            collect_backoff_jitter_ms: 0,
            batch_size: 20,
            batch_max_concurrency: 4,
            score_change_threshold: 5,
            market_size_change_threshold: 500,
            market_size_change_threshold_light: 1000,
            observation_retention_days: 90,
            realtime_window_secs: 300,
            retract_stale_insights: false,
        }
    }

    pub fn test_state(pool: sqlx::PgPool) -> AppState {
        let config = Arc::new(test_config());
        let sources = Arc::new(SourcesFile {
            sources: HashMap::new(),
        });
        let governor = Arc::new(RateGovernor::new(&sources, BackoffPolicy::default()));
        AppState {
            pool,
            config,
            sources,
            governor,
            hub: Arc::new(BroadcastHub::default()),
            cancel: CancelFlag::new(),
        }
    }
}
