use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ThemesQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ThemeItem {
    theme_id: i64,
    public_id: Uuid,
    name: String,
    title: String,
    category: String,
    monetization_score: i32,
    market_size: i64,
    competition_level: String,
    technical_difficulty: String,
    estimated_revenue_min: i64,
    estimated_revenue_max: i64,
    data_sources: Vec<String>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct InsightItem {
    insight_type: String,
    title: String,
    description: String,
    confidence: f64,
    impact: String,
    updated_at: DateTime<Utc>,
}

pub(super) async fn list_themes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ThemesQuery>,
) -> Result<Json<ApiResponse<Vec<ThemeItem>>>, ApiError> {
    let rows = themeradar_db::list_themes(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ThemeItem {
            theme_id: row.id,
            public_id: row.public_id,
            name: row.name,
            title: row.title,
            category: row.category,
            monetization_score: row.monetization_score,
            market_size: row.market_size,
            competition_level: row.competition_level,
            technical_difficulty: row.technical_difficulty,
            estimated_revenue_min: row.estimated_revenue_min,
            estimated_revenue_max: row.estimated_revenue_max,
            data_sources: row.data_sources,
            updated_at: row.updated_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_theme_insights(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(theme_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<InsightItem>>>, ApiError> {
    // 404 on an unknown theme rather than an empty list.
    themeradar_db::get_theme(&state.pool, theme_id)
        .await
        .map_err(|e| match e {
            themeradar_db::DbError::NotFound => {
                ApiError::new(req_id.0.clone(), "not_found", "no such theme")
            }
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    let rows = themeradar_db::list_insights_for_theme(&state.pool, theme_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| InsightItem {
            insight_type: row.insight_type,
            title: row.title,
            description: row.description,
            confidence: row.confidence,
            impact: row.impact,
            updated_at: row.updated_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
