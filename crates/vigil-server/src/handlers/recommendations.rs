//! Recommendation handlers

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    Json,
};
use serde::Deserialize;

use super::parse_month;
use crate::{current_user, AppError, AppState};
use vigil_core::models::Recommendation;

/// Query parameters for recommendations
#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    /// `YYYY-MM`; defaults to the current month
    pub month: Option<String>,
}

/// GET /api/alerts/recommendations - Stored recommendations for a month
pub async fn list_recommendations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecommendationParams>,
    request: Request,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let month = parse_month(params.month.as_deref())?;

    Ok(Json(state.service.recommendations(user_id, month)?))
}

/// POST /api/alerts/recommendations/generate - Regenerate a month's recommendations
pub async fn generate_recommendations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecommendationParams>,
    request: Request,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let month = parse_month(params.month.as_deref())?;

    Ok(Json(state.service.generate_recommendations(user_id, month)?))
}
