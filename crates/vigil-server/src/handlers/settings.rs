//! Alert settings, merchant whitelist and muted category handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::read_json;
use crate::{current_user, AppError, AppState, SuccessResponse};
use vigil_core::models::{AlertSettings, AlertThresholds, MutedCategory, WhitelistEntry};

/// GET /api/alerts/settings - The caller's settings (created with defaults on first read)
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AlertSettings>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    Ok(Json(state.service.settings(user_id)?))
}

/// PUT /api/alerts/settings - Replace the caller's thresholds
///
/// Omitted fields take their default values.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AlertSettings>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let thresholds: AlertThresholds = read_json(request).await?;

    Ok(Json(state.service.update_settings(user_id, &thresholds)?))
}

/// Request body for whitelisting a merchant
#[derive(Debug, Deserialize)]
pub struct WhitelistRequest {
    pub merchant: String,
}

/// GET /api/alerts/whitelist - List whitelisted merchants
pub async fn list_whitelist(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<WhitelistEntry>>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    Ok(Json(state.service.list_whitelist(user_id)?))
}

/// POST /api/alerts/whitelist - Whitelist a merchant
pub async fn add_whitelist(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<WhitelistEntry>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let req: WhitelistRequest = read_json(request).await?;

    Ok(Json(state.service.add_whitelist(user_id, &req.merchant)?))
}

/// DELETE /api/alerts/whitelist/:merchant - Remove a merchant from the whitelist
pub async fn remove_whitelist(
    State(state): State<Arc<AppState>>,
    Path(merchant): Path<String>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_id = current_user(&state, request.headers())?;

    if !state.service.remove_whitelist(user_id, &merchant)? {
        return Err(AppError::not_found("Merchant is not whitelisted"));
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// Request body for muting a category
#[derive(Debug, Deserialize)]
pub struct MuteRequest {
    pub category: String,
    /// Last muted day; omitted mutes indefinitely
    pub mute_until: Option<NaiveDate>,
}

/// GET /api/alerts/muted - List muted categories
pub async fn list_muted(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<MutedCategory>>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    Ok(Json(state.service.list_muted(user_id)?))
}

/// POST /api/alerts/muted - Mute a category
pub async fn mute_category(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<MutedCategory>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let req: MuteRequest = read_json(request).await?;

    Ok(Json(state.service.mute_category(
        user_id,
        &req.category,
        req.mute_until,
    )?))
}

/// DELETE /api/alerts/muted/:category - Unmute a category
pub async fn unmute_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_id = current_user(&state, request.headers())?;

    if !state.service.unmute_category(user_id, &category)? {
        return Err(AppError::not_found("Category is not muted"));
    }
    Ok(Json(SuccessResponse { success: true }))
}
