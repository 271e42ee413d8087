//! Alert handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{parse_month, read_json};
use crate::{current_user, AppError, AppState};
use vigil_core::alerts::{AlertListing, Capabilities, DEFAULT_BACKFILL_MONTHS};
use vigil_core::models::{
    Alert, AlertAuditEntry, AlertQuery, AlertSort, AlertSummary, RecomputeResult,
};

/// Query parameters for listing alerts
#[derive(Debug, Deserialize)]
pub struct ListAlertsParams {
    /// `YYYY-MM`; defaults to the current month
    pub month: Option<String>,
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    /// `true`, `false` (default) or `all`
    pub acknowledged: Option<String>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    /// `field[,asc|desc]`
    pub sort: Option<String>,
}

impl ListAlertsParams {
    fn into_query(self) -> Result<AlertQuery, AppError> {
        let acknowledged = match self.acknowledged.as_deref().map(str::trim) {
            None | Some("false") => Some(false),
            Some("true") => Some(true),
            Some("all") | Some("") => None,
            Some(_) => {
                return Err(AppError::bad_request(
                    "acknowledged must be true, false or all",
                ))
            }
        };

        Ok(AlertQuery {
            month: Some(parse_month(self.month.as_deref())?),
            alert_type: self.alert_type.as_deref().map(str::parse).transpose()?,
            severity: self.severity.as_deref().map(str::parse).transpose()?,
            acknowledged,
            page: self.page,
            size: self.size,
            sort: self
                .sort
                .as_deref()
                .map(AlertSort::parse)
                .unwrap_or_default(),
        })
    }
}

/// GET /api/alerts - One page of alerts plus the caller's summary
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListAlertsParams>,
    request: Request,
) -> Result<Json<AlertListing>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let query = params.into_query()?;

    let listing = state.service.list_with_summary(user_id, &query)?;
    Ok(Json(listing))
}

/// GET /api/alerts/summary - Open alert counts
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AlertSummary>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    Ok(Json(state.service.summary(user_id)?))
}

/// GET /api/alerts/meta - Alert types, severities and stream events
pub async fn get_meta(State(state): State<Arc<AppState>>) -> Json<Capabilities> {
    Json(state.service.capabilities())
}

/// GET /api/alerts/:id - Get one alert
pub async fn get_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Alert>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    Ok(Json(state.service.get(user_id, id)?))
}

/// GET /api/alerts/:id/audit - Audit trail of one alert
pub async fn get_alert_audit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Vec<AlertAuditEntry>>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    Ok(Json(state.service.audit_trail(user_id, id)?))
}

/// POST /api/alerts/:id/acknowledge - Acknowledge an alert
pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Alert>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    Ok(Json(state.service.acknowledge(user_id, id)?))
}

/// POST /api/alerts/:id/dismiss - Dismiss an alert
pub async fn dismiss_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Alert>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    Ok(Json(state.service.dismiss(user_id, id)?))
}

/// Request body for bulk actions
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub ids: Vec<i64>,
}

/// Alerts changed by a bulk action
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub updated: usize,
    pub alerts: Vec<Alert>,
}

/// Largest id list accepted by a bulk action
const MAX_BULK_IDS: usize = 500;

async fn read_bulk(request: Request) -> Result<BulkRequest, AppError> {
    let req: BulkRequest = read_json(request).await?;
    if req.ids.len() > MAX_BULK_IDS {
        return Err(AppError::bad_request("Too many ids"));
    }
    Ok(req)
}

/// POST /api/alerts/acknowledge - Acknowledge several alerts
pub async fn bulk_acknowledge(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<BulkResponse>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let req = read_bulk(request).await?;

    let alerts = state.service.bulk_acknowledge(user_id, &req.ids)?;
    Ok(Json(BulkResponse {
        updated: alerts.len(),
        alerts,
    }))
}

/// POST /api/alerts/dismiss - Dismiss several alerts
pub async fn bulk_dismiss(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<BulkResponse>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let req = read_bulk(request).await?;

    let alerts = state.service.bulk_dismiss(user_id, &req.ids)?;
    Ok(Json(BulkResponse {
        updated: alerts.len(),
        alerts,
    }))
}

/// Query parameters for recompute
#[derive(Debug, Deserialize)]
pub struct RecomputeParams {
    pub month: Option<String>,
}

/// POST /api/alerts/recompute - Recompute one month for the caller
pub async fn recompute_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecomputeParams>,
    request: Request,
) -> Result<Json<RecomputeResult>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let month = parse_month(params.month.as_deref())?;

    let result = state.service.recompute(user_id, month)?;
    info!(user_id, month = %month, generated = result.generated, "Recompute requested");
    Ok(Json(result))
}

/// Query parameters for backfill
#[derive(Debug, Deserialize)]
pub struct BackfillParams {
    pub months: Option<u32>,
}

/// POST /api/alerts/backfill - Recompute the last N months for the caller
pub async fn backfill_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BackfillParams>,
    request: Request,
) -> Result<Json<Vec<RecomputeResult>>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let months = params.months.unwrap_or(DEFAULT_BACKFILL_MONTHS);

    let results = state.service.backfill(user_id, months)?;
    Ok(Json(results))
}

/// Query parameters for merchant normalization
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeParams {
    #[serde(alias = "batch_size")]
    pub batch_size: Option<usize>,
    #[serde(alias = "max_batches")]
    pub max_batches: Option<usize>,
}

pub const DEFAULT_NORMALIZE_BATCH_SIZE: usize = 500;
pub const DEFAULT_NORMALIZE_MAX_BATCHES: usize = 20;
const MAX_NORMALIZE_BATCH_SIZE: usize = 5_000;
const MAX_NORMALIZE_BATCHES: usize = 1_000;

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub updated: usize,
}

/// POST /api/alerts/normalize-merchants - Re-derive stored merchant names
pub async fn normalize_merchants(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NormalizeParams>,
    request: Request,
) -> Result<Json<NormalizeResponse>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let batch_size = params.batch_size.unwrap_or(DEFAULT_NORMALIZE_BATCH_SIZE);
    let max_batches = params.max_batches.unwrap_or(DEFAULT_NORMALIZE_MAX_BATCHES);

    if !(1..=MAX_NORMALIZE_BATCH_SIZE).contains(&batch_size) {
        return Err(AppError::bad_request("batchSize must be between 1 and 5000"));
    }
    if !(1..=MAX_NORMALIZE_BATCHES).contains(&max_batches) {
        return Err(AppError::bad_request("maxBatches must be between 1 and 1000"));
    }

    let updated = state.service.normalize_merchants(batch_size, max_batches)?;
    info!(user_id, updated, "Merchant normalization requested");
    Ok(Json(NormalizeResponse { updated }))
}
