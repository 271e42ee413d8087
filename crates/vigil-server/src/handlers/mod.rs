//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod alerts;
pub mod recommendations;
pub mod settings;
pub mod stream;

// Re-export all handlers for use in router
pub use alerts::*;
pub use recommendations::*;
pub use settings::*;
pub use stream::*;

use axum::extract::Request;
use serde::de::DeserializeOwned;

use vigil_core::models::YearMonth;

use crate::{AppError, MAX_BODY_SIZE};

/// Read and deserialize a JSON request body
pub(crate) async fn read_json<T: DeserializeOwned>(request: Request) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))
}

/// Parse an optional `YYYY-MM` query value; absent means the current month
pub(crate) fn parse_month(month: Option<&str>) -> Result<YearMonth, AppError> {
    match month.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => Ok(m.parse()?),
        None => Ok(YearMonth::current()),
    }
}
