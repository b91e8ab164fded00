use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::{extract_bearer_token, Identity},
    import::ImportResult,
    storage::ExpiringCertification,
    web::{
        error::{ApiError, ApiResult},
        AppState,
    },
};

const DEFAULT_EXPIRY_WINDOW_DAYS: u32 = 30;
const MAX_EXPIRY_WINDOW_DAYS: u32 = 3650;

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub results: ImportResult,
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    #[serde(default = "default_window")]
    pub days: u32,
}

fn default_window() -> u32 {
    DEFAULT_EXPIRY_WINDOW_DAYS
}

#[derive(Debug, Serialize)]
pub struct ExpiringResponse {
    pub from: NaiveDate,
    pub until: NaiveDate,
    pub certifications: Vec<ExpiringCertification>,
}

/// Resolve the caller from the `Authorization` header.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<Identity> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid authorization header format"))?;

    let token = extract_bearer_token(header)?;
    Ok(state.verifier.verify(token).await?)
}

/// Bulk import staff and certifications: POST /import
pub async fn import_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ImportResponse>> {
    let identity = authenticate(&state, &headers).await?;

    let request: ImportRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?;

    let rows = match request.data {
        Some(Value::Array(rows)) => rows,
        _ => {
            return Err(ApiError::bad_request(
                "Invalid data format. Expected an array of records",
            ))
        }
    };

    info!(account_id = %identity.id, rows = rows.len(), "Received import request");

    let results = state.importer.import(&identity.id, rows).await?;
    Ok(Json(ImportResponse {
        success: true,
        results,
    }))
}

/// Certifications expiring within the next `days`: GET /certifications/expiring
pub async fn expiring_certifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<ExpiringQuery>, QueryRejection>,
) -> ApiResult<Json<ExpiringResponse>> {
    let identity = authenticate(&state, &headers).await?;
    let Query(query) =
        query.map_err(|e| ApiError::bad_request(format!("Invalid query: {}", e.body_text())))?;

    if query.days > MAX_EXPIRY_WINDOW_DAYS {
        return Err(ApiError::bad_request(format!(
            "days must be at most {}",
            MAX_EXPIRY_WINDOW_DAYS
        )));
    }

    let from = Utc::now().date_naive();
    let until = from
        .checked_add_days(Days::new(u64::from(query.days)))
        .ok_or_else(|| ApiError::bad_request("days is out of range"))?;

    let certifications = state
        .store
        .expiring_certifications(&identity.id, from, until)
        .await?;

    Ok(Json(ExpiringResponse {
        from,
        until,
        certifications,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Bare OPTIONS requests; CORS headers come from the router's layer.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}
