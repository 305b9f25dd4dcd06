//! REST API module.
//!
//! `public` serves the read-only site; `admin` serves the console behind the admin key.

mod admin;
mod public;

pub use admin::*;
pub use public::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, AppErrorWithRevision};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    error_with_details(err, revision_id, None)
}

/// Create an error API response carrying extra context in `error.details`.
pub fn error_with_details<T: Serialize>(
    err: AppError,
    revision_id: i64,
    details: Option<serde_json::Value>,
) -> ApiResult<T> {
    if err.is_external_failure() {
        tracing::error!("Request failed: {}", err);
    }
    Err(AppErrorWithRevision {
        error: err,
        revision_id,
        details,
    })
}

/// Current store revision for the envelope; 0 when the store cannot be reached.
pub async fn revision(state: &AppState) -> i64 {
    state.store.revision().await.unwrap_or(0)
}

/// Wrap a handler outcome in the envelope, reading the revision after the work is done.
pub async fn respond<T: Serialize>(state: &AppState, outcome: Result<T, AppError>) -> ApiResult<T> {
    let revision_id = revision(state).await;
    match outcome {
        Ok(data) => success(data, revision_id),
        Err(e) => error(e, revision_id),
    }
}
