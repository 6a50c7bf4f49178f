//! HTTP request handlers.

use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use tracing::error;

use crate::http::responses::ErrorResponse;
use crate::store::StoreError;

mod agents;
mod ai;
mod health;
mod logs;
mod tasks;
mod ws;

pub use agents::{create_agent, list_agents};
pub use ai::{orchestrate, plan, run};
pub use health::{health_check, metrics_handler};
pub use logs::{append_log, list_logs};
pub use tasks::{create_task, list_tasks};
pub use ws::ws_handler;

/// Error half of every JSON handler.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, message)
}

/// Unwrap a JSON body, answering malformed ones with a 400.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

pub(crate) fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::Conflict(id) => api_error(StatusCode::CONFLICT, format!("{id} already exists")),
        StoreError::NotFound(id) => api_error(StatusCode::NOT_FOUND, format!("{id} not found")),
        other => {
            error!(error = %other, "Store operation failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}
