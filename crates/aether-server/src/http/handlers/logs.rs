//! Log journal handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use aether_core::{AgentId, LogEntry, LogLevel};

use super::{bad_request, json_body, store_error, ApiError};
use crate::http::responses::{AppendLogRequest, SuccessResponse};
use crate::state::AppState;

/// Append a journal line and broadcast `log_entry`.
pub async fn append_log(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AppendLogRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let req = json_body(body)?;
    if req.agent_id.trim().is_empty() {
        return Err(bad_request("agent_id is required"));
    }
    let level = match req.level {
        Some(level) => level
            .parse::<LogLevel>()
            .map_err(|e| bad_request(e.to_string()))?,
        None => LogLevel::Info,
    };

    state
        .append_log(&AgentId::new(req.agent_id), &req.message, level)
        .await
        .map_err(store_error)?;
    Ok(Json(SuccessResponse::ok()))
}

/// An agent's journal, oldest first.
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let logs = state
        .store
        .list_logs(&AgentId::new(agent_id))
        .await
        .map_err(store_error)?;
    Ok(Json(logs))
}
