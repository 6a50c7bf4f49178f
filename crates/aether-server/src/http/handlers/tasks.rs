//! Task handlers.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use aether_core::{AgentId, Task, TaskId, TaskStatus};

use super::{bad_request, json_body, store_error, ApiError};
use crate::http::responses::{CreateTaskRequest, SuccessResponse};
use crate::state::AppState;

/// List tasks, newest first.
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state.store.list_tasks().await.map_err(store_error)?;
    Ok(Json(tasks))
}

/// Create a task and broadcast `task_created`.
///
/// The agent is not checked; the runner decides what to do with tasks whose
/// agent never shows up.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let req = json_body(body)?;
    if req.agent_id.trim().is_empty() || req.description.trim().is_empty() {
        return Err(bad_request("agent_id and description are required"));
    }

    let mut task = Task::new(AgentId::new(req.agent_id), req.description);
    if let Some(id) = req.id.filter(|id| !id.trim().is_empty()) {
        task = task.with_id(TaskId::new(id));
    }
    if let Some(status) = req.status {
        task.status = status
            .parse::<TaskStatus>()
            .map_err(|e| bad_request(e.to_string()))?;
    }

    state.create_task(task).await.map_err(store_error)?;
    Ok(Json(SuccessResponse::ok()))
}
