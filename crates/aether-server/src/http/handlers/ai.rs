//! Planning, ad-hoc execution and orchestration handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tracing::error;

use aether_core::Plan;

use super::{api_error, bad_request, json_body, store_error, ApiError};
use crate::http::responses::{GoalRequest, RunRequest, RunResponse};
use crate::orchestrator::{Deployment, OrchestrateError, Orchestrator};
use crate::state::AppState;

/// Decompose a goal into a plan without persisting anything.
pub async fn plan(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GoalRequest>, JsonRejection>,
) -> Result<Json<Plan>, ApiError> {
    let req = json_body(body)?;
    let goal = req.goal.trim();
    if goal.is_empty() {
        return Err(bad_request("goal is required"));
    }

    match state.planner.plan(goal).await {
        Ok(plan) => Ok(Json(plan)),
        Err(e) => {
            error!(error = %e, "Planning failed");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to build plan",
            ))
        }
    }
}

/// Run one task through the execution service outside the task runner.
pub async fn run(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ApiError> {
    let req = json_body(body)?;
    let (Some(agent), Some(task)) = (req.agent, req.task) else {
        return Err(bad_request("agent and task are required"));
    };

    match state.executor.run(&agent, &task, &req.context).await {
        Ok(result) => Ok(Json(RunResponse { result })),
        Err(e) => {
            error!(error = %e, task_id = %task.id, "Ad-hoc execution failed");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to execute task",
            ))
        }
    }
}

/// Plan a goal and deploy the team it describes.
pub async fn orchestrate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GoalRequest>, JsonRejection>,
) -> Result<Json<Deployment>, ApiError> {
    let req = json_body(body)?;

    match Orchestrator::new(state).orchestrate(&req.goal).await {
        Ok(deployment) => Ok(Json(deployment)),
        Err(OrchestrateError::EmptyGoal) => Err(bad_request("goal is required")),
        Err(OrchestrateError::Plan(e)) => {
            error!(error = %e, "Planning failed");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to build plan",
            ))
        }
        Err(OrchestrateError::Store(e)) => Err(store_error(e)),
    }
}
