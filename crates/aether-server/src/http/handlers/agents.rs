//! Agent handlers.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use aether_core::{Agent, AgentId, AgentRole, AgentStatus};

use super::{bad_request, json_body, store_error, ApiError};
use crate::http::responses::{CreateAgentRequest, SuccessResponse};
use crate::state::AppState;

/// List agents, newest first.
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Agent>>, ApiError> {
    let agents = state.store.list_agents().await.map_err(store_error)?;
    Ok(Json(agents))
}

/// Create an agent and broadcast `agent_created`.
pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateAgentRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let req = json_body(body)?;
    if req.name.trim().is_empty() {
        return Err(bad_request("name is required"));
    }

    let mut agent = Agent::new(req.name, AgentRole::from_label(&req.role));
    if let Some(id) = req.id.filter(|id| !id.trim().is_empty()) {
        agent = agent.with_id(AgentId::new(id));
    }
    if let Some(status) = req.status {
        let status = status
            .parse::<AgentStatus>()
            .map_err(|e| bad_request(e.to_string()))?;
        agent = agent.with_status(status);
    }

    state.create_agent(agent).await.map_err(store_error)?;
    Ok(Json(SuccessResponse::ok()))
}
