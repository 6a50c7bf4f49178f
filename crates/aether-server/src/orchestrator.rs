//! Realizes plans into persisted agents and tasks.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use aether_core::{Agent, AgentRole, LogLevel, Plan, Task};

use crate::llm::LlmError;
use crate::state::AppState;
use crate::store::StoreError;

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("goal is required")]
    EmptyGoal,

    #[error("planning failed: {0}")]
    Plan(#[from] LlmError),

    #[error("storage failed: {0}")]
    Store(#[from] StoreError),
}

/// Agents and tasks created from one plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Deployment {
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
}

/// Turns goals into a deployed team.
pub struct Orchestrator {
    state: Arc<AppState>,
}

impl Orchestrator {
    /// Create a new Orchestrator.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Plan a goal and deploy the resulting team.
    pub async fn orchestrate(&self, goal: &str) -> Result<Deployment, OrchestrateError> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(OrchestrateError::EmptyGoal);
        }

        info!(goal = %goal, "Planning goal");
        let plan = self.state.planner.plan(goal).await?;
        Ok(self.deploy(plan).await?)
    }

    /// Create every planned agent, then every task addressed to one of them.
    ///
    /// Tasks naming an agent that is not part of the plan are dropped.
    pub async fn deploy(&self, plan: Plan) -> Result<Deployment, StoreError> {
        let mut deployment = Deployment::default();
        let mut by_name: HashMap<String, usize> = HashMap::new();

        for planned in plan.agents {
            let role = AgentRole::from_label(&planned.role);
            let agent = self.state.create_agent(Agent::new(&planned.name, role)).await?;
            self.state
                .append_log(
                    &agent.id,
                    &format!("Agent {} initialized as {}", planned.name, planned.role),
                    LogLevel::Info,
                )
                .await?;
            // First agent with a given name wins.
            by_name
                .entry(planned.name)
                .or_insert(deployment.agents.len());
            deployment.agents.push(agent);
        }

        for planned in plan.tasks {
            let Some(&idx) = by_name.get(&planned.agent_name) else {
                warn!(
                    agent_name = %planned.agent_name,
                    "Planned task names an unknown agent, skipping"
                );
                continue;
            };
            let agent_id = deployment.agents[idx].id.clone();
            let task = self
                .state
                .create_task(Task::new(agent_id, planned.description))
                .await?;
            deployment.tasks.push(task);
        }

        info!(
            agents = deployment.agents.len(),
            tasks = deployment.tasks.len(),
            "Team deployed"
        );
        Ok(deployment)
    }
}
