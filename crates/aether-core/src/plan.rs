//! Plans proposed by the planning service.

use serde::{Deserialize, Serialize};

/// A team of agents and their first tasks, as proposed for a goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub agents: Vec<PlannedAgent>,

    #[serde(default)]
    pub tasks: Vec<PlannedTask>,
}

impl Plan {
    /// True when the planner proposed nothing.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.tasks.is_empty()
    }
}

/// An agent proposed by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAgent {
    pub name: String,

    /// Free-form role label; mapped onto [`crate::AgentRole`] when realized.
    pub role: String,
}

/// A task proposed by the planner, addressed to an agent by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub agent_name: String,
    pub description: String,
}
