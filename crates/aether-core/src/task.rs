//! Task type and its status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, CoreError, TaskId, TaskStatus};

/// A Task is a single unit of work assigned to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,

    /// Agent expected to execute the task. Not guaranteed to resolve.
    pub agent_id: AgentId,

    /// What the agent should do.
    pub description: String,

    /// Current task status.
    #[serde(default)]
    pub status: TaskStatus,

    /// Full text returned by the execution service, once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// When the task was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending Task.
    pub fn new(agent_id: AgentId, description: impl Into<String>) -> Self {
        Self {
            id: TaskId::generate(),
            agent_id,
            description: description.into(),
            status: TaskStatus::Pending,
            result: None,
            created_at: Utc::now(),
        }
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Mark the task as completed with its result.
    pub fn complete(&mut self, result: impl Into<String>) -> Result<(), CoreError> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(result.into());
        Ok(())
    }

    /// Mark the task as failed.
    pub fn fail(&mut self) -> Result<(), CoreError> {
        self.transition(TaskStatus::Failed)
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), CoreError> {
        // Tasks leave pending exactly once.
        if self.status != TaskStatus::Pending {
            return Err(CoreError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}
