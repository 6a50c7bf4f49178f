//! Events pushed to dashboard subscribers.

use serde::{Deserialize, Serialize};

use crate::{Agent, LogEntry, Task};

/// A change notification broadcast to every connected dashboard.
///
/// Serialized as `{"type": "<tag>", "<payload>": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    AgentCreated { agent: Agent },
    AgentUpdated { agent: Agent },
    TaskCreated { task: Task },
    TaskUpdated { task: Task },
    LogEntry { log: LogEntry },
}

impl DashboardEvent {
    /// The event's wire tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentCreated { .. } => "agent_created",
            Self::AgentUpdated { .. } => "agent_updated",
            Self::TaskCreated { .. } => "task_created",
            Self::TaskUpdated { .. } => "task_updated",
            Self::LogEntry { .. } => "log_entry",
        }
    }
}
