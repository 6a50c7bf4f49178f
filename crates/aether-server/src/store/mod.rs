//! Persistence store for agents, tasks and the log journal.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use aether_core::{
    Agent, AgentId, AgentStatus, CoreError, LogEntry, LogLevel, Task, TaskId, TaskStatus,
};

mod sqlite;

pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task join error: {0}")]
    Task(String),

    #[error("storage connection poisoned")]
    Poisoned,

    #[error("record already exists: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid stored data: {0}")]
    InvalidData(#[from] CoreError),
}

/// Record counts grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub agents: HashMap<AgentStatus, u64>,
    pub tasks: HashMap<TaskStatus, u64>,
    pub logs: u64,
}

impl StatusCounts {
    pub fn agents_with(&self, status: AgentStatus) -> u64 {
        self.agents.get(&status).copied().unwrap_or(0)
    }

    pub fn tasks_with(&self, status: TaskStatus) -> u64 {
        self.tasks.get(&status).copied().unwrap_or(0)
    }
}

/// Durable storage of agents, tasks and log entries.
///
/// Ordering contract: agents and tasks are listed newest first; an agent's
/// log entries are listed oldest first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_agent(&self, agent: &Agent) -> StoreResult<()>;

    async fn get_agent(&self, id: &AgentId) -> StoreResult<Option<Agent>>;

    async fn list_agents(&self) -> StoreResult<Vec<Agent>>;

    /// Set an agent's status and return the updated record.
    async fn update_agent_status(&self, id: &AgentId, status: AgentStatus) -> StoreResult<Agent>;

    async fn insert_task(&self, task: &Task) -> StoreResult<()>;

    async fn get_task(&self, id: &TaskId) -> StoreResult<Option<Task>>;

    async fn list_tasks(&self) -> StoreResult<Vec<Task>>;

    /// Persist a task's status and result.
    async fn update_task(&self, task: &Task) -> StoreResult<()>;

    /// Append a journal line and return it with its assigned id and timestamp.
    async fn append_log(
        &self,
        agent_id: &AgentId,
        message: &str,
        level: LogLevel,
    ) -> StoreResult<LogEntry>;

    async fn list_logs(&self, agent_id: &AgentId) -> StoreResult<Vec<LogEntry>>;

    async fn counts(&self) -> StoreResult<StatusCounts>;
}
