//! Shared application state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use aether_core::{Agent, AgentId, AgentStatus, DashboardEvent, LogEntry, LogLevel, Task};

use crate::bus::EventBus;
use crate::llm::{ExecutionService, PlanService};
use crate::store::{Store, StoreResult};

/// Shared application state.
///
/// Every write that dashboards care about goes through the methods here so the
/// matching event is broadcast after the record is persisted.
pub struct AppState {
    /// Durable agents, tasks and logs.
    pub store: Arc<dyn Store>,

    /// Fan-out to WebSocket subscribers and the task runner.
    pub bus: EventBus,

    /// Goal decomposition.
    pub planner: Arc<dyn PlanService>,

    /// Task execution.
    pub executor: Arc<dyn ExecutionService>,

    /// Set while the task runner holds its single execution slot.
    pub in_flight: AtomicBool,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(
        store: Arc<dyn Store>,
        planner: Arc<dyn PlanService>,
        executor: Arc<dyn ExecutionService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            bus: EventBus::default(),
            planner,
            executor,
            in_flight: AtomicBool::new(false),
        })
    }

    /// Whether a task execution is outstanding.
    pub fn is_executing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Persist a new agent and announce it.
    pub async fn create_agent(&self, agent: Agent) -> StoreResult<Agent> {
        self.store.insert_agent(&agent).await?;
        debug!(agent_id = %agent.id, name = %agent.name, role = %agent.role, "Agent created");
        self.bus.publish(DashboardEvent::AgentCreated {
            agent: agent.clone(),
        });
        Ok(agent)
    }

    /// Persist a new task and announce it.
    pub async fn create_task(&self, task: Task) -> StoreResult<Task> {
        self.store.insert_task(&task).await?;
        debug!(task_id = %task.id, agent_id = %task.agent_id, "Task created");
        self.bus.publish(DashboardEvent::TaskCreated { task: task.clone() });
        Ok(task)
    }

    /// Append a journal line and announce it.
    pub async fn append_log(
        &self,
        agent_id: &AgentId,
        message: &str,
        level: LogLevel,
    ) -> StoreResult<LogEntry> {
        let log = self.store.append_log(agent_id, message, level).await?;
        self.bus.publish(DashboardEvent::LogEntry { log: log.clone() });
        Ok(log)
    }

    /// Persist an agent status change and announce it.
    pub async fn set_agent_status(&self, id: &AgentId, status: AgentStatus) -> StoreResult<Agent> {
        let agent = self.store.update_agent_status(id, status).await?;
        self.bus.publish(DashboardEvent::AgentUpdated {
            agent: agent.clone(),
        });
        Ok(agent)
    }

    /// Persist a task's status/result and announce it.
    pub async fn save_task(&self, task: &Task) -> StoreResult<()> {
        self.store.update_task(task).await?;
        self.bus.publish(DashboardEvent::TaskUpdated { task: task.clone() });
        Ok(())
    }
}
