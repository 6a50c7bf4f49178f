//! Fakes shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use aether_core::{Agent, AgentId, AgentStatus, LogEntry, LogLevel, Plan, Task, TaskId};

use crate::llm::{ExecutionService, LlmError, PlanService};
use crate::state::AppState;
use crate::store::{SqliteStore, StatusCounts, Store, StoreError, StoreResult};

/// Planner returning a fixed plan, or failing.
pub struct StaticPlanner {
    plan: Option<Plan>,
}

impl StaticPlanner {
    pub fn new(plan: Plan) -> Arc<Self> {
        Arc::new(Self { plan: Some(plan) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { plan: None })
    }
}

#[async_trait]
impl PlanService for StaticPlanner {
    async fn plan(&self, _goal: &str) -> Result<Plan, LlmError> {
        self.plan
            .clone()
            .ok_or_else(|| LlmError::Execution("planner unavailable".to_string()))
    }
}

/// One recorded execution call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub agent_id: AgentId,
    pub task_id: TaskId,
    pub context: String,
}

/// Holds an execution open until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Execution service answering from a script.
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    calls: Mutex<Vec<RecordedCall>>,
    gate: Option<Arc<Gate>>,
    delay: Option<Duration>,
}

impl ScriptedExecutor {
    fn with_fallback(fallback: Result<String, String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
            gate: None,
            delay: None,
        }
    }

    pub fn always_ok(text: &str) -> Arc<Self> {
        Arc::new(Self::with_fallback(Ok(text.to_string())))
    }

    pub fn always_err(message: &str) -> Arc<Self> {
        Arc::new(Self::with_fallback(Err(message.to_string())))
    }

    /// Answers in order, then falls back to `Ok("done")`.
    pub fn scripted(outcomes: Vec<Result<&str, &str>>) -> Arc<Self> {
        let executor = Self::with_fallback(Ok("done".to_string()));
        *executor.script.lock().unwrap() = outcomes
            .into_iter()
            .map(|o| o.map(str::to_string).map_err(str::to_string))
            .collect();
        Arc::new(executor)
    }

    pub fn gated(text: &str) -> (Arc<Self>, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        let mut executor = Self::with_fallback(Ok(text.to_string()));
        executor.gate = Some(gate.clone());
        (Arc::new(executor), gate)
    }

    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        let mut executor = Self::with_fallback(Ok(text.to_string()));
        executor.delay = Some(delay);
        Arc::new(executor)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionService for ScriptedExecutor {
    async fn run(&self, agent: &Agent, task: &Task, context: &str) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            agent_id: agent.id.clone(),
            task_id: task.id.clone(),
            context: context.to_string(),
        });

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        outcome.map_err(LlmError::Execution)
    }
}

/// In-memory store that fails selected writes.
pub struct FaultyStore {
    inner: SqliteStore,
    task_update_failures: AtomicUsize,
    rejected_log_prefix: Option<String>,
}

impl FaultyStore {
    fn with_faults(task_update_failures: usize, rejected_log_prefix: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteStore::open_in_memory().expect("in-memory store"),
            task_update_failures: AtomicUsize::new(task_update_failures),
            rejected_log_prefix,
        })
    }

    /// Fail the next `count` task updates.
    pub fn failing_task_updates(count: usize) -> Arc<Self> {
        Self::with_faults(count, None)
    }

    /// Fail every log append whose message starts with `prefix`.
    pub fn rejecting_logs(prefix: &str) -> Arc<Self> {
        Self::with_faults(0, Some(prefix.to_string()))
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn insert_agent(&self, agent: &Agent) -> StoreResult<()> {
        self.inner.insert_agent(agent).await
    }

    async fn get_agent(&self, id: &AgentId) -> StoreResult<Option<Agent>> {
        self.inner.get_agent(id).await
    }

    async fn list_agents(&self) -> StoreResult<Vec<Agent>> {
        self.inner.list_agents().await
    }

    async fn update_agent_status(&self, id: &AgentId, status: AgentStatus) -> StoreResult<Agent> {
        self.inner.update_agent_status(id, status).await
    }

    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.inner.insert_task(task).await
    }

    async fn get_task(&self, id: &TaskId) -> StoreResult<Option<Task>> {
        self.inner.get_task(id).await
    }

    async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        self.inner.list_tasks().await
    }

    async fn update_task(&self, task: &Task) -> StoreResult<()> {
        let failed = self
            .task_update_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Poisoned);
        }
        self.inner.update_task(task).await
    }

    async fn append_log(
        &self,
        agent_id: &AgentId,
        message: &str,
        level: LogLevel,
    ) -> StoreResult<LogEntry> {
        if let Some(prefix) = &self.rejected_log_prefix {
            if message.starts_with(prefix.as_str()) {
                return Err(StoreError::Poisoned);
            }
        }
        self.inner.append_log(agent_id, message, level).await
    }

    async fn list_logs(&self, agent_id: &AgentId) -> StoreResult<Vec<LogEntry>> {
        self.inner.list_logs(agent_id).await
    }

    async fn counts(&self) -> StoreResult<StatusCounts> {
        self.inner.counts().await
    }
}

/// State over an in-memory store with an empty planner and a succeeding executor.
pub fn test_state() -> Arc<AppState> {
    test_state_with(
        StaticPlanner::new(Plan::default()),
        ScriptedExecutor::always_ok("done"),
    )
}

pub fn test_state_with(
    planner: Arc<StaticPlanner>,
    executor: Arc<ScriptedExecutor>,
) -> Arc<AppState> {
    let store = SqliteStore::open_in_memory().expect("in-memory store");
    AppState::new(Arc::new(store), planner, executor)
}
