//! Task runner - executes pending tasks one at a time.
//!
//! The runner is level-triggered: every dashboard event (and every finished
//! execution) re-arms a timer, and when the timer fires a tick is spawned. A
//! tick takes the single in-flight slot, picks the first pending task in store
//! order, runs it through the execution service and journals the outcome. Ticks
//! that find the slot taken do nothing. Once the execution service has been
//! called for a task, that task is never selected again, even when writing its
//! outcome fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use aether_core::log::build_context;
use aether_core::{Agent, AgentId, AgentStatus, CoreError, LogLevel, Task, TaskId, TaskStatus};

use crate::config::{Config, MissingAgentPolicy};
use crate::llm::LlmError;
use crate::state::AppState;
use crate::store::StoreError;

/// Characters of the result quoted in the completion log line.
pub const RESULT_PREVIEW_CHARS: usize = 100;

/// Runner errors. Execution failures are not errors; they fail the task.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Runner settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Delay between the last state change and the next tick.
    pub poll_delay: Duration,

    /// Context window in characters; 0 means unbounded.
    pub context_max_chars: usize,

    /// Upper bound on one execution call.
    pub execution_timeout: Option<Duration>,

    pub missing_agent_policy: MissingAgentPolicy,
}

impl RunnerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_delay: config.poll_delay(),
            context_max_chars: config.context_max_chars,
            execution_timeout: config.execution_timeout(),
            missing_agent_policy: config.missing_agent_policy,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another execution holds the slot.
    Busy,
    /// No pending task.
    Idle,
    /// The first pending task's agent does not exist; nothing changed.
    AgentMissing { task_id: TaskId },
    Completed { task_id: TaskId },
    Failed { task_id: TaskId },
}

impl TickOutcome {
    /// True when a task left `pending` during the tick.
    pub fn transitioned(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Holds the single execution slot; releases it on drop.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Journal line for a successful execution.
pub fn completion_message(result: &str) -> String {
    let preview: String = result.chars().take(RESULT_PREVIEW_CHARS).collect();
    format!("Task Completed: {preview}...")
}

/// Journal line for a failed execution.
pub fn failure_message(error: &dyn std::fmt::Display) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        "Task Failed: Unknown error".to_string()
    } else {
        format!("Task Failed: {message}")
    }
}

/// Serial executor of pending tasks.
pub struct TaskRunner {
    state: Arc<AppState>,
    config: RunnerConfig,
    rearm: Notify,
    /// Terminal task states whose write failed; saved before the next selection.
    unsaved: Mutex<HashMap<TaskId, Task>>,
}

impl TaskRunner {
    /// Create a new TaskRunner.
    pub fn new(state: Arc<AppState>, config: RunnerConfig) -> Arc<Self> {
        Arc::new(Self {
            state,
            config,
            rearm: Notify::new(),
            unsaved: Mutex::new(HashMap::new()),
        })
    }

    /// Spawn the polling loop.
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(shutdown))
    }

    /// Poll until `shutdown` is cancelled.
    ///
    /// Returns only after every spawned tick has finished, so an execution in
    /// flight at shutdown runs to completion and is journaled. A tick that
    /// fails on a store error re-arms the timer like a transition does; parked
    /// outcome writes are retried one `poll_delay` later.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let delay = self.config.poll_delay;
        let mut events = self.state.bus.subscribe();
        let ticks = TaskTracker::new();
        // Armed at startup so tasks left pending by a previous process run.
        let mut deadline = Some(Instant::now() + delay);

        info!(
            poll_delay_ms = delay.as_millis() as u64,
            policy = ?self.config.missing_agent_policy,
            "Task runner started"
        );

        loop {
            let fire = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = events.recv() => match received {
                    Ok(_) => deadline = Some(Instant::now() + delay),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Runner lagged behind events");
                        deadline = Some(Instant::now() + delay);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = self.rearm.notified() => deadline = Some(Instant::now() + delay),
                _ = fire => {
                    deadline = None;
                    let runner = Arc::clone(&self);
                    ticks.spawn(async move {
                        match runner.tick().await {
                            Ok(outcome) => debug!(?outcome, "Tick finished"),
                            Err(e) => error!(error = %e, "Tick failed"),
                        }
                    });
                }
            }
        }

        ticks.close();
        if !ticks.is_empty() {
            info!(outstanding = ticks.len(), "Waiting for in-flight tick");
        }
        ticks.wait().await;
        info!("Task runner stopped");
    }

    /// Evaluate the task list once.
    pub async fn tick(&self) -> Result<TickOutcome, RunnerError> {
        let outcome = {
            let Some(_guard) = InFlightGuard::try_acquire(&self.state.in_flight) else {
                debug!("Execution in flight, skipping tick");
                return Ok(TickOutcome::Busy);
            };
            self.select_and_execute().await
        };

        // Real work and store failures both count as a state change.
        let rearm = match &outcome {
            Ok(o) => o.transitioned(),
            Err(_) => true,
        };
        if rearm {
            self.rearm.notify_one();
        }
        outcome
    }

    async fn select_and_execute(&self) -> Result<TickOutcome, RunnerError> {
        // A task whose outcome is still parked reads as pending in the store.
        self.flush_unsaved().await?;

        let tasks = self.state.store.list_tasks().await?;
        let Some(task) = tasks.into_iter().find(|t| t.status == TaskStatus::Pending) else {
            return Ok(TickOutcome::Idle);
        };

        match self.state.store.get_agent(&task.agent_id).await? {
            Some(agent) => self.execute(task, agent).await,
            None => self.handle_missing_agent(task).await,
        }
    }

    async fn handle_missing_agent(&self, mut task: Task) -> Result<TickOutcome, RunnerError> {
        match self.config.missing_agent_policy {
            MissingAgentPolicy::Skip => {
                // Head of line: later pending tasks wait behind this one.
                warn!(
                    task_id = %task.id,
                    agent_id = %task.agent_id,
                    "Pending task references an unknown agent, leaving it pending"
                );
                Ok(TickOutcome::AgentMissing { task_id: task.id })
            }
            MissingAgentPolicy::FailFast => {
                warn!(
                    task_id = %task.id,
                    agent_id = %task.agent_id,
                    "Pending task references an unknown agent, failing it"
                );
                self.state
                    .append_log(
                        &AgentId::system(),
                        &format!("Task Failed: agent {} not found", task.agent_id),
                        LogLevel::Error,
                    )
                    .await?;
                task.fail()?;
                self.persist_outcome(&task).await?;
                Ok(TickOutcome::Failed { task_id: task.id })
            }
        }
    }

    async fn execute(&self, mut task: Task, agent: Agent) -> Result<TickOutcome, RunnerError> {
        let started = Instant::now();
        info!(
            task_id = %task.id,
            agent_id = %agent.id,
            agent = %agent.name,
            "Starting task"
        );

        let history = self.state.store.list_logs(&agent.id).await?;
        let context = build_context(&history, self.config.context_max_chars);

        self.state
            .append_log(
                &agent.id,
                &format!("Starting task: {}", task.description),
                LogLevel::Info,
            )
            .await?;
        let agent = self
            .state
            .set_agent_status(&agent.id, AgentStatus::Working)
            .await?;

        let result = self.call_executor(&agent, &task, &context).await;
        let succeeded = result.is_ok();
        let (journal, level, agent_status) = match &result {
            Ok(text) => (completion_message(text), LogLevel::Success, AgentStatus::Idle),
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Task failed");
                (failure_message(e), LogLevel::Error, AgentStatus::Error)
            }
        };
        let transition = match result {
            Ok(text) => task.complete(text),
            Err(_) => task.fail(),
        };

        // Past this point every write is attempted; the first failure is returned.
        let mut first_error: Option<RunnerError> = None;
        if let Err(e) = self.state.append_log(&agent.id, &journal, level).await {
            first_error.get_or_insert(e.into());
        }
        match transition {
            Ok(()) => {
                if let Err(e) = self.persist_outcome(&task).await {
                    first_error.get_or_insert(e);
                }
            }
            Err(e) => {
                first_error.get_or_insert(e.into());
            }
        }
        if let Err(e) = self.state.set_agent_status(&agent.id, agent_status).await {
            first_error.get_or_insert(e.into());
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        if succeeded {
            info!(
                task_id = %task.id,
                duration_ms = started.elapsed().as_millis() as u64,
                "Task completed"
            );
            Ok(TickOutcome::Completed { task_id: task.id })
        } else {
            Ok(TickOutcome::Failed { task_id: task.id })
        }
    }

    async fn call_executor(
        &self,
        agent: &Agent,
        task: &Task,
        context: &str,
    ) -> Result<String, LlmError> {
        let call = self.state.executor.run(agent, task, context);
        match self.config.execution_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(LlmError::Timeout(limit))),
            None => call.await,
        }
    }

    /// Save a terminal task state, parking it for retry if the write fails.
    async fn persist_outcome(&self, task: &Task) -> Result<(), RunnerError> {
        if let Err(e) = self.state.save_task(task).await {
            warn!(task_id = %task.id, error = %e, "Failed to persist task outcome, parking it");
            self.unsaved.lock().await.insert(task.id.clone(), task.clone());
            return Err(e.into());
        }
        Ok(())
    }

    async fn flush_unsaved(&self) -> Result<(), RunnerError> {
        let mut unsaved = self.unsaved.lock().await;
        while let Some(task) = unsaved.values().next().cloned() {
            self.state.save_task(&task).await?;
            unsaved.remove(&task.id);
            debug!(task_id = %task.id, "Parked task outcome persisted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aether_core::{AgentRole, DashboardEvent, Plan};

    use super::*;
    use crate::testing::{
        test_state, test_state_with, FaultyStore, ScriptedExecutor, StaticPlanner,
    };

    fn fast_config() -> RunnerConfig {
        RunnerConfig {
            poll_delay: Duration::from_millis(20),
            ..RunnerConfig::default()
        }
    }

    async fn seed_agent(state: &AppState, name: &str) -> Agent {
        state
            .create_agent(Agent::new(name, AgentRole::Coder))
            .await
            .expect("create agent")
    }

    async fn seed_task(state: &AppState, agent_id: &AgentId, description: &str) -> Task {
        state
            .create_task(Task::new(agent_id.clone(), description))
            .await
            .expect("create task")
    }

    async fn messages(state: &AppState, agent_id: &AgentId) -> Vec<String> {
        state
            .store
            .list_logs(agent_id)
            .await
            .expect("logs")
            .into_iter()
            .map(|l| l.message)
            .collect()
    }

    async fn task_status(state: &AppState, id: &TaskId) -> TaskStatus {
        state
            .store
            .get_task(id)
            .await
            .expect("get task")
            .expect("task exists")
            .status
    }

    async fn wait_for_status(state: &AppState, id: &TaskId, status: TaskStatus) {
        let reached = tokio::time::timeout(Duration::from_secs(5), async {
            while task_status(state, id).await != status {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(reached.is_ok(), "task {id} never reached {status}");
    }

    #[test]
    fn completion_message_quotes_first_hundred_chars() {
        assert_eq!(completion_message("R"), "Task Completed: R...");

        let long: String = "é".repeat(150);
        let message = completion_message(&long);
        assert_eq!(message, format!("Task Completed: {}...", "é".repeat(100)));
    }

    #[test]
    fn failure_message_defaults_to_unknown_error() {
        assert_eq!(failure_message(&"boom"), "Task Failed: boom");
        assert_eq!(failure_message(&""), "Task Failed: Unknown error");
    }

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = InFlightGuard::try_acquire(&flag).expect("first acquire");
        assert!(InFlightGuard::try_acquire(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(InFlightGuard::try_acquire(&flag).is_some());
    }

    #[tokio::test]
    async fn idle_when_nothing_is_pending() {
        let state = test_state();
        let runner = TaskRunner::new(state.clone(), fast_config());
        assert_eq!(runner.tick().await.unwrap(), TickOutcome::Idle);
        assert!(!state.is_executing());
    }

    #[tokio::test]
    async fn context_is_prior_agent_messages_in_order() {
        let executor = ScriptedExecutor::always_ok("R");
        let state = test_state_with(StaticPlanner::new(Plan::default()), executor.clone());
        let agent = seed_agent(&state, "Ada").await;
        let other = seed_agent(&state, "Bob").await;
        state
            .append_log(&agent.id, "m1", LogLevel::Info)
            .await
            .unwrap();
        state
            .append_log(&other.id, "not mine", LogLevel::Info)
            .await
            .unwrap();
        state
            .append_log(&agent.id, "m2", LogLevel::Info)
            .await
            .unwrap();
        let task = seed_task(&state, &agent.id, "write code").await;

        let runner = TaskRunner::new(state.clone(), fast_config());
        runner.tick().await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].task_id, task.id);
        assert_eq!(calls[0].agent_id, agent.id);
        assert_eq!(calls[0].context, "m1\nm2");
    }

    #[tokio::test]
    async fn success_journals_preview_and_completes_task() {
        let executor = ScriptedExecutor::always_ok("R");
        let state = test_state_with(StaticPlanner::new(Plan::default()), executor);
        let agent = seed_agent(&state, "Ada").await;
        let task = seed_task(&state, &agent.id, "write code").await;

        let runner = TaskRunner::new(state.clone(), fast_config());
        let outcome = runner.tick().await.unwrap();

        assert_eq!(
            outcome,
            TickOutcome::Completed {
                task_id: task.id.clone()
            }
        );
        assert_eq!(
            messages(&state, &agent.id).await,
            vec!["Starting task: write code", "Task Completed: R..."]
        );

        let stored = state.store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.result.as_deref(), Some("R"));

        let agent = state.store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(!state.is_executing());
    }

    #[tokio::test]
    async fn failure_journals_error_and_fails_task() {
        let executor = ScriptedExecutor::always_err("boom");
        let state = test_state_with(StaticPlanner::new(Plan::default()), executor);
        let agent = seed_agent(&state, "Ada").await;
        let task = seed_task(&state, &agent.id, "write code").await;

        let runner = TaskRunner::new(state.clone(), fast_config());
        let outcome = runner.tick().await.unwrap();

        assert_eq!(
            outcome,
            TickOutcome::Failed {
                task_id: task.id.clone()
            }
        );
        let logs = state.store.list_logs(&agent.id).await.unwrap();
        let last = logs.last().unwrap();
        assert_eq!(last.message, "Task Failed: boom");
        assert_eq!(last.level, LogLevel::Error);
        assert_eq!(task_status(&state, &task.id).await, TaskStatus::Failed);

        let agent = state.store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(agent.status, AgentStatus::Error);
        assert!(!state.is_executing());
    }

    #[tokio::test]
    async fn failed_task_is_never_retried() {
        let executor = ScriptedExecutor::scripted(vec![Err("boom")]);
        let state = test_state_with(StaticPlanner::new(Plan::default()), executor.clone());
        let agent = seed_agent(&state, "Ada").await;
        seed_task(&state, &agent.id, "flaky").await;

        let runner = TaskRunner::new(state.clone(), fast_config());
        assert!(matches!(
            runner.tick().await.unwrap(),
            TickOutcome::Failed { .. }
        ));
        assert_eq!(runner.tick().await.unwrap(), TickOutcome::Idle);
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn one_task_per_tick_newest_first() {
        let state = test_state();
        let agent = seed_agent(&state, "Ada").await;
        let older = seed_task(&state, &agent.id, "older").await;
        let newer = seed_task(&state, &agent.id, "newer").await;

        let runner = TaskRunner::new(state.clone(), fast_config());
        let outcome = runner.tick().await.unwrap();

        assert_eq!(
            outcome,
            TickOutcome::Completed {
                task_id: newer.id.clone()
            }
        );
        assert_eq!(task_status(&state, &newer.id).await, TaskStatus::Completed);
        assert_eq!(task_status(&state, &older.id).await, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn missing_agent_task_is_skipped_and_stays_pending() {
        let executor = ScriptedExecutor::always_ok("R");
        let state = test_state_with(StaticPlanner::new(Plan::default()), executor.clone());
        let agent = seed_agent(&state, "Ada").await;
        let behind = seed_task(&state, &agent.id, "behind").await;
        let orphan = seed_task(&state, &AgentId::new("ghost"), "orphan").await;

        let runner = TaskRunner::new(state.clone(), fast_config());
        for _ in 0..3 {
            assert_eq!(
                runner.tick().await.unwrap(),
                TickOutcome::AgentMissing {
                    task_id: orphan.id.clone()
                }
            );
        }

        assert_eq!(task_status(&state, &orphan.id).await, TaskStatus::Pending);
        // The orphan blocks the queue head.
        assert_eq!(task_status(&state, &behind.id).await, TaskStatus::Pending);
        assert!(executor.calls().is_empty());
        assert!(messages(&state, &AgentId::new("ghost")).await.is_empty());
    }

    #[tokio::test]
    async fn fail_fast_policy_fails_orphans_and_unblocks_queue() {
        let state = test_state();
        let agent = seed_agent(&state, "Ada").await;
        let behind = seed_task(&state, &agent.id, "behind").await;
        let orphan = seed_task(&state, &AgentId::new("ghost"), "orphan").await;

        let config = RunnerConfig {
            missing_agent_policy: MissingAgentPolicy::FailFast,
            ..fast_config()
        };
        let runner = TaskRunner::new(state.clone(), config);

        assert_eq!(
            runner.tick().await.unwrap(),
            TickOutcome::Failed {
                task_id: orphan.id.clone()
            }
        );
        assert_eq!(task_status(&state, &orphan.id).await, TaskStatus::Failed);
        assert_eq!(
            messages(&state, &AgentId::system()).await,
            vec!["Task Failed: agent ghost not found"]
        );

        assert_eq!(
            runner.tick().await.unwrap(),
            TickOutcome::Completed {
                task_id: behind.id.clone()
            }
        );
    }

    #[tokio::test]
    async fn second_tick_observes_guard_while_first_is_in_flight() {
        let (executor, gate) = ScriptedExecutor::gated("R");
        let state = test_state_with(StaticPlanner::new(Plan::default()), executor.clone());
        let agent = seed_agent(&state, "Ada").await;
        let task = seed_task(&state, &agent.id, "slow work").await;

        let runner = TaskRunner::new(state.clone(), fast_config());
        let first = tokio::spawn({
            let runner = Arc::clone(&runner);
            async move { runner.tick().await }
        });

        gate.entered.notified().await;
        assert!(state.is_executing());

        assert_eq!(runner.tick().await.unwrap(), TickOutcome::Busy);
        assert_eq!(executor.calls().len(), 1);
        assert_eq!(task_status(&state, &task.id).await, TaskStatus::Pending);
        let agent_now = state.store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(agent_now.status, AgentStatus::Working);

        gate.release.notify_one();
        let first = first.await.expect("join").expect("tick");
        assert_eq!(first, TickOutcome::Completed { task_id: task.id });
        assert!(!state.is_executing());
    }

    #[tokio::test]
    async fn execution_timeout_fails_task() {
        let executor = ScriptedExecutor::slow("late", Duration::from_secs(30));
        let state = test_state_with(StaticPlanner::new(Plan::default()), executor);
        let agent = seed_agent(&state, "Ada").await;
        let task = seed_task(&state, &agent.id, "hang").await;

        let config = RunnerConfig {
            execution_timeout: Some(Duration::from_millis(50)),
            ..fast_config()
        };
        let runner = TaskRunner::new(state.clone(), config);

        assert_eq!(
            runner.tick().await.unwrap(),
            TickOutcome::Failed {
                task_id: task.id.clone()
            }
        );
        assert_eq!(
            messages(&state, &agent.id).await.last().unwrap(),
            "Task Failed: execution timed out after 50ms"
        );
        assert!(!state.is_executing());
    }

    #[tokio::test]
    async fn context_window_limits_history() {
        let executor = ScriptedExecutor::always_ok("R");
        let state = test_state_with(StaticPlanner::new(Plan::default()), executor.clone());
        let agent = seed_agent(&state, "Ada").await;
        for message in ["aaaa", "bbbb", "cccc"] {
            state
                .append_log(&agent.id, message, LogLevel::Info)
                .await
                .unwrap();
        }
        seed_task(&state, &agent.id, "summarize").await;

        let config = RunnerConfig {
            context_max_chars: 9,
            ..fast_config()
        };
        TaskRunner::new(state.clone(), config).tick().await.unwrap();

        assert_eq!(executor.calls()[0].context, "bbbb\ncccc");
    }

    #[tokio::test]
    async fn transitions_are_broadcast() {
        let state = test_state();
        let agent = seed_agent(&state, "Ada").await;
        seed_task(&state, &agent.id, "write code").await;
        let mut events = state.bus.subscribe();

        TaskRunner::new(state.clone(), fast_config())
            .tick()
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let DashboardEvent::TaskUpdated { task } = &event {
                assert_eq!(task.status, TaskStatus::Completed);
            }
            kinds.push(event.kind());
        }
        assert_eq!(
            kinds,
            vec![
                "log_entry",
                "agent_updated",
                "log_entry",
                "task_updated",
                "agent_updated"
            ]
        );
    }

    #[tokio::test]
    async fn polling_loop_drains_pending_tasks_serially() {
        let state = test_state();
        let agent = seed_agent(&state, "Ada").await;
        let first = seed_task(&state, &agent.id, "one").await;
        let second = seed_task(&state, &agent.id, "two").await;

        // Left pending before startup; the initial arm picks them up.
        let runner = TaskRunner::new(state.clone(), fast_config());
        let shutdown = CancellationToken::new();
        let handle = runner.spawn(shutdown.clone());

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let tasks = state.store.list_tasks().await.expect("tasks");
                if tasks.iter().all(|t| t.status == TaskStatus::Completed) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(drained.is_ok(), "runner did not drain the task list");

        shutdown.cancel();
        handle.await.expect("runner join");

        let logs = messages(&state, &agent.id).await;
        let starts: Vec<&String> = logs
            .iter()
            .filter(|m| m.starts_with("Starting task"))
            .collect();
        assert_eq!(starts, vec!["Starting task: two", "Starting task: one"]);
        assert_eq!(task_status(&state, &first.id).await, TaskStatus::Completed);
        assert_eq!(task_status(&state, &second.id).await, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn failed_outcome_write_is_retried_without_rerunning_task() {
        let executor = ScriptedExecutor::always_ok("R");
        let state = AppState::new(
            FaultyStore::failing_task_updates(1),
            StaticPlanner::new(Plan::default()),
            executor.clone(),
        );
        let agent = seed_agent(&state, "Ada").await;
        let task = seed_task(&state, &agent.id, "work").await;
        let runner = TaskRunner::new(state.clone(), fast_config());

        assert!(matches!(runner.tick().await, Err(RunnerError::Store(_))));
        assert!(!state.is_executing());
        let agent_now = state.store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(agent_now.status, AgentStatus::Idle);

        assert_eq!(runner.tick().await.unwrap(), TickOutcome::Idle);
        assert_eq!(executor.calls().len(), 1);

        let stored = state.store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.result.as_deref(), Some("R"));
        assert_eq!(
            messages(&state, &agent.id).await,
            vec!["Starting task: work", "Task Completed: R..."]
        );
    }

    #[tokio::test]
    async fn failed_journal_write_still_persists_outcome() {
        let executor = ScriptedExecutor::always_err("boom");
        let state = AppState::new(
            FaultyStore::rejecting_logs("Task Failed"),
            StaticPlanner::new(Plan::default()),
            executor.clone(),
        );
        let agent = seed_agent(&state, "Ada").await;
        let task = seed_task(&state, &agent.id, "work").await;
        let runner = TaskRunner::new(state.clone(), fast_config());

        assert!(runner.tick().await.is_err());
        assert_eq!(task_status(&state, &task.id).await, TaskStatus::Failed);
        let agent_now = state.store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(agent_now.status, AgentStatus::Error);

        assert_eq!(runner.tick().await.unwrap(), TickOutcome::Idle);
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_tick_rearms_and_idle_tick_does_not() {
        let state = test_state();
        let runner = TaskRunner::new(state.clone(), fast_config());
        assert_eq!(runner.tick().await.unwrap(), TickOutcome::Idle);
        let idle_rearm =
            tokio::time::timeout(Duration::from_millis(20), runner.rearm.notified()).await;
        assert!(idle_rearm.is_err());

        let state = AppState::new(
            FaultyStore::failing_task_updates(1),
            StaticPlanner::new(Plan::default()),
            ScriptedExecutor::always_ok("R"),
        );
        let agent = seed_agent(&state, "Ada").await;
        seed_task(&state, &agent.id, "work").await;
        let runner = TaskRunner::new(state.clone(), fast_config());
        assert!(runner.tick().await.is_err());
        let failed_rearm =
            tokio::time::timeout(Duration::from_millis(20), runner.rearm.notified()).await;
        assert!(failed_rearm.is_ok());
    }

    #[tokio::test]
    async fn polling_loop_retries_parked_outcome() {
        let executor = ScriptedExecutor::always_ok("R");
        let state = AppState::new(
            FaultyStore::failing_task_updates(1),
            StaticPlanner::new(Plan::default()),
            executor.clone(),
        );
        let agent = seed_agent(&state, "Ada").await;
        let task = seed_task(&state, &agent.id, "work").await;

        let shutdown = CancellationToken::new();
        let handle = TaskRunner::new(state.clone(), fast_config()).spawn(shutdown.clone());

        wait_for_status(&state, &task.id, TaskStatus::Completed).await;
        shutdown.cancel();
        handle.await.expect("runner join");
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_execution() {
        let (executor, gate) = ScriptedExecutor::gated("R");
        let state = test_state_with(StaticPlanner::new(Plan::default()), executor);
        let agent = seed_agent(&state, "Ada").await;
        let task = seed_task(&state, &agent.id, "slow work").await;

        let shutdown = CancellationToken::new();
        let mut handle = TaskRunner::new(state.clone(), fast_config()).spawn(shutdown.clone());

        gate.entered.notified().await;
        shutdown.cancel();
        let early = tokio::time::timeout(Duration::from_millis(100), &mut handle).await;
        assert!(early.is_err(), "runner stopped with an execution in flight");
        assert!(state.is_executing());

        gate.release.notify_one();
        handle.await.expect("runner join");

        assert!(!state.is_executing());
        assert_eq!(task_status(&state, &task.id).await, TaskStatus::Completed);
        let agent_now = state.store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(agent_now.status, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn polling_loop_wakes_on_events_after_going_idle() {
        let state = test_state();
        let shutdown = CancellationToken::new();
        let handle = TaskRunner::new(state.clone(), fast_config()).spawn(shutdown.clone());

        // Let the startup tick find nothing.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let agent = seed_agent(&state, "Ada").await;
        let task = seed_task(&state, &agent.id, "late arrival").await;
        wait_for_status(&state, &task.id, TaskStatus::Completed).await;

        shutdown.cancel();
        handle.await.expect("runner join");
    }

    #[tokio::test]
    async fn orphan_task_runs_once_its_agent_appears() {
        let executor = ScriptedExecutor::always_ok("R");
        let state = test_state_with(StaticPlanner::new(Plan::default()), executor.clone());
        let task = seed_task(&state, &AgentId::new("a1"), "waiting").await;

        let shutdown = CancellationToken::new();
        let handle = TaskRunner::new(state.clone(), fast_config()).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(task_status(&state, &task.id).await, TaskStatus::Pending);
        assert!(executor.calls().is_empty());

        state
            .create_agent(Agent::new("Ada", AgentRole::Coder).with_id(AgentId::new("a1")))
            .await
            .expect("create agent");
        wait_for_status(&state, &task.id, TaskStatus::Completed).await;
        assert_eq!(executor.calls().len(), 1);

        shutdown.cancel();
        handle.await.expect("runner join");
    }
}
