//! Planning and execution services backed by an LLM.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use aether_core::{Agent, Plan, Task};

mod openai;

pub use openai::{flatten_output, parse_plan, OpenAiClient, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Errors raised by the planning/execution services.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The plan text could not be read as a plan.
    #[error("malformed plan: {0}")]
    MalformedPlan(String),

    /// The execution did not finish in time.
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    /// Free-form failure reported by an execution backend.
    #[error("{0}")]
    Execution(String),
}

/// Turns a goal into a proposed team and its first tasks.
#[async_trait]
pub trait PlanService: Send + Sync {
    async fn plan(&self, goal: &str) -> Result<Plan, LlmError>;
}

/// Executes one task for one agent, given the agent's accumulated context.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn run(&self, agent: &Agent, task: &Task, context: &str) -> Result<String, LlmError>;
}
