//! HTTP request and response types.

use serde::{Deserialize, Serialize};

use aether_core::{Agent, Task};

// ============================================================================
// Record creation types
// ============================================================================

/// Request body for `POST /api/agents`.
#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    /// Role label; unknown labels map to `Orchestrator`.
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for `POST /api/tasks`.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub id: Option<String>,

    pub agent_id: String,

    pub description: String,

    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for `POST /api/logs`.
#[derive(Debug, Deserialize)]
pub struct AppendLogRequest {
    pub agent_id: String,

    pub message: String,

    /// Defaults to `info`.
    #[serde(default)]
    pub level: Option<String>,
}

/// Acknowledgement for mutating routes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

// ============================================================================
// AI types
// ============================================================================

/// Request body for `POST /api/ai/plan` and `POST /api/orchestrate`.
#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    #[serde(default)]
    pub goal: String,
}

/// Request body for `POST /api/ai/run`.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub agent: Option<Agent>,

    #[serde(default)]
    pub task: Option<Task>,

    #[serde(default)]
    pub context: String,
}

/// Response body for `POST /api/ai/run`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub result: String,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
