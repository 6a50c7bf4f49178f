//! Client for the OpenAI Responses API.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use aether_core::{Agent, Plan, Task};

use super::{ExecutionService, LlmError, PlanService};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 600;
const EMPTY_RUN_OUTPUT: &str = "Task completed with no output.";

const PLANNER_INSTRUCTIONS: &str = "You are the Master Orchestrator. Decompose user goals into a small team of specialized agents (3-5 max) and their first tasks.";

/// Planning and execution over `POST {base_url}/responses`.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_output_tokens: u32,
}

impl OpenAiClient {
    /// Create a new client for the given API key and base URL.
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    /// Set the model used for both planning and execution.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Cap the length of execution answers.
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Send a request body and return the flattened output text.
    async fn create_response(&self, body: Value) -> Result<String, LlmError> {
        let url = format!("{}/responses", self.base_url);
        debug!(url = %url, model = %self.model, "POST request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        Ok(flatten_output(&payload))
    }
}

#[async_trait]
impl PlanService for OpenAiClient {
    async fn plan(&self, goal: &str) -> Result<Plan, LlmError> {
        let body = json!({
            "model": self.model,
            "input": [
                { "role": "system", "content": PLANNER_INSTRUCTIONS },
                {
                    "role": "user",
                    "content": format!(
                        "User Request: \"{goal}\"\n\nReturn a JSON object with {{ agents: [{{ name, role }}], tasks: [{{ agent_name, description }}] }}. Roles may include Coder, Stylist, Researcher, Builder."
                    ),
                },
            ],
            "text": {
                "format": {
                    "name": "plan_schema",
                    "type": "json_schema",
                    "schema": plan_schema(),
                }
            },
        });

        let text = self.create_response(body).await?;
        let plan = parse_plan(&text)?;
        info!(
            agents = plan.agents.len(),
            tasks = plan.tasks.len(),
            "Plan received"
        );
        Ok(plan)
    }
}

#[async_trait]
impl ExecutionService for OpenAiClient {
    async fn run(&self, agent: &Agent, task: &Task, context: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "input": [
                {
                    "role": "system",
                    "content": format!(
                        "You are {} agent named {}. Be concise, focus on the task, and include a short summary plus suggested next steps",
                        agent.role, agent.name
                    ),
                },
                {
                    "role": "user",
                    "content": format!("Task: {}\n\nContext:\n{}", task.description, context),
                },
            ],
            "max_output_tokens": self.max_output_tokens,
        });

        let text = self.create_response(body).await?;
        if text.is_empty() {
            return Ok(EMPTY_RUN_OUTPUT.to_string());
        }
        Ok(text)
    }
}

fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "agents": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "role": { "type": "string" },
                    },
                    "required": ["name", "role"],
                },
            },
            "tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "agent_name": { "type": "string" },
                        "description": { "type": "string" },
                    },
                    "required": ["agent_name", "description"],
                },
            },
        },
        "required": ["agents", "tasks"],
    })
}

/// Concatenate the text of every output block of a Responses API payload.
///
/// Texts within a block are joined directly, blocks are joined by newlines,
/// and the result is trimmed.
pub fn flatten_output(response: &Value) -> String {
    let Some(blocks) = response.get("output").and_then(Value::as_array) else {
        return String::new();
    };

    blocks
        .iter()
        .map(|block| {
            block
                .get("content")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.get("text").and_then(Value::as_str))
                        .collect::<String>()
                })
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Read a plan from model output.
///
/// Empty output is an empty plan; a JSON array yields its first element.
pub fn parse_plan(text: &str) -> Result<Plan, LlmError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Plan::default());
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| LlmError::MalformedPlan(e.to_string()))?;
    let value = match value {
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => first,
            None => return Ok(Plan::default()),
        },
        other => other,
    };

    serde_json::from_value(value).map_err(|e| LlmError::MalformedPlan(e.to_string()))
}
