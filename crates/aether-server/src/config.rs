//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is required for AI orchestration")]
    MissingApiKey,

    #[error("invalid bind address '{addr}': {source}")]
    InvalidAddr {
        addr: String,
        source: std::net::AddrParseError,
    },
}

/// What the task runner does with a pending task whose agent does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MissingAgentPolicy {
    /// Leave the task pending and do nothing this tick.
    #[default]
    Skip,
    /// Mark the task failed and journal the reason under `system`.
    FailFast,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub http_addr: String,

    /// SQLite database file.
    pub database_path: PathBuf,

    /// API key for the LLM service.
    pub openai_api_key: Option<String>,

    /// Base URL of the Responses API.
    pub openai_base_url: String,

    /// Model used for planning and execution.
    pub model: String,

    /// Output token cap for task executions.
    pub max_output_tokens: u32,

    /// Delay between a state change and the runner's next tick (milliseconds).
    pub poll_delay_ms: u64,

    /// Context window in characters; 0 means unbounded.
    pub context_max_chars: usize,

    /// Execution time limit in seconds; 0 means none.
    pub execution_timeout_secs: u64,

    pub missing_agent_policy: MissingAgentPolicy,

    /// Built dashboard assets, served for every non-API path.
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Check required settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.openai_api_key {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingApiKey),
        }
        self.http_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|source| ConfigError::InvalidAddr {
                addr: self.http_addr.clone(),
                source,
            })?;
        Ok(())
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        (self.execution_timeout_secs > 0).then(|| Duration::from_secs(self.execution_timeout_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:3000".to_string(),
            database_path: PathBuf::from("orchestrator.db"),
            openai_api_key: None,
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: 600,
            poll_delay_ms: 2000,
            context_max_chars: 16_000,
            execution_timeout_secs: 0,
            missing_agent_policy: MissingAgentPolicy::Skip,
            static_dir: None,
        }
    }
}
