//! Aether Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Database
//! - Runtime specifics
//!
//! All types here represent the agents, tasks and log journal that the
//! orchestrator and task runner operate on.

pub mod agent;
pub mod error;
pub mod event;
pub mod ids;
pub mod log;
pub mod plan;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use agent::{Agent, AgentRole};
pub use error::CoreError;
pub use event::DashboardEvent;
pub use ids::{AgentId, TaskId};
pub use log::LogEntry;
pub use plan::{Plan, PlannedAgent, PlannedTask};
pub use status::{AgentStatus, LogLevel, TaskStatus};
pub use task::Task;
