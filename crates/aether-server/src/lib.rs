//! Aether Server Library
//!
//! This crate provides the orchestrator backend for Aether, including the
//! persistence store, notification bus, LLM client, task runner and the
//! HTTP/WebSocket dashboard API.

pub mod bus;
pub mod config;
pub mod http;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod runner;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

pub use bus::EventBus;
pub use config::{Config, MissingAgentPolicy};
pub use orchestrator::Orchestrator;
pub use runner::{TaskRunner, TickOutcome};
pub use state::AppState;
pub use store::{SqliteStore, Store, StoreError};
