//! HTTP server for the dashboard.
//!
//! Provides endpoints for:
//! - Agents, tasks and logs (`/api/agents`, `/api/tasks`, `/api/logs`)
//! - Planning and ad-hoc execution (`/api/ai/plan`, `/api/ai/run`)
//! - Goal orchestration (`/api/orchestrate`)
//! - Live events (`/ws`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
///
/// With `static_dir` set, every unmatched path is served from that directory,
/// falling back to its `index.html`.
pub fn create_router(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Router {
    // Dashboards may be served from another origin during development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        // API routes
        .route(
            "/api/agents",
            get(handlers::list_agents).post(handlers::create_agent),
        )
        .route(
            "/api/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route("/api/logs", post(handlers::append_log))
        .route("/api/logs/:agent_id", get(handlers::list_logs))
        .route("/api/ai/plan", post(handlers::plan))
        .route("/api/ai/run", post(handlers::run))
        .route("/api/orchestrate", post(handlers::orchestrate))
        // Live updates
        .route("/ws", get(handlers::ws_handler))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler));

    let router = match static_dir {
        Some(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            router.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
