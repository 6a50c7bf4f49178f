//! Aether orchestrator server.
//!
//! Serves the dashboard API and runs pending tasks in the background.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use aether_server::config::{Config, MissingAgentPolicy};
use aether_server::llm::{OpenAiClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
use aether_server::runner::RunnerConfig;
use aether_server::{http, AppState, SqliteStore, TaskRunner};

/// Aether orchestrator server.
#[derive(Parser, Debug)]
#[command(name = "aether-server", about = "LLM agent orchestrator backend")]
struct Args {
    /// HTTP server address
    #[arg(long, env = "AETHER_HTTP_ADDR", default_value = "0.0.0.0:3000")]
    http_addr: String,

    /// SQLite database file
    #[arg(long, env = "AETHER_DATABASE", default_value = "orchestrator.db")]
    database: PathBuf,

    /// API key for the LLM service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Base URL of the Responses API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    openai_base_url: String,

    /// Model used for planning and execution
    #[arg(long, env = "AETHER_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Output token cap for task executions
    #[arg(long, default_value = "600")]
    max_output_tokens: u32,

    /// Delay in milliseconds between a state change and the next runner tick
    #[arg(long, env = "AETHER_POLL_DELAY_MS", default_value = "2000")]
    poll_delay_ms: u64,

    /// Context window in characters (0 = unbounded)
    #[arg(long, default_value = "16000")]
    context_max_chars: usize,

    /// Execution time limit in seconds (0 = none)
    #[arg(long, default_value = "0")]
    execution_timeout_secs: u64,

    /// What to do with pending tasks whose agent does not exist
    #[arg(long, value_enum, default_value_t = MissingAgentPolicy::Skip)]
    missing_agent_policy: MissingAgentPolicy,

    /// Directory of built dashboard assets
    #[arg(long, env = "AETHER_STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            http_addr: args.http_addr,
            database_path: args.database,
            openai_api_key: args.openai_api_key,
            openai_base_url: args.openai_base_url,
            model: args.model,
            max_output_tokens: args.max_output_tokens,
            poll_delay_ms: args.poll_delay_ms,
            context_max_chars: args.context_max_chars,
            execution_timeout_secs: args.execution_timeout_secs,
            missing_agent_policy: args.missing_agent_policy,
            static_dir: args.static_dir,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    dotenvy::dotenv().ok();
    let config = Config::from(Args::parse());

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("aether=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    config.validate()?;
    let api_key = config.openai_api_key.clone().unwrap_or_default();

    let store = SqliteStore::open(&config.database_path)?;
    info!(path = %config.database_path.display(), "Database opened");

    let llm = Arc::new(
        OpenAiClient::new(api_key, &config.openai_base_url)
            .with_model(config.model.clone())
            .with_max_output_tokens(config.max_output_tokens),
    );
    let state = AppState::new(Arc::new(store), llm.clone(), llm);

    let shutdown = CancellationToken::new();
    let runner = TaskRunner::new(state.clone(), RunnerConfig::from_config(&config));
    let runner_handle = runner.spawn(shutdown.clone());

    let router = http::create_router(state, config.static_dir.clone());
    let listener = TcpListener::bind(&config.http_addr).await?;
    info!(
        http_addr = %config.http_addr,
        model = %config.model,
        "Aether server listening"
    );

    let server = axum::serve(listener, router).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!(error = %e, "Failed to listen for shutdown signal");
                    }
                }
                _ = shutdown.cancelled() => {}
            }
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    if let Err(e) = server.await {
        error!(error = %e, "HTTP server error");
    }

    // The runner returns once any in-flight execution has been journaled.
    shutdown.cancel();
    if let Err(e) = runner_handle.await {
        error!(error = %e, "Task runner panicked");
    }

    info!("Aether server stopped");
    Ok(())
}
