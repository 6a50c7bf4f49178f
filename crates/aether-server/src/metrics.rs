//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;

use aether_core::{AgentStatus, TaskStatus};

use crate::state::AppState;
use crate::store::{StatusCounts, StoreResult};

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &AppState) -> StoreResult<String> {
    let counts = state.store.counts().await?;
    let mut output = String::new();

    write_agent_metrics(&counts, &mut output);
    write_task_metrics(&counts, &mut output);
    write_log_metrics(&counts, &mut output);
    write_runner_metrics(state.is_executing(), &mut output);

    Ok(output)
}

fn write_agent_metrics(counts: &StatusCounts, output: &mut String) {
    writeln!(
        output,
        "# HELP aether_agents_total Number of agents by status"
    )
    .ok();
    writeln!(output, "# TYPE aether_agents_total gauge").ok();
    for &status in AgentStatus::all() {
        writeln!(
            output,
            "aether_agents_total{{status=\"{status}\"}} {}",
            counts.agents_with(status)
        )
        .ok();
    }
}

fn write_task_metrics(counts: &StatusCounts, output: &mut String) {
    writeln!(output).ok();
    writeln!(
        output,
        "# HELP aether_tasks_total Number of tasks by status"
    )
    .ok();
    writeln!(output, "# TYPE aether_tasks_total gauge").ok();
    for &status in TaskStatus::all() {
        writeln!(
            output,
            "aether_tasks_total{{status=\"{status}\"}} {}",
            counts.tasks_with(status)
        )
        .ok();
    }
}

fn write_log_metrics(counts: &StatusCounts, output: &mut String) {
    writeln!(output).ok();
    writeln!(output, "# HELP aether_logs_total Journal entries written").ok();
    writeln!(output, "# TYPE aether_logs_total counter").ok();
    writeln!(output, "aether_logs_total {}", counts.logs).ok();
}

fn write_runner_metrics(in_flight: bool, output: &mut String) {
    writeln!(output).ok();
    writeln!(
        output,
        "# HELP aether_runner_in_flight Whether a task execution is outstanding"
    )
    .ok();
    writeln!(output, "# TYPE aether_runner_in_flight gauge").ok();
    writeln!(output, "aether_runner_in_flight {}", u8::from(in_flight)).ok();
}
