//! Progress notifications.
//!
//! The engine calls [`Telemetry::snapshot`] after every full iterator pass and
//! whenever a worker completes its task. Implementations must not panic; a
//! panic here is not caught and aborts the run.

use std::fmt::Write;

use crate::agents::CoreRole;
use crate::state::{WorkflowState, WorkflowStatus};

/// Receiver of `(previous, next)` state pairs.
pub trait Telemetry: Send + Sync {
    fn snapshot(&self, prev: &WorkflowState, next: &WorkflowState);
}

impl<F> Telemetry for F
where
    F: Fn(&WorkflowState, &WorkflowState) + Send + Sync,
{
    fn snapshot(&self, prev: &WorkflowState, next: &WorkflowState) {
        self(prev, next)
    }
}

/// Discards all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn snapshot(&self, _prev: &WorkflowState, _next: &WorkflowState) {}
}

/// Logs the state tree through `tracing` whenever it changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeLogger;

impl Telemetry for TreeLogger {
    fn snapshot(&self, prev: &WorkflowState, next: &WorkflowState) {
        if prev == next {
            return;
        }
        tracing::info!("\n{}", render_tree(next));
    }
}

/// Short description of what a leaf node is doing.
pub fn status_text(state: &WorkflowState) -> String {
    let role = CoreRole::from_name(&state.agent);
    if role == Some(CoreRole::Supervisor) && state.status.is_active() {
        return "Looking for next task...".to_string();
    }
    if role == Some(CoreRole::ResourcePlanner) {
        return "Looking for best agent...".to_string();
    }

    let last = state.messages.last();
    match state.status {
        WorkflowStatus::Idle | WorkflowStatus::Running => match last {
            Some(m) if m.tool_call_id.is_some() => "Processing tool response...".to_string(),
            Some(m) => format!("Working on: {}", m.content),
            None => "Working...".to_string(),
        },
        WorkflowStatus::Paused => match last {
            Some(m) if m.is_tool_call_request() => {
                let tools: Vec<&str> = m
                    .requested_calls()
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect();
                format!("Waiting for tools: {}", tools.join(", "))
            }
            _ => "Paused".to_string(),
        },
        WorkflowStatus::Finished => "Done".to_string(),
        WorkflowStatus::Failed => "Failed".to_string(),
    }
}

/// Render a state tree, one line per node, children indented below parents.
pub fn render_tree(state: &WorkflowState) -> String {
    let mut out = String::new();
    render_node(state, 0, &mut out);
    out
}

fn render_node(state: &WorkflowState, level: usize, out: &mut String) {
    let indent = "  ".repeat(level);
    let arrow = if level > 0 { "└─▶ " } else { "" };
    let status = if state.children.is_empty() {
        status_text(state)
    } else {
        String::new()
    };
    let _ = writeln!(out, "{}{}{} {}", indent, arrow, state.agent, status);
    for child in &state.children {
        render_node(child, level + 1, out);
    }
}
