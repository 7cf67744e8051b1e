//! Driver loop: iterate a workflow until it finishes.

use crate::error::WorkflowError;
use crate::iterate::iterate;
use crate::state::{root_state, WorkflowState, WorkflowStatus};
use crate::workflow::Workflow;

/// How the driver treats paused nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolMode {
    /// Execute tool calls with the agents' tools.
    #[default]
    Resolve,
    /// Return as soon as any node is paused, so the caller can supply the
    /// results with [`crate::add_tool_response`] and resume later.
    Suspend,
}

/// Iterate `state` until the root finishes, or until a node pauses in
/// [`ToolMode::Suspend`].
///
/// # Errors
/// - `WorkflowError::Failed` as soon as any node of the tree reaches `Failed`
/// - any fatal error raised while iterating
pub async fn teamwork(
    workflow: &Workflow,
    state: WorkflowState,
    mode: ToolMode,
) -> Result<WorkflowState, WorkflowError> {
    let mut state = state;
    loop {
        if state.status == WorkflowStatus::Finished {
            return Ok(state);
        }
        if let Some(failed) = state.failed_node() {
            return Err(WorkflowError::Failed {
                agent: failed.agent.clone(),
                reason: failed.error.clone(),
            });
        }
        if mode == ToolMode::Suspend && state.has_paused_status() {
            tracing::debug!("Suspending for external tool results");
            return Ok(state);
        }
        tracing::debug!(nodes = state.node_count(), "Iterating");
        state = iterate(workflow, &state).await?;
    }
}

/// Run a workflow from a fresh root state, resolving tools automatically.
pub async fn run_workflow(workflow: &Workflow) -> Result<WorkflowState, WorkflowError> {
    tracing::info!(description = %workflow.description, "Starting workflow");
    teamwork(workflow, root_state(workflow), ToolMode::Resolve).await
}
