//! Tool-call resolution and out-of-process resumption.
//!
//! The iterator resolves a paused node with [`run_tools`]. Callers that answer
//! tool calls themselves (see [`crate::ToolMode::Suspend`]) use the other
//! functions: list what is missing, attach answers one by one, then promote
//! nodes whose calls are all answered back to `Running`.

use std::collections::HashSet;

use futures::future::join_all;

use crate::llm::{ChatMessage, Provider, ToolCall};
use crate::state::{WorkflowState, WorkflowStatus};
use crate::tools::{validate_arguments, ToolContext, ToolError, ToolRegistry};

/// Ids of all calls that already have a result in `messages`.
fn answered_ids(messages: &[ChatMessage]) -> HashSet<&str> {
    messages
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect()
}

/// Calls requested anywhere in `messages` that have no result yet.
fn outstanding_calls(messages: &[ChatMessage]) -> Vec<&ToolCall> {
    let answered = answered_ids(messages);
    messages
        .iter()
        .flat_map(|m| m.requested_calls())
        .filter(|call| !answered.contains(call.id.as_str()))
        .collect()
}

/// The pending tool-call request: the last request, followed only by results.
fn pending_request(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    let position = messages.iter().rposition(|m| m.is_tool_call_request())?;
    messages[position + 1..]
        .iter()
        .all(|m| m.tool_call_id.is_some())
        .then(|| &messages[position])
}

/// Execute the outstanding calls of the node's pending tool-call request.
///
/// Calls answered externally are skipped. The rest run concurrently; results
/// come back in request order. Any unknown tool, invalid arguments or failed
/// execution is returned as an error and aborts the run.
pub async fn run_tools(
    provider: &dyn Provider,
    state: &WorkflowState,
    context: &[ChatMessage],
    tools: &ToolRegistry,
) -> Result<Vec<ChatMessage>, ToolError> {
    let request = pending_request(&state.messages).ok_or_else(|| {
        ToolError::InvalidRequest(format!(
            "last message of agent {} is not a tool call request",
            state.agent
        ))
    })?;

    let answered = answered_ids(&state.messages);
    let mut resolved = Vec::new();
    for call in request.requested_calls() {
        if answered.contains(call.id.as_str()) {
            continue;
        }
        let tool = tools
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        validate_arguments(tool.as_ref(), &call.arguments)?;
        resolved.push((call, tool));
    }

    let messages: Vec<ChatMessage> = context
        .iter()
        .chain(state.messages.iter())
        .cloned()
        .collect();
    let tool_context = ToolContext {
        provider,
        messages: &messages,
    };

    tracing::debug!(agent = %state.agent, calls = resolved.len(), "Running tools");
    let results = join_all(resolved.into_iter().map(|(call, tool)| async move {
        tool.execute(call.arguments.clone(), tool_context)
            .await
            .map(|content| ChatMessage::tool_result(call.id.clone(), content))
            .map_err(|e| ToolError::Execution {
                tool: call.name.clone(),
                message: e.to_string(),
            })
    }))
    .await;

    results.into_iter().collect()
}

/// Attach the result of call `tool_call_id` to the node waiting for it.
///
/// Returns `state` unchanged if no node has that call outstanding.
pub fn add_tool_response(
    state: &WorkflowState,
    tool_call_id: &str,
    content: &str,
) -> WorkflowState {
    let waiting = outstanding_calls(&state.messages)
        .iter()
        .any(|call| call.id == tool_call_id);
    if waiting {
        return WorkflowState {
            messages: state
                .messages
                .with([ChatMessage::tool_result(tool_call_id, content)]),
            ..state.clone()
        };
    }
    if state.children.is_empty() {
        return state.clone();
    }
    WorkflowState {
        children: state
            .children
            .iter()
            .map(|child| add_tool_response(child, tool_call_id, content))
            .collect(),
        ..state.clone()
    }
}

/// Move every paused node whose last tool-call request is fully answered back
/// to `Running`.
pub fn resume_completed_tool_calls(state: &WorkflowState) -> WorkflowState {
    let children = state
        .children
        .iter()
        .map(resume_completed_tool_calls)
        .collect();

    let complete = state.status == WorkflowStatus::Paused
        && state
            .messages
            .iter()
            .rev()
            .find(|m| m.is_tool_call_request())
            .map(|request| {
                let answered = answered_ids(&state.messages);
                request
                    .requested_calls()
                    .iter()
                    .all(|call| answered.contains(call.id.as_str()))
            })
            .unwrap_or(false);

    WorkflowState {
        status: if complete {
            WorkflowStatus::Running
        } else {
            state.status
        },
        children,
        ..state.clone()
    }
}

/// Collect every requested call without a result, across the whole tree.
pub fn get_all_missing_tool_calls(state: &WorkflowState) -> Vec<ToolCall> {
    let mut missing: Vec<ToolCall> = outstanding_calls(&state.messages)
        .into_iter()
        .cloned()
        .collect();
    missing.extend(state.children.iter().flat_map(get_all_missing_tool_calls));
    missing
}
