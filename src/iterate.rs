//! Recursive iterator: advances a state tree by one step.

use async_recursion::async_recursion;
use futures::future::join_all;

use crate::agents::CoreRole;
use crate::error::WorkflowError;
use crate::llm::{ChatMessage, Provider};
use crate::state::{WorkflowState, WorkflowStatus};
use crate::tool_calls::run_tools;
use crate::workflow::Workflow;

/// Advance `state` and, transitively, its subtree by one step.
///
/// In priority order:
/// 1. terminal nodes are returned unchanged
/// 2. a node over the iteration budget is handed to the fallback agent
/// 3. children advance concurrently; once all finished, their messages are
///    merged into the node in order
/// 4. a paused node resolves its tool calls and resumes
/// 5. an idle or running node is advanced by its agent
///
/// `context` holds the messages of all ancestors, root first.
#[async_recursion]
pub async fn run(
    state: &WorkflowState,
    context: &[ChatMessage],
    workflow: &Workflow,
) -> Result<WorkflowState, WorkflowError> {
    if state.status.is_terminal() {
        return Ok(state.clone());
    }

    let fallback = CoreRole::FinalBoss.name();
    if state.messages.len() > workflow.max_iterations && state.agent != fallback {
        tracing::warn!(
            agent = %state.agent,
            messages = state.messages.len(),
            max_iterations = workflow.max_iterations,
            "Iteration budget exceeded, handing over to fallback"
        );
        let status = match state.status {
            WorkflowStatus::Paused => WorkflowStatus::Running,
            other => other,
        };
        return Ok(WorkflowState {
            agent: fallback.to_string(),
            status,
            ..state.clone()
        });
    }

    if !state.children.is_empty() {
        let child_context: Vec<ChatMessage> = context
            .iter()
            .chain(state.messages.iter())
            .cloned()
            .collect();
        let results = join_all(
            state
                .children
                .iter()
                .map(|child| run(child, &child_context, workflow)),
        )
        .await;
        let children = results.into_iter().collect::<Result<Vec<_>, _>>()?;

        if children
            .iter()
            .all(|child| child.status == WorkflowStatus::Finished)
        {
            tracing::debug!(agent = %state.agent, children = children.len(), "Merging children");
            return Ok(WorkflowState {
                status: state.status,
                agent: state.agent.clone(),
                messages: state
                    .messages
                    .with(children.into_iter().flat_map(|c| c.messages.to_vec())),
                children: Vec::new(),
                error: state.error.clone(),
            });
        }
        return Ok(WorkflowState {
            status: state.status,
            agent: state.agent.clone(),
            messages: state.messages.clone(),
            children,
            error: state.error.clone(),
        });
    }

    let agent = workflow.agent(&state.agent)?;
    let own_provider = agent.provider();
    let provider: &dyn Provider = own_provider.as_deref().unwrap_or(&*workflow.provider);

    if state.status == WorkflowStatus::Paused {
        let results = run_tools(provider, state, context, agent.tools()).await?;
        return Ok(WorkflowState {
            status: WorkflowStatus::Running,
            messages: state.messages.with(results),
            ..state.clone()
        });
    }

    match agent.run(provider, state, context, workflow).await {
        Ok(next) => Ok(next),
        Err(err) if err.is_fatal() => Err(WorkflowError::Agent {
            agent: state.agent.clone(),
            source: err,
        }),
        Err(err) => {
            tracing::warn!(
                agent = %state.agent,
                error = %err,
                "Agent failed, finishing node with error"
            );
            Ok(state.recover(err))
        }
    }
}

/// Run one full pass from the root and notify telemetry.
pub async fn iterate(
    workflow: &Workflow,
    state: &WorkflowState,
) -> Result<WorkflowState, WorkflowError> {
    let next = run(state, &[], workflow).await?;
    workflow.telemetry.snapshot(state, &next);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentError, WorkerAgent};
    use crate::llm::{ProviderResponse, ToolCall};
    use crate::state::{root_state, Conversation};
    use crate::testing::{
        structured, test_workflow, EchoTool, RecordingTelemetry, ScriptedProvider,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn worker_node(
        agent: &str,
        status: WorkflowStatus,
        messages: Vec<ChatMessage>,
    ) -> WorkflowState {
        WorkflowState {
            status,
            ..WorkflowState::child(agent, Conversation::from_messages(messages))
        }
    }

    #[tokio::test]
    async fn test_terminal_nodes_are_unchanged() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let workflow = test_workflow(provider.clone());
        let finished = root_state(&workflow).finish(ChatMessage::assistant("done"));
        let failed = root_state(&workflow).fail("custom");

        assert_eq!(run(&finished, &[], &workflow).await.unwrap(), finished);
        assert_eq!(run(&failed, &[], &workflow).await.unwrap(), failed);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_budget_routes_to_fallback() {
        let provider = Arc::new(ScriptedProvider::new(vec![structured(
            "task_result",
            json!({"final_answer": "summary"}),
        )]));
        let workflow = crate::workflow::Workflow::builder("goal", "report", provider.clone())
            .agent("writer", WorkerAgent::new("Writes"))
            .max_iterations(2)
            .build()
            .unwrap();
        let state = worker_node(
            "writer",
            WorkflowStatus::Running,
            vec![
                ChatMessage::user("task"),
                ChatMessage::assistant("a"),
                ChatMessage::user("b"),
            ],
        );

        let guarded = run(&state, &[], &workflow).await.unwrap();
        assert_eq!(guarded.agent, "finalBoss");
        assert_eq!(guarded.messages, state.messages);
        assert!(provider.requests().is_empty());

        let done = run(&guarded, &[], &workflow).await.unwrap();
        assert_eq!(done.status, WorkflowStatus::Finished);
        assert_eq!(done.solution(), Some("summary"));
    }

    #[tokio::test]
    async fn test_budget_guard_resumes_paused_node() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let workflow = crate::workflow::Workflow::builder("goal", "report", provider.clone())
            .max_iterations(1)
            .build()
            .unwrap();
        let state = worker_node(
            "researcher",
            WorkflowStatus::Paused,
            vec![
                ChatMessage::user("task"),
                ChatMessage::tool_calls(vec![ToolCall::new("c1", "echo", json!({"text": "x"}))]),
            ],
        );

        let guarded = run(&state, &[], &workflow).await.unwrap();
        assert_eq!(guarded.agent, "finalBoss");
        assert_eq!(guarded.status, WorkflowStatus::Running);
    }

    #[tokio::test]
    async fn test_children_merge_in_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let workflow = test_workflow(provider.clone());
        let parent = WorkflowState {
            children: vec![
                worker_node(
                    "writer",
                    WorkflowStatus::Finished,
                    vec![ChatMessage::user("t1"), ChatMessage::assistant("r1")],
                ),
                worker_node(
                    "writer",
                    WorkflowStatus::Finished,
                    vec![ChatMessage::user("t2"), ChatMessage::assistant("r2")],
                ),
            ],
            status: WorkflowStatus::Running,
            ..root_state(&workflow)
        };

        let merged = run(&parent, &[], &workflow).await.unwrap();
        assert!(merged.children.is_empty());
        assert_eq!(merged.status, WorkflowStatus::Running);
        let contents: Vec<&str> = merged
            .messages
            .iter()
            .skip(1)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["t1", "r1", "t2", "r2"]);
        assert_eq!(merged.messages[0], parent.messages[0]);
    }

    fn final_step(result: &str) -> ProviderResponse {
        structured(
            "step",
            json!({
                "name": "n", "result": result, "reasoning": "r",
                "next_step": "", "has_next_step": false
            }),
        )
    }

    #[tokio::test]
    async fn test_siblings_advance_in_the_same_pass() {
        let provider = Arc::new(ScriptedProvider::new(vec![final_step("r1"), final_step("r2")]));
        let workflow = test_workflow(provider.clone());
        let parent = WorkflowState {
            children: vec![
                worker_node("writer", WorkflowStatus::Idle, vec![ChatMessage::user("t1")]),
                worker_node("writer", WorkflowStatus::Idle, vec![ChatMessage::user("t2")]),
            ],
            status: WorkflowStatus::Running,
            ..root_state(&workflow)
        };

        let merged = run(&parent, &[], &workflow).await.unwrap();
        assert_eq!(provider.requests().len(), 2);
        assert!(merged.children.is_empty());
        assert_eq!(merged.messages.len(), 5);
        let contents: Vec<&str> = merged
            .messages
            .iter()
            .skip(1)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["t1", "r1", "t2", "r2"]);
    }

    #[tokio::test]
    async fn test_unfinished_children_are_kept() {
        let provider = Arc::new(ScriptedProvider::new(vec![structured(
            "step",
            json!({
                "name": "n", "result": "partial", "reasoning": "r",
                "next_step": "continue", "has_next_step": true
            }),
        )]));
        let workflow = test_workflow(provider.clone());
        let parent = WorkflowState {
            children: vec![
                worker_node("writer", WorkflowStatus::Idle, vec![ChatMessage::user("t1")]),
                worker_node(
                    "writer",
                    WorkflowStatus::Finished,
                    vec![ChatMessage::user("t2"), ChatMessage::assistant("r2")],
                ),
            ],
            status: WorkflowStatus::Running,
            ..root_state(&workflow)
        };

        let next = run(&parent, &[], &workflow).await.unwrap();
        assert_eq!(next.messages, parent.messages);
        assert_eq!(next.children.len(), 2);
        assert_eq!(next.children[0].status, WorkflowStatus::Running);
        assert_eq!(next.children[0].messages.len(), 3);
        assert_eq!(next.children[1], parent.children[1]);

        // children see the parent's messages as context
        let sent = &provider.requests()[0].messages;
        assert!(sent.iter().all(|m| m.content != parent.messages[0].content));
    }

    #[tokio::test]
    async fn test_paused_node_resolves_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let workflow = test_workflow(provider.clone());
        let state = worker_node(
            "researcher",
            WorkflowStatus::Paused,
            vec![
                ChatMessage::user("task"),
                ChatMessage::tool_calls(vec![ToolCall::new("c1", "echo", json!({"text": "hi"}))]),
            ],
        );

        let next = run(&state, &[], &workflow).await.unwrap();
        assert_eq!(next.status, WorkflowStatus::Running);
        assert_eq!(next.messages.len(), 3);
        assert_eq!(next.messages[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(next.messages[2].content, "echo: hi");
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_tool_errors_abort() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let workflow = test_workflow(provider.clone());
        let state = worker_node(
            "writer",
            WorkflowStatus::Paused,
            vec![
                ChatMessage::user("task"),
                ChatMessage::tool_calls(vec![ToolCall::new("c1", "echo", json!({"text": "hi"}))]),
            ],
        );

        let err = run(&state, &[], &workflow).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Tool(_)));
    }

    #[tokio::test]
    async fn test_recoverable_agent_error_finishes_node() {
        let provider = Arc::new(ScriptedProvider::new(vec![structured(
            "error",
            json!({"reasoning": "cannot reach the archive"}),
        )]));
        let workflow = test_workflow(provider.clone());
        let state = worker_node(
            "writer",
            WorkflowStatus::Running,
            vec![
                ChatMessage::user("task"),
                ChatMessage::assistant("a"),
                ChatMessage::user("b"),
            ],
        );

        let next = run(&state, &[], &workflow).await.unwrap();
        assert_eq!(next.status, WorkflowStatus::Finished);
        assert_eq!(next.messages.len(), 2);
        assert_eq!(next.solution(), Some("cannot reach the archive"));
        assert_eq!(next.error.as_deref(), Some("cannot reach the archive"));
    }

    #[tokio::test]
    async fn test_provider_outage_is_recovered() {
        let provider = Arc::new(ScriptedProvider::with_results(vec![Err(
            crate::llm::LlmError::server_error(503, "upstream unavailable".to_string()),
        )]));
        let workflow = test_workflow(provider.clone());
        let state = worker_node("writer", WorkflowStatus::Idle, vec![ChatMessage::user("task")]);

        let next = run(&state, &[], &workflow).await.unwrap();
        assert_eq!(next.status, WorkflowStatus::Finished);
        assert!(next.error.as_deref().unwrap_or_default().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn test_contract_violation_aborts() {
        let provider = Arc::new(ScriptedProvider::new(vec![structured(
            "something_else",
            json!({}),
        )]));
        let workflow = test_workflow(provider.clone());
        let state = worker_node("writer", WorkflowStatus::Idle, vec![ChatMessage::user("task")]);

        let err = run(&state, &[], &workflow).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Agent { ref agent, source: AgentError::Llm(_) } if agent == "writer"
        ));
    }

    #[tokio::test]
    async fn test_unknown_agent_aborts() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let workflow = test_workflow(provider.clone());
        let state = worker_node("ghost", WorkflowStatus::Idle, vec![ChatMessage::user("task")]);

        let err = run(&state, &[], &workflow).await.unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownAgent(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_agent_provider_overrides_workflow_provider() {
        let shared = Arc::new(ScriptedProvider::new(vec![]));
        let own = Arc::new(ScriptedProvider::new(vec![ProviderResponse::ToolCalls(vec![
            ToolCall::new("c1", "echo", json!({"text": "x"})),
        ])]));
        let workflow = crate::workflow::Workflow::builder("goal", "report", shared.clone())
            .agent(
                "scout",
                WorkerAgent::new("Scouts")
                    .with_tool(Arc::new(EchoTool::new("echo")))
                    .with_provider(own.clone()),
            )
            .build()
            .unwrap();
        let state = worker_node("scout", WorkflowStatus::Idle, vec![ChatMessage::user("task")]);

        let next = run(&state, &[], &workflow).await.unwrap();
        assert_eq!(next.status, WorkflowStatus::Paused);
        assert_eq!(own.requests().len(), 1);
        assert!(shared.requests().is_empty());
    }

    #[tokio::test]
    async fn test_iterate_notifies_telemetry_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let recorder = RecordingTelemetry::default();
        let workflow = crate::workflow::Workflow::builder("goal", "report", provider.clone())
            .telemetry(Arc::new(recorder.clone()))
            .build()
            .unwrap();
        let finished = root_state(&workflow).finish(ChatMessage::assistant("done"));

        let next = iterate(&workflow, &finished).await.unwrap();
        assert_eq!(next, finished);
        let snapshots = recorder.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].0, finished);
        assert_eq!(snapshots[0].1, finished);
    }
}
