//! Planner agent.
//!
//! Owns the root node. Each run reads the workflow request plus a digest of
//! the steps completed so far and asks for the next task. A task is delegated
//! to the router as a single child; no task means the workflow is done.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Agent, AgentError, CoreRole};
use crate::llm::{schema, ChatMessage, ChatRequest, Provider, ResponseFormat};
use crate::messages::steps;
use crate::state::WorkflowState;
use crate::tools::ToolRegistry;
use crate::workflow::Workflow;

const SYSTEM_PROMPT: &str = "You are a planner that breaks down complex workflows into smaller, actionable steps.
Your job is to determine the next task that needs to be done based on the <workflow> and what has been completed so far.

Rules:
1. Each task should be self-contained and achievable
2. Tasks should be specific and actionable
3. Return an empty task when the workflow is complete
4. Consider dependencies and order of operations
5. Use context from completed tasks to inform next steps";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
enum PlannerResponse {
    NextTask(NextTask),
}

#[derive(Debug, Deserialize)]
struct NextTask {
    task: String,
    reasoning: String,
}

fn response_format() -> ResponseFormat {
    ResponseFormat::new().shape(
        "next_task",
        "The next task to work on",
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The next task to be completed, or empty string if workflow is complete"
                },
                "reasoning": {
                    "type": "string",
                    "description": "The reasoning for selecting the next task or why the workflow is complete"
                }
            },
            "required": ["task", "reasoning"]
        }),
    )
}

/// Planner owning the root node.
#[derive(Debug, Default)]
pub struct Supervisor {
    tools: ToolRegistry,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Agent for Supervisor {
    fn description(&self) -> &str {
        "Plans the workflow one task at a time"
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    async fn run(
        &self,
        provider: &dyn Provider,
        state: &WorkflowState,
        _context: &[ChatMessage],
        _workflow: &Workflow,
    ) -> Result<WorkflowState, AgentError> {
        let (request, completed) = match state.messages.split_first() {
            Some(split) => split,
            None => return Err(AgentError::Custom("workflow request is missing".to_string())),
        };

        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::assistant("What is the request?"),
            request.clone(),
        ];
        if !completed.is_empty() {
            messages.push(ChatMessage::assistant("What has been completed so far?"));
            messages.extend(steps(completed));
        }

        let chat = ChatRequest::new(messages, response_format()).with_temperature(0.2);
        let PlannerResponse::NextTask(next) = schema::request(provider, chat).await?;

        if next.task.trim().is_empty() {
            tracing::info!(reasoning = %next.reasoning, "Workflow complete");
            let answer = completed
                .last()
                .map(|m| m.content.clone())
                .unwrap_or(next.reasoning);
            return Ok(state.finish(ChatMessage::assistant(answer)));
        }

        tracing::info!(task = %next.task, "Next task");
        Ok(state.delegate(vec![(
            CoreRole::ResourcePlanner.name().to_string(),
            ChatMessage::user(next.task),
        )]))
    }
}
