//! User-defined agent.
//!
//! A worker takes its node's task one step at a time. Each step either calls
//! tools (the node pauses until results arrive), declares a next step (the
//! same worker continues), or completes the task.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Agent, AgentError};
use crate::llm::{schema, ChatMessage, ChatRequest, Provider, ResponseFormat, StructuredReply};
use crate::messages::steps;
use crate::state::{WorkflowState, WorkflowStatus};
use crate::tools::{Tool, ToolRegistry};
use crate::workflow::Workflow;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
enum WorkerResponse {
    Step(Step),
    Error(Failure),
}

#[derive(Debug, Deserialize)]
struct Step {
    name: String,
    result: String,
    reasoning: String,
    #[serde(default)]
    next_step: String,
    has_next_step: bool,
}

#[derive(Debug, Deserialize)]
struct Failure {
    reasoning: String,
}

fn response_format() -> ResponseFormat {
    ResponseFormat::new()
        .shape(
            "step",
            "Result of the current step",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Name of the current step or action being performed"
                    },
                    "result": {
                        "type": "string",
                        "description": "The output of this step. Include all relevant details and information."
                    },
                    "reasoning": {
                        "type": "string",
                        "description": "The reasoning for performing this step."
                    },
                    "next_step": {
                        "type": "string",
                        "description": "The next step ONLY if required by the original request. Return empty string if you have fully answered the current request, even if you can think of additional tasks."
                    },
                    "has_next_step": {
                        "type": "boolean",
                        "description": "True if you provided next_step. False otherwise."
                    }
                },
                "required": ["name", "result", "reasoning", "next_step", "has_next_step"]
            }),
        )
        .shape(
            "error",
            "The task cannot be completed",
            json!({
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "The reason why you cannot complete the task"
                    }
                },
                "required": ["reasoning"]
            }),
        )
}

/// Agent defined by a description and a set of tools.
pub struct WorkerAgent {
    description: String,
    tools: ToolRegistry,
    provider: Option<Arc<dyn Provider>>,
}

impl WorkerAgent {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tools: ToolRegistry::empty(),
            provider: None,
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    /// Use `provider` instead of the workflow's provider.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    fn prompt(
        &self,
        state: &WorkflowState,
        context: &[ChatMessage],
        workflow: &Workflow,
    ) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::system(format!(
                "{}\n\nYour job is to complete the assigned task:\n\
                 - You can break down complex tasks into multiple steps if needed.\n\
                 - You can use available tools if needed.\n\n\
                 Try to complete the task on your own.",
                self.description
            )),
            ChatMessage::assistant("What have been done so far?"),
            ChatMessage::user("Here is all the work done so far by other agents:"),
        ];
        messages.extend(steps(context.get(1..).unwrap_or_default()));
        messages.push(ChatMessage::assistant("Is there anything else I need to know?"));
        messages.push(match &workflow.knowledge {
            Some(knowledge) => {
                ChatMessage::user(format!("Here is all the knowledge available: {}", knowledge))
            }
            None => ChatMessage::user("No, I do not have any additional information."),
        });
        messages.push(ChatMessage::assistant("What is the request?"));
        messages.extend(state.messages.iter().cloned());
        messages
    }
}

impl std::fmt::Debug for WorkerAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerAgent")
            .field("description", &self.description)
            .field("tools", &self.tools)
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

#[async_trait]
impl Agent for WorkerAgent {
    fn description(&self) -> &str {
        &self.description
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.provider.clone()
    }

    async fn run(
        &self,
        provider: &dyn Provider,
        state: &WorkflowState,
        context: &[ChatMessage],
        workflow: &Workflow,
    ) -> Result<WorkflowState, AgentError> {
        let chat = ChatRequest::new(self.prompt(state, context, workflow), response_format())
            .with_tools(self.tools.definitions());

        let step = match schema::request_with_tools(provider, chat).await? {
            StructuredReply::ToolCalls(calls) => {
                tracing::debug!(agent = %state.agent, calls = calls.len(), "Requesting tools");
                return Ok(WorkflowState {
                    status: WorkflowStatus::Paused,
                    messages: state.messages.with([ChatMessage::tool_calls(calls)]),
                    ..state.clone()
                });
            }
            StructuredReply::Result(WorkerResponse::Error(failure)) => {
                return Err(AgentError::Declined(failure.reasoning));
            }
            StructuredReply::Result(WorkerResponse::Step(step)) => step,
        };

        tracing::debug!(
            agent = %state.agent,
            step = %step.name,
            reasoning = %step.reasoning,
            "Step completed"
        );
        let response = ChatMessage::assistant(step.result);

        if step.has_next_step {
            return Ok(WorkflowState {
                status: WorkflowStatus::Running,
                messages: state
                    .messages
                    .with([response, ChatMessage::user(step.next_step)]),
                ..state.clone()
            });
        }

        let prev = WorkflowState {
            status: WorkflowStatus::Running,
            messages: state
                .messages
                .with([response.clone(), ChatMessage::user(step.next_step)]),
            ..state.clone()
        };
        let next = state.finish(response);
        workflow.telemetry.snapshot(&prev, &next);
        Ok(next)
    }
}
