//! Fallback agent for nodes that exceeded the iteration budget.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Agent, AgentError};
use crate::llm::{schema, ChatMessage, ChatRequest, Provider, ResponseFormat};
use crate::messages::transcript;
use crate::state::WorkflowState;
use crate::tools::ToolRegistry;
use crate::workflow::Workflow;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
enum FallbackResponse {
    TaskResult(TaskResult),
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    final_answer: String,
}

/// Summarizes everything done so far and finishes the node.
#[derive(Debug, Default)]
pub struct FinalBoss {
    tools: ToolRegistry,
}

impl FinalBoss {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Agent for FinalBoss {
    fn description(&self) -> &str {
        "Produces a best-effort answer when a task runs out of steps"
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    async fn run(
        &self,
        provider: &dyn Provider,
        state: &WorkflowState,
        context: &[ChatMessage],
        _workflow: &Workflow,
    ) -> Result<WorkflowState, AgentError> {
        let mut messages = vec![ChatMessage::system("You exceeded max steps.")];
        messages.extend(context.iter().cloned());
        messages.push(ChatMessage::user(format!(
            "Here is the work done on the current task:\n{}",
            transcript(&state.messages)
        )));
        messages.push(ChatMessage::user(
            "Please summarize all executed steps and do your best to achieve the main goal while responding with the final answer",
        ));

        let format = ResponseFormat::new().shape(
            "task_result",
            "The final result of the task",
            json!({
                "type": "object",
                "properties": {
                    "final_answer": {
                        "type": "string",
                        "description": "The final result of the task"
                    }
                },
                "required": ["final_answer"]
            }),
        );

        let FallbackResponse::TaskResult(result) =
            schema::request(provider, ChatRequest::new(messages, format)).await?;
        tracing::warn!(agent = %state.agent, "Iteration budget exhausted, finishing with summary");
        Ok(state.finish(ChatMessage::assistant(result.final_answer)))
    }
}
