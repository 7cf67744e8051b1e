//! Router agent.
//!
//! Matches the task of its node to the most capable user agent and hands the
//! node over to it. The node keeps its messages; only the owner changes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Agent, AgentError};
use crate::llm::{schema, ChatMessage, ChatRequest, Provider, ResponseFormat};
use crate::state::WorkflowState;
use crate::tools::ToolRegistry;
use crate::workflow::Workflow;

const SYSTEM_PROMPT: &str = "You are an agent selector that matches tasks to the most capable agent.
Analyze the task requirements and each agent's capabilities to select the best match.

Consider:
1. Required tools and skills
2. Agent's specialization
3. Model capabilities
4. Previous task context if available";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
enum RouterResponse {
    SelectAgent(Selection),
}

#[derive(Debug, Deserialize)]
struct Selection {
    agent: String,
    reasoning: String,
}

fn response_format(candidates: &[&str]) -> ResponseFormat {
    ResponseFormat::new().shape(
        "select_agent",
        "The agent that should work on the task",
        json!({
            "type": "object",
            "properties": {
                "agent": {"type": "string", "enum": candidates},
                "reasoning": {"type": "string"}
            },
            "required": ["agent", "reasoning"]
        }),
    )
}

/// Router choosing a user agent for a task.
#[derive(Debug, Default)]
pub struct ResourcePlanner {
    tools: ToolRegistry,
}

impl ResourcePlanner {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Agent for ResourcePlanner {
    fn description(&self) -> &str {
        "Selects the best agent for a task"
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    async fn run(
        &self,
        provider: &dyn Provider,
        state: &WorkflowState,
        _context: &[ChatMessage],
        workflow: &Workflow,
    ) -> Result<WorkflowState, AgentError> {
        let candidates = workflow.team.candidates();
        if candidates.is_empty() {
            return Err(AgentError::NoCandidates);
        }

        let agents: String = candidates
            .iter()
            .map(|(name, agent)| {
                format!("<agent name=\"{}\">{}</agent>", name, agent.description())
            })
            .collect();
        let names: Vec<&str> = candidates.iter().map(|(name, _)| *name).collect();

        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Here are the available agents:\n<agents>{}</agents>",
                agents
            )),
            ChatMessage::assistant("What is the task?"),
        ];
        messages.extend(state.messages.iter().cloned());

        let chat = ChatRequest::new(messages, response_format(&names)).with_temperature(0.1);
        let RouterResponse::SelectAgent(selection) = schema::request(provider, chat).await?;

        tracing::info!(
            agent = %selection.agent,
            reasoning = %selection.reasoning,
            "Selected agent"
        );
        Ok(state.handoff(selection.agent))
    }
}
