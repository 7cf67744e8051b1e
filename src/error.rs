//! Errors that abort a workflow run.

use thiserror::Error;

use crate::agents::AgentError;
use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent name is reserved for a core role: {0}")]
    ReservedAgentName(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Agent {agent} failed: {source}")]
    Agent {
        agent: String,
        #[source]
        source: AgentError,
    },

    #[error("Workflow failed at agent {agent}: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Failed {
        agent: String,
        reason: Option<String>,
    },

    #[error("Invalid workflow definition: {0}")]
    Definition(String),
}
