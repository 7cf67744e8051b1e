//! Core types for the agent system.

use crate::llm::LlmError;

/// Built-in roles every team contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreRole {
    /// Planner: picks the next task or declares the workflow complete
    Supervisor,
    /// Router: picks the user agent best suited for a task
    ResourcePlanner,
    /// Fallback: summarizes and finishes a node that exceeded its budget
    FinalBoss,
}

impl CoreRole {
    pub const ALL: [CoreRole; 3] = [
        CoreRole::Supervisor,
        CoreRole::ResourcePlanner,
        CoreRole::FinalBoss,
    ];

    /// Name of the role inside a team.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::ResourcePlanner => "resourcePlanner",
            Self::FinalBoss => "finalBoss",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.name() == name)
    }

    /// Check if `name` is reserved for a core role.
    pub fn is_core(name: &str) -> bool {
        Self::from_name(name).is_some()
    }
}

impl std::fmt::Display for CoreRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur while an agent advances its node.
///
/// Only provider contract violations and unparseable responses are fatal.
/// Everything else is recovered by the iterator, which finishes the node with
/// the error text as its answer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The model reported it cannot complete the task.
    #[error("{0}")]
    Declined(String),

    #[error("No agents available to take the task")]
    NoCandidates,

    #[error("{0}")]
    Custom(String),
}

impl AgentError {
    /// Check if the error must abort the run instead of being recovered.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_fatal(),
            _ => false,
        }
    }
}
