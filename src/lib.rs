//! # Teamwork
//!
//! Multi-agent workflow engine: a team of language-model-backed agents jointly
//! satisfies a described goal.
//!
//! ## Architecture
//!
//! ```text
//!   supervisor (root, plans next task)
//!      └─▶ resourcePlanner (picks an agent) ──handoff──▶ worker
//!                                                          │
//!                                       paused ◀── tool calls
//!                                          │
//!                                          ▼ results
//!                                       running ──▶ finished ──▶ merged into root
//! ```
//!
//! ## Execution Flow
//! 1. Build a [`Workflow`] (goal, team, knowledge, budget)
//! 2. Create the root state with [`root_state`]
//! 3. Call [`iterate`] repeatedly, or let [`teamwork`] loop until finished
//! 4. Read the answer with [`WorkflowState::solution`]
//!
//! With [`ToolMode::Suspend`] the driver stops at the first paused node; the
//! state is plain data and can be stored, answered with [`add_tool_response`],
//! promoted with [`resume_completed_tool_calls`] and resumed later.
//!
//! ## Modules
//! - `llm`: provider seam, message model, structured responses
//! - `state`: workflow state tree and transitions
//! - `agents`: planner, router, fallback and worker agents
//! - `tools`: tool trait, registry and built-in tools
//! - `iterate` / `teamwork`: one-step iterator and driver loop

pub mod agents;
pub mod config;
pub mod error;
pub mod iterate;
pub mod llm;
pub mod messages;
pub mod state;
pub mod telemetry;
pub mod teamwork;
pub mod tool_calls;
pub mod tools;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::WorkflowError;
pub use iterate::{iterate, run};
pub use state::{root_state, Conversation, WorkflowState, WorkflowStatus};
pub use teamwork::{run_workflow, teamwork, ToolMode};
pub use tool_calls::{
    add_tool_response, get_all_missing_tool_calls, resume_completed_tool_calls, run_tools,
};
pub use workflow::{Team, Workflow, WorkflowBuilder, WorkflowDefinition};

/// Content of the last message of `state`: the final answer of a finished run.
pub fn solution(state: &WorkflowState) -> Option<&str> {
    state.solution()
}
