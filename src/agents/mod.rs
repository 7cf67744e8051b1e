//! Agents advance workflow nodes.
//!
//! # Agent Types
//! - **Supervisor**: planner owning the root node; delegates one task at a time
//! - **ResourcePlanner**: router; hands a task over to the best user agent
//! - **FinalBoss**: fallback for nodes that exceeded the iteration budget
//! - **WorkerAgent**: user-defined agent with a description and tools
//!
//! # Design Principles
//! - An agent never mutates the node it is given; it returns the next node
//! - One invocation is one step; the iterator decides when to call again
//! - Structured results only: every model answer is one of the named shapes
//!   declared at the call site

mod final_boss;
mod resource_planner;
mod supervisor;
mod types;
mod worker;

pub use final_boss::FinalBoss;
pub use resource_planner::ResourcePlanner;
pub use supervisor::Supervisor;
pub use types::{AgentError, CoreRole};
pub use worker::WorkerAgent;

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{ChatMessage, Provider};
use crate::state::WorkflowState;
use crate::tools::ToolRegistry;
use crate::workflow::Workflow;

/// Base trait for all agents.
///
/// # Invariants
/// - `run()` returns the next value of `state`; the input is left untouched
/// - `run()` never panics; all errors are returned as `Err`
#[async_trait]
pub trait Agent: Send + Sync {
    /// Get a human-readable description of this agent, shown to the router.
    fn description(&self) -> &str;

    /// Tools this agent may call.
    fn tools(&self) -> &ToolRegistry;

    /// Provider overriding the workflow's provider for this agent.
    fn provider(&self) -> Option<Arc<dyn Provider>> {
        None
    }

    /// Advance `state` by one step.
    ///
    /// # Preconditions
    /// - `state.status` is `Idle` or `Running`
    /// - `state.children` is empty
    ///
    /// `context` holds the messages of every ancestor node, root first.
    async fn run(
        &self,
        provider: &dyn Provider,
        state: &WorkflowState,
        context: &[ChatMessage],
        workflow: &Workflow,
    ) -> Result<WorkflowState, AgentError>;
}
