//! Workflow state tree.
//!
//! A [`WorkflowState`] is the progress of one task or sub-task. Every
//! transition builds a new value; nothing here mutates a state in place.
//! Message logs are structurally shared ([`Conversation`] is copy-on-write), so
//! keeping the previous tree around for telemetry costs one reference count per
//! node rather than a deep copy.
//!
//! # Invariants
//! - The first message of a node is its originating request and never changes
//! - A `Finished` node holds exactly `[request, final response]`
//! - A `Paused` node's last message is a tool-call request
//! - A node with children is a container: it is not advanced by its own agent
//!   until every child has finished
//!
//! States contain no live resources and round-trip through serde, which is
//! what allows pausing a run in one process and resuming it in another.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::CoreRole;
use crate::llm::ChatMessage;
use crate::workflow::Workflow;

/// Status of a workflow node.
///
/// # State Machine
/// ```text
/// Idle/Running -> Paused    (tool call emitted)
/// Paused       -> Running   (all calls resolved)
/// Running      -> Running   (next step, handoff, delegation)
/// Running      -> Finished  (step done, planner done, fallback)
/// Finished, Failed          (terminal)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// No work has been started yet
    #[default]
    Idle,
    /// Work is in progress
    Running,
    /// Waiting for tool results
    Paused,
    /// Work is complete
    Finished,
    /// Work has failed
    Failed,
}

impl WorkflowStatus {
    /// Check if the node can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Finished | WorkflowStatus::Failed)
    }

    /// Check if the responsible agent should be invoked.
    pub fn is_active(&self) -> bool {
        matches!(self, WorkflowStatus::Idle | WorkflowStatus::Running)
    }
}

/// Ordered, structurally shared message log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation(Arc<Vec<ChatMessage>>);

impl Conversation {
    /// Start a conversation with its originating request.
    pub fn new(request: ChatMessage) -> Self {
        Self(Arc::new(vec![request]))
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self(Arc::new(messages))
    }

    /// The originating request.
    pub fn request(&self) -> Option<&ChatMessage> {
        self.0.first()
    }

    /// Return a new log with `messages` appended.
    pub fn with(&self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.0).extend(messages);
        next
    }

    /// Whether both logs are the same allocation.
    pub fn shares_with(&self, other: &Conversation) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Conversation {
    type Target = [ChatMessage];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<ChatMessage> for Conversation {
    fn from_iter<I: IntoIterator<Item = ChatMessage>>(iter: I) -> Self {
        Self::from_messages(iter.into_iter().collect())
    }
}

/// Progress of one task or sub-task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub status: WorkflowStatus,
    /// Name of the agent responsible for this node.
    pub agent: String,
    pub messages: Conversation,
    /// Delegated sub-tasks, advanced concurrently.
    #[serde(default)]
    pub children: Vec<WorkflowState>,
    /// Set when the node finished because its agent failed and the failure
    /// was recovered into the final message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowState {
    /// Create an idle node owned by `agent`.
    pub fn child(agent: impl Into<String>, messages: Conversation) -> Self {
        Self {
            status: WorkflowStatus::Idle,
            agent: agent.into(),
            messages,
            children: Vec::new(),
            error: None,
        }
    }

    /// Finish the node: the log collapses to `[request, response]`.
    pub fn finish(&self, response: ChatMessage) -> Self {
        let messages = self
            .messages
            .request()
            .cloned()
            .into_iter()
            .chain(std::iter::once(response))
            .collect();
        Self {
            status: WorkflowStatus::Finished,
            agent: self.agent.clone(),
            messages,
            children: Vec::new(),
            error: None,
        }
    }

    /// Finish the node with an error text as its final answer.
    pub fn recover(&self, error: impl std::fmt::Display) -> Self {
        let text = error.to_string();
        Self {
            error: Some(text.clone()),
            ..self.finish(ChatMessage::assistant(text))
        }
    }

    /// Mark the node as failed. Not produced by the built-in agents.
    pub fn fail(&self, reason: impl Into<String>) -> Self {
        Self {
            status: WorkflowStatus::Failed,
            error: Some(reason.into()),
            ..self.clone()
        }
    }

    /// Delegate each `(agent, request)` pair to a new idle child and wait for them.
    pub fn delegate(&self, requests: Vec<(String, ChatMessage)>) -> Self {
        Self {
            status: WorkflowStatus::Running,
            children: requests
                .into_iter()
                .map(|(agent, request)| Self::child(agent, Conversation::new(request)))
                .collect(),
            ..self.clone()
        }
    }

    /// Hand the node over to `agent`, keeping the same messages.
    pub fn handoff(&self, agent: impl Into<String>) -> Self {
        Self::child(agent, self.messages.clone())
    }

    /// Check whether this node or any descendant waits for tool results.
    pub fn has_paused_status(&self) -> bool {
        self.status == WorkflowStatus::Paused
            || self.children.iter().any(WorkflowState::has_paused_status)
    }

    /// First failed node of this subtree, depth first.
    pub fn failed_node(&self) -> Option<&WorkflowState> {
        if self.status == WorkflowStatus::Failed {
            return Some(self);
        }
        self.children.iter().find_map(WorkflowState::failed_node)
    }

    /// Content of the last message, i.e. the answer of a finished root.
    pub fn solution(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }

    /// Number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(WorkflowState::node_count)
            .sum::<usize>()
    }
}

/// Create the root node of a run: owned by the planner, with a single request
/// describing the workflow.
pub fn root_state(workflow: &Workflow) -> WorkflowState {
    let request = format!(
        r#"Here is description of my workflow:
<workflow>
{description}
Create {output}
</workflow>

Here is all the knowledge available:
<knowledge>{knowledge}</knowledge>"#,
        description = workflow.description,
        output = workflow.output,
        knowledge = workflow.knowledge.as_deref().unwrap_or_default(),
    );
    WorkflowState::child(
        CoreRole::Supervisor.name(),
        Conversation::new(ChatMessage::user(request)),
    )
}
