//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::WorkerAgent;
use crate::llm::{ChatRequest, LlmError, Provider, ProviderResponse};
use crate::state::WorkflowState;
use crate::telemetry::{NoopTelemetry, Telemetry};
use crate::tools::{Tool, ToolContext};
use crate::workflow::Workflow;

/// Provider replaying queued responses and recording every request.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub(crate) fn with_results(results: Vec<Result<ProviderResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ProviderResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::contract_violation(
                    "no scripted response left".to_string(),
                ))
            })
    }
}

pub(crate) fn structured(name: &str, value: Value) -> ProviderResponse {
    ProviderResponse::Structured {
        name: name.to_string(),
        value,
    }
}

/// Tool answering `echo: <text>` and counting its calls.
pub(crate) struct EchoTool {
    name: String,
    calls: AtomicUsize,
    last_context_len: AtomicUsize,
}

impl EchoTool {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
            last_context_len: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_context_len(&self) -> usize {
        self.last_context_len.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Echoes its input"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value, context: ToolContext<'_>) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_context_len
            .store(context.messages.len(), Ordering::SeqCst);
        Ok(format!("echo: {}", args["text"].as_str().unwrap_or_default()))
    }
}

/// Tool that always fails.
pub(crate) struct FailingTool {
    name: String,
}

impl FailingTool {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _args: Value, _context: ToolContext<'_>) -> anyhow::Result<String> {
        anyhow::bail!("service unavailable")
    }
}

/// Telemetry keeping every snapshot.
#[derive(Clone, Default)]
pub(crate) struct RecordingTelemetry {
    snapshots: Arc<Mutex<Vec<(WorkflowState, WorkflowState)>>>,
}

impl RecordingTelemetry {
    pub(crate) fn snapshots(&self) -> Vec<(WorkflowState, WorkflowState)> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl Telemetry for RecordingTelemetry {
    fn snapshot(&self, prev: &WorkflowState, next: &WorkflowState) {
        self.snapshots
            .lock()
            .unwrap()
            .push((prev.clone(), next.clone()));
    }
}

/// Workflow with two user agents: `researcher` (with an `echo` tool) and
/// `writer` (no tools).
pub(crate) fn test_workflow(provider: Arc<ScriptedProvider>) -> Workflow {
    Workflow::builder("Research X", "a short report", provider)
        .agent(
            "researcher",
            WorkerAgent::new("Finds facts").with_tool(Arc::new(EchoTool::new("echo"))),
        )
        .agent("writer", WorkerAgent::new("Writes reports"))
        .telemetry(Arc::new(NoopTelemetry))
        .build()
        .unwrap()
}
