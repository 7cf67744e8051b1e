//! Workflow description: goal, team, knowledge and execution limits.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::{Agent, CoreRole, FinalBoss, ResourcePlanner, Supervisor, WorkerAgent};
use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::error::WorkflowError;
use crate::llm::Provider;
use crate::telemetry::{Telemetry, TreeLogger};
use crate::tools::ToolRegistry;

/// Named agents of a workflow. The core roles are always present.
#[derive(Clone)]
pub struct Team {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl Team {
    /// Create a team holding only the core roles.
    pub fn new() -> Self {
        let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
        agents.insert(
            CoreRole::Supervisor.name().to_string(),
            Arc::new(Supervisor::new()),
        );
        agents.insert(
            CoreRole::ResourcePlanner.name().to_string(),
            Arc::new(ResourcePlanner::new()),
        );
        agents.insert(
            CoreRole::FinalBoss.name().to_string(),
            Arc::new(FinalBoss::new()),
        );
        Self { agents }
    }

    /// Add a user agent.
    ///
    /// # Errors
    /// Returns `WorkflowError::ReservedAgentName` if `name` belongs to a core role.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        agent: Arc<dyn Agent>,
    ) -> Result<(), WorkflowError> {
        let name = name.into();
        if CoreRole::is_core(&name) {
            return Err(WorkflowError::ReservedAgentName(name));
        }
        self.agents.insert(name, agent);
        Ok(())
    }

    /// Replace the built-in agent of a core role.
    pub fn replace_core(&mut self, role: CoreRole, agent: Arc<dyn Agent>) {
        self.agents.insert(role.name().to_string(), agent);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.get(name)
    }

    /// User agents a task can be routed to, sorted by name.
    pub fn candidates(&self) -> Vec<(&str, &Arc<dyn Agent>)> {
        let mut candidates: Vec<(&str, &Arc<dyn Agent>)> = self
            .agents
            .iter()
            .filter(|(name, _)| !CoreRole::is_core(name))
            .map(|(name, agent)| (name.as_str(), agent))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(b.0));
        candidates
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for Team {
    fn default() -> Self {
        Self::new()
    }
}

/// Static description of a goal and the team working on it.
#[derive(Clone)]
pub struct Workflow {
    pub description: String,
    /// What the workflow should produce.
    pub output: String,
    pub knowledge: Option<String>,
    pub team: Team,
    /// Provider for agents without their own.
    pub provider: Arc<dyn Provider>,
    /// Maximum message count of a node before the fallback agent takes over.
    pub max_iterations: usize,
    pub telemetry: Arc<dyn Telemetry>,
}

impl Workflow {
    pub fn builder(
        description: impl Into<String>,
        output: impl Into<String>,
        provider: Arc<dyn Provider>,
    ) -> WorkflowBuilder {
        WorkflowBuilder {
            description: description.into(),
            output: output.into(),
            knowledge: None,
            provider,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            telemetry: Arc::new(TreeLogger),
            agents: Vec::new(),
            core: Vec::new(),
        }
    }

    /// Look up the agent responsible for a node.
    pub fn agent(&self, name: &str) -> Result<&Arc<dyn Agent>, WorkflowError> {
        self.team
            .get(name)
            .ok_or_else(|| WorkflowError::UnknownAgent(name.to_string()))
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut agents: Vec<&String> = self.team.agents.keys().collect();
        agents.sort();
        f.debug_struct("Workflow")
            .field("description", &self.description)
            .field("output", &self.output)
            .field("knowledge", &self.knowledge)
            .field("agents", &agents)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

/// Builder for [`Workflow`] with the default budget and telemetry.
pub struct WorkflowBuilder {
    description: String,
    output: String,
    knowledge: Option<String>,
    provider: Arc<dyn Provider>,
    max_iterations: usize,
    telemetry: Arc<dyn Telemetry>,
    agents: Vec<(String, Arc<dyn Agent>)>,
    core: Vec<(CoreRole, Arc<dyn Agent>)>,
}

impl WorkflowBuilder {
    pub fn knowledge(mut self, knowledge: impl Into<String>) -> Self {
        self.knowledge = Some(knowledge.into());
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn agent(mut self, name: impl Into<String>, agent: impl Agent + 'static) -> Self {
        self.agents.push((name.into(), Arc::new(agent)));
        self
    }

    /// Use `agent` in place of the built-in agent for `role`.
    pub fn core_agent(mut self, role: CoreRole, agent: impl Agent + 'static) -> Self {
        self.core.push((role, Arc::new(agent)));
        self
    }

    /// # Errors
    /// Returns `WorkflowError::ReservedAgentName` if an agent added with
    /// [`WorkflowBuilder::agent`] uses a core role name.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let mut team = Team::new();
        for (role, agent) in self.core {
            team.replace_core(role, agent);
        }
        for (name, agent) in self.agents {
            team.insert(name, agent)?;
        }
        Ok(Workflow {
            description: self.description,
            output: self.output,
            knowledge: self.knowledge,
            team,
            provider: self.provider,
            max_iterations: self.max_iterations,
            telemetry: self.telemetry,
        })
    }
}

/// Serializable workflow description, typically loaded from YAML.
///
/// ```yaml
/// description: Research the latest Rust release
/// output: A short summary
/// knowledge: Prefer official sources
/// agents:
///   researcher:
///     description: Searches the web
///     tools: [http_request, current_date]
///   writer:
///     description: Writes concise reports
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub description: String,
    pub output: String,
    #[serde(default)]
    pub knowledge: Option<String>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub description: String,
    /// Names of tools from the registry passed to [`WorkflowDefinition::build`].
    #[serde(default)]
    pub tools: Vec<String>,
}

impl WorkflowDefinition {
    pub fn from_yaml(yaml: &str) -> Result<Self, WorkflowError> {
        serde_yaml::from_str(yaml).map_err(|e| WorkflowError::Definition(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::Definition(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml)
    }

    /// Build a workflow, resolving agent tools by name in `tools`.
    pub fn build(
        &self,
        provider: Arc<dyn Provider>,
        tools: &ToolRegistry,
    ) -> Result<Workflow, WorkflowError> {
        let mut builder = Workflow::builder(&self.description, &self.output, provider);
        if let Some(knowledge) = &self.knowledge {
            builder = builder.knowledge(knowledge);
        }
        if let Some(max_iterations) = self.max_iterations {
            builder = builder.max_iterations(max_iterations);
        }
        for (name, definition) in &self.agents {
            let agent = WorkerAgent::new(&definition.description)
                .with_tools(tools.select(definition.tools.as_slice())?);
            builder = builder.agent(name, agent);
        }
        builder.build()
    }
}
