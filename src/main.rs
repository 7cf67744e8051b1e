//! teamwork - command line entry point
//!
//! Runs a workflow described in a YAML file and prints its solution.
//!
//! ```text
//! teamwork <workflow.yaml>
//! ```

use std::sync::Arc;

use anyhow::Context;
use teamwork::tools::ToolRegistry;
use teamwork::{config::Config, run_workflow, solution, WorkflowDefinition};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teamwork=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: teamwork <workflow.yaml>")?;

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: model={}", config.default_model);

    let definition = WorkflowDefinition::load(&path)?;
    let mut workflow = definition.build(Arc::new(config.provider()), &ToolRegistry::builtin())?;
    if definition.max_iterations.is_none() {
        workflow.max_iterations = config.max_iterations;
    }

    let state = run_workflow(&workflow).await?;
    println!("{}", solution(&state).unwrap_or_default());

    Ok(())
}
