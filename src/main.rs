use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Map;

use conductor::orchestration::{EchoExecutor, ExecutorRegistry};
use conductor::{AgentId, AgentRegistry, Config, Orchestrator, PlanBuilder, Result, TaskKind};

/// Conductor - request decomposition and multi-agent task orchestration
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    CONDUCTOR_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.conductor/conductor.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Submit a request, execute it on demo echo agents, print the report
    Run {
        /// The work request in natural language
        request: String,

        /// Number of demo agents to register
        #[arg(long, default_value_t = 2)]
        agents: usize,

        /// Also print the registry snapshot after execution
        #[arg(long)]
        show_agents: bool,
    },

    /// Build and print the execution plan without running it
    Plan {
        /// The work request in natural language
        request: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on debug flag
    conductor::log::init_with_debug(cli.debug);

    match cli.command {
        Command::Run {
            request,
            agents,
            show_agents,
        } => run(&request, agents, show_agents).await,
        Command::Plan { request } => plan(&request),
        Command::Config => show_config(),
    }
}

/// Execute a request against demo echo agents.
///
/// Real deployments register executors backed by actual capabilities;
/// the echo executor just demonstrates the scheduling pipeline end to
/// end with deterministic results.
async fn run(request: &str, agents: usize, show_agents: bool) -> Result<()> {
    let config = Config::load()?;

    let registry = Arc::new(AgentRegistry::with_recency_window(config.recency_window()));
    for i in 0..agents {
        registry
            .register(AgentId::new(format!("agent-{}", i + 1)), TaskKind::ALL)
            .await?;
    }

    let mut executors = ExecutorRegistry::new();
    executors.register_many(TaskKind::ALL, Arc::new(EchoExecutor));

    let orchestrator = Orchestrator::with_config(registry, Arc::new(executors), config);
    let report = orchestrator.submit_request(request, &Map::new()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if show_agents {
        let status = orchestrator.status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);
    }

    Ok(())
}

fn plan(request: &str) -> Result<()> {
    let builder = PlanBuilder::new();
    let plan = builder.build_plan(request)?;
    println!("{}", serde_json::to_string_pretty(&plan.summary())?);
    Ok(())
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
