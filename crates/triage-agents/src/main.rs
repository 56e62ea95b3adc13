//! `autocrm-triage`: run the ticket triage pipeline from the command line.
//!
//! ```bash
//! # Classify a request read from stdin
//! echo '{"id":"preview","title":"Refund","description":"Charged twice"}' \
//!     | autocrm-triage classify
//!
//! # Full pipeline on a stored ticket
//! AUTOCRM_DATABASE_URL=postgres://localhost/autocrm autocrm-triage triage 42
//!
//! # Dry run against a JSON snapshot instead of Postgres
//! autocrm-triage --seed demos/seed.json preview --input ticket.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use triage_agents::config::{check_endpoint, TriageConfig};
use triage_agents::context;
use triage_agents::{
    MemoryStore, PgStore, RigTriageModel, StageRequest, TriageError, TriageOrchestrator,
    TriageStore,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "LLM ticket triage for AutoCRM", long_about = None)]
struct Cli {
    /// TOML configuration file (environment variables still override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run against an in-memory store seeded from this JSON snapshot instead of Postgres
    #[arg(long, global = true)]
    seed: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the classification stage on a request
    Classify {
        /// Request JSON file, or `-` for stdin
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Run the routing stage on a request
    Route {
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Run the assignment stage on a request (needs `team_id`)
    Assign {
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Classify, route and assign a stored ticket
    Triage { ticket_id: String },
    /// Suggest a full triage for a ticket that does not exist yet
    Preview {
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Print live team workload and agent performance
    Stats {
        /// Only this team
        #[arg(long)]
        team: Option<String>,
    },
    /// Apply the database schema
    InitDb,
    /// Check that the model endpoint answers
    Check,
}

fn read_request(input: &str) -> Result<StageRequest> {
    let text = if input == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read request from stdin")?
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read request file {input}"))?
    };
    serde_json::from_str(&text).context("Failed to parse stage request JSON")
}

async fn open_store(config: &TriageConfig, seed: Option<&Path>) -> Result<Arc<dyn TriageStore>> {
    if let Some(seed) = seed {
        let store = MemoryStore::from_json_file(seed)?;
        info!(seed = %seed.display(), "Using in-memory store");
        return Ok(Arc::new(store));
    }
    let Some(url) = config.database_url.as_deref() else {
        bail!("No database configured: set AUTOCRM_DATABASE_URL or pass --seed");
    };
    Ok(Arc::new(PgStore::connect(url).await?))
}

async fn build_orchestrator(config: &TriageConfig, seed: Option<&Path>) -> Result<TriageOrchestrator> {
    let store = open_store(config, seed).await?;
    if seed.is_some() {
        warn!("Seeded store: writes are discarded on exit");
    }
    let model = Arc::new(RigTriageModel::from_config(config)?);
    Ok(TriageOrchestrator::new(model, store, config.clone()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Log a triage error with its kind before handing it to anyhow.
fn report(err: TriageError) -> anyhow::Error {
    error!(
        kind = %err.kind(),
        retriable = err.is_retriable(),
        "{err}"
    );
    err.into()
}

#[derive(Serialize)]
struct TeamStats {
    team_id: String,
    team_name: String,
    live_workload: u32,
    max_workload: u32,
    agents: Option<coordination::AgentInfo>,
}

async fn stats(store: &dyn TriageStore, config: &TriageConfig, only: Option<&str>) -> Result<()> {
    let info = context::get_team_info(store).await.map_err(report)?;
    let mut out = Vec::new();
    for summary in &info.teams {
        let team = &summary.team;
        if only.is_some_and(|id| id != team.id) {
            continue;
        }
        let agents = match context::get_agent_info(store, &team.id, config.history_limit).await {
            Ok(agents) => Some(agents),
            Err(TriageError::NoCandidates(_)) => None,
            Err(e) => return Err(report(e)),
        };
        out.push(TeamStats {
            team_id: team.id.clone(),
            team_name: team.name.clone(),
            live_workload: info.live_workload(&team.id),
            max_workload: team.max_workload,
            agents,
        });
    }
    if let Some(id) = only {
        if out.is_empty() {
            bail!("Unknown team {id}");
        }
    }
    print_json(&out)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = TriageConfig::load(cli.config.as_deref())?;
    info!(
        model = %config.model.model,
        endpoint = %config.model.base_url,
        prompt_version = triage_agents::prompts::PROMPT_VERSION,
        "autocrm-triage starting"
    );

    match cli.command {
        Command::Check => {
            let api_key = Some(config.model.api_key.as_str());
            if check_endpoint(&config.model.base_url, api_key).await {
                info!(endpoint = %config.model.base_url, "Model endpoint reachable");
                Ok(())
            } else {
                bail!("Model endpoint {} is not reachable", config.model.base_url)
            }
        }
        Command::InitDb => {
            let Some(url) = config.database_url.as_deref() else {
                bail!("init-db needs AUTOCRM_DATABASE_URL");
            };
            PgStore::connect(url).await?.init_schema().await?;
            Ok(())
        }
        Command::Stats { team } => {
            let store = open_store(&config, cli.seed.as_deref()).await?;
            stats(store.as_ref(), &config, team.as_deref()).await
        }
        Command::Classify { input } => {
            let request = read_request(&input)?;
            let orchestrator = build_orchestrator(&config, cli.seed.as_deref()).await?;
            print_json(&orchestrator.classify_request(&request).await.map_err(report)?)
        }
        Command::Route { input } => {
            let request = read_request(&input)?;
            let orchestrator = build_orchestrator(&config, cli.seed.as_deref()).await?;
            print_json(&orchestrator.route_request(&request).await.map_err(report)?)
        }
        Command::Assign { input } => {
            let request = read_request(&input)?;
            let orchestrator = build_orchestrator(&config, cli.seed.as_deref()).await?;
            print_json(&orchestrator.assign_request(&request).await.map_err(report)?)
        }
        Command::Preview { input } => {
            let request = read_request(&input)?;
            let orchestrator = build_orchestrator(&config, cli.seed.as_deref()).await?;
            print_json(&orchestrator.preview(request).await.map_err(report)?)
        }
        Command::Triage { ticket_id } => {
            let orchestrator = build_orchestrator(&config, cli.seed.as_deref()).await?;
            print_json(&orchestrator.triage(&ticket_id).await.map_err(report)?)
        }
    }
}
