//! Bridgeflow CLI entry point.

use anyhow::Context as _;
use bridgeflow::catalog::AgentCatalog;
use bridgeflow::config::Config;
use bridgeflow::sync::HttpAgentStore;
use bridgeflow::{BridgeContext, GraphController};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bridgeflow")]
#[command(about = "Expand and lay out the agent flow of a bridge")]
struct Cli {
    /// Agent listing JSON (array of agent records)
    #[arg(long)]
    catalog: std::path::PathBuf,

    /// Id of the master agent wired to the bridge
    #[arg(long)]
    agent: String,

    /// Bridge id the flow belongs to (defaults to the agent id)
    #[arg(long)]
    bridge: Option<String>,

    /// Version currently open in the editor
    #[arg(long)]
    open_version: Option<String>,

    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    let listing = std::fs::read_to_string(&cli.catalog)
        .with_context(|| format!("failed to read catalog {}", cli.catalog.display()))?;
    let catalog = AgentCatalog::from_json(&listing).context("failed to parse catalog")?;
    tracing::info!(agents = catalog.len(), "catalog loaded");

    let master = catalog
        .get(&cli.agent)
        .cloned()
        .with_context(|| format!("agent {} not in catalog", cli.agent))?;

    let mut bridge = BridgeContext::new(cli.bridge.unwrap_or_else(|| cli.agent.clone()));
    if let Some(version) = cli.open_version {
        bridge = bridge.with_open_version(version);
    }

    let store = HttpAgentStore::from_config(&config.sync).context("failed to set up agent API client")?;
    let mut controller = GraphController::new(config, catalog, bridge.clone());

    let transaction = match store {
        Some(store) => controller
            .load_flow_resolved(bridge, Some(master), &store)
            .await
            .context("flow load was superseded")?,
        None => controller.load_flow(bridge, Some(master)),
    };

    for signal in &transaction.signals {
        tracing::debug!(?signal, kind = ?signal.kind(), "expansion signal");
    }
    tracing::info!(
        nodes = transaction.added.len(),
        edges = transaction.edges_added.len(),
        skipped = transaction.signals.len(),
        "flow expanded"
    );

    println!("{}", serde_json::to_string_pretty(controller.graph())?);
    Ok(())
}
