mod workflow;

use std::path::PathBuf;

use anyhow::Result;
use bridge_host::config;
use clap::Parser;

/// Drives a real browser session with an injected wallet and RPC mediator.
#[derive(Parser, Debug)]
#[command(name = "bridge-cli")]
struct Cli {
    /// Override the config directory (defaults to the platform config dir).
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let config_dir = cli.config_dir.unwrap_or_else(config::config_dir);
    workflow::run(workflow::WorkflowArgs { config_dir })
}
