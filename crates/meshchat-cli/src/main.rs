//! MeshChat demo CLI entry point

use clap::Parser;
use tracing::info;

use meshchat_cli::{app::DemoApp, cli::Cli, config::AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            AppConfig::load_from_file(path)?
        }
        None => AppConfig::default(),
    };

    let peer_count = cli.peers.unwrap_or(config.demo.peers).max(1);
    let message = cli
        .message
        .clone()
        .unwrap_or_else(|| config.demo.message.clone());

    let app = DemoApp::new(config);
    app.run(peer_count, cli.name, message).await?;

    info!("meshchat demo finished");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}
