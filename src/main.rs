use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use player_ledger::cli::{self, Cli, Commands};
use player_ledger::config::{ConfigSource, LedgerConfig};
use player_ledger::node::LedgerNode;

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config: config_path, rpc_port, db_path } => {
            // Loading runs before the subscriber exists; its outcome is logged below.
            let (mut config, source) = match LedgerConfig::load_or_default(&config_path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    init_tracing("info");
                    error!("Refusing to start: {}", e);
                    std::process::exit(1);
                }
            };
            if let Some(port) = rpc_port {
                config.node.rpc_port = port;
            }
            if let Some(path) = db_path {
                config.node.db_path = path;
            }

            init_tracing(&config.node.log_level);
            match source {
                ConfigSource::File => info!("Config loaded from {}", config_path),
                ConfigSource::CreatedDefault => info!("Config file not found; wrote defaults to {}", config_path),
                ConfigSource::DefaultUnwritten(e) => warn!("Config file not found; running on defaults: {}", e),
            }

            let node = match LedgerNode::new(config) {
                Ok(node) => node,
                Err(e) => {
                    error!("Failed to start ledger: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = node.run().await {
                error!("RPC server failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Keys { cmd } => {
            if let Err(e) = cli::keys::handle_keys_command(cmd) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
