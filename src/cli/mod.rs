pub mod keys;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "player_ledger")]
#[command(about = "Player identity and asset ledger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the JSON-RPC ledger service
    Serve {
        #[arg(long, default_value = "ledger.toml")]
        config: String,
        #[arg(long)]
        rpc_port: Option<u16>,
        #[arg(long)]
        db_path: Option<String>,
    },
    /// Key and signature tooling for off-system signers
    Keys {
        #[command(subcommand)]
        cmd: keys::KeysCommands,
    },
}
