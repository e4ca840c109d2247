use clap::Subcommand;
use thiserror::Error;
use crate::account::LedgerWrite;
use crate::crypto::{self, bytes32_hex, parse_bytes32, Address, CryptoError, KeyPair};

#[derive(Error, Debug)]
pub enum KeysError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("invalid write: {0}")]
    InvalidWrite(#[from] serde_json::Error),
}

#[derive(Subcommand, Debug, Clone)]
pub enum KeysCommands {
    /// Generate a new secp256k1 key
    Generate,
    /// Print the address of a secret key
    Address {
        #[clap(long)]
        secret: String,
    },
    /// Print the lifecycle message hash for (account, salt, timestamp)
    Hash {
        #[clap(long)]
        account: String,
        #[clap(long)]
        salt: String,
        #[clap(long)]
        timestamp: u64,
    },
    /// Sign the lifecycle message for (account, salt, timestamp)
    Sign {
        #[clap(long)]
        secret: String,
        #[clap(long)]
        account: String,
        #[clap(long)]
        salt: String,
        #[clap(long)]
        timestamp: u64,
    },
    /// Print the write message hash, e.g. --write '{"op":"addGold","amount":"100"}'
    HashWrite {
        #[clap(long)]
        account: String,
        #[clap(long)]
        write: String,
        #[clap(long)]
        timestamp: u64,
    },
    /// Sign an admin write for applyWrite
    SignWrite {
        #[clap(long)]
        secret: String,
        #[clap(long)]
        account: String,
        #[clap(long)]
        write: String,
        #[clap(long)]
        timestamp: u64,
    },
    /// Sign a read proof for getAccount
    SignRead {
        #[clap(long)]
        secret: String,
        #[clap(long)]
        account: String,
        #[clap(long)]
        timestamp: u64,
    },
}

/// Runs a keys subcommand and returns what should be printed.
pub fn run_keys_command(cmd: KeysCommands) -> Result<String, KeysError> {
    match cmd {
        KeysCommands::Generate => {
            let key = KeyPair::new();
            Ok(format!("Address: {}\nSecret:  {}", key.address(), key.secret_hex()))
        }
        KeysCommands::Address { secret } => Ok(KeyPair::from_secret_hex(&secret)?.address().to_string()),
        KeysCommands::Hash { account, salt, timestamp } => {
            let account: Address = account.parse()?;
            let hash = crypto::hash_lifecycle_message(&account, &parse_bytes32(&salt)?, timestamp);
            Ok(bytes32_hex(&hash))
        }
        KeysCommands::Sign { secret, account, salt, timestamp } => {
            let key = KeyPair::from_secret_hex(&secret)?;
            let account: Address = account.parse()?;
            let hash = crypto::hash_lifecycle_message(&account, &parse_bytes32(&salt)?, timestamp);
            Ok(key.sign_message(&hash)?.to_string())
        }
        KeysCommands::HashWrite { account, write, timestamp } => {
            let account: Address = account.parse()?;
            let write: LedgerWrite = serde_json::from_str(&write)?;
            Ok(bytes32_hex(&write.message(&account, timestamp)))
        }
        KeysCommands::SignWrite { secret, account, write, timestamp } => {
            let key = KeyPair::from_secret_hex(&secret)?;
            let account: Address = account.parse()?;
            let write: LedgerWrite = serde_json::from_str(&write)?;
            Ok(key.sign_message(&write.message(&account, timestamp))?.to_string())
        }
        KeysCommands::SignRead { secret, account, timestamp } => {
            let key = KeyPair::from_secret_hex(&secret)?;
            let account: Address = account.parse()?;
            let hash = crypto::hash_read_message(&account, timestamp);
            Ok(key.sign_message(&hash)?.to_string())
        }
    }
}

pub fn handle_keys_command(cmd: KeysCommands) -> Result<(), KeysError> {
    let out = run_keys_command(cmd)?;
    println!("{}", out);
    Ok(())
}
