pub mod account;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod node;
pub mod roles;
pub mod rpc;
pub mod storage;
