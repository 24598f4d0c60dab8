//! Command-line front end

pub mod commands;
pub mod config;

pub use commands::{
    cmd_hash_header, cmd_mine, cmd_validate, decode_header, run_mine, verifier, CliResult,
};
pub use config::MinerConfig;
