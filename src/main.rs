//! mempool-miner CLI Application
//!
//! Builds a block from a directory of pending transactions and mines it.

use clap::{Parser, Subcommand};
use mempool_miner::cli::{self, MinerConfig};
use mempool_miner::core::DifficultyTarget;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mempool-miner")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Assemble and mine a block from pending transactions", long_about = None)]
struct Cli {
    /// JSON configuration file (flags override its values)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory of pending transaction JSON files
    #[arg(short, long, global = true)]
    mempool: Option<PathBuf>,

    /// Accept every signature instead of checking secp256k1
    #[arg(long, global = true)]
    trust_signatures: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and mine a block, then write the output file
    Mine {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Block height committed in the coinbase
        #[arg(long)]
        height: Option<u64>,

        /// Payout identity for the block reward
        #[arg(short, long)]
        address: Option<String>,

        /// Block reward
        #[arg(long)]
        reward: Option<u64>,

        /// Maximum block size in bytes
        #[arg(long)]
        max_block_size: Option<usize>,

        /// Difficulty target as big-endian hex
        #[arg(short, long)]
        target: Option<DifficultyTarget>,

        /// Previous block hash as hex
        #[arg(long)]
        prev_hash: Option<String>,

        /// Number of mining threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Timestamp refreshes before giving up
        #[arg(long)]
        max_rounds: Option<u32>,
    },

    /// Report the verdict for every pending transaction
    Validate,

    /// Decode an 80-byte hex header and print its hash
    HashHeader {
        /// Serialized header as hex
        header: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MinerConfig::load(path)?,
        None => MinerConfig::default(),
    };
    if let Some(mempool) = cli.mempool {
        config.mempool_dir = mempool;
    }
    if cli.trust_signatures {
        config.trust_signatures = true;
    }

    match cli.command {
        Commands::Mine {
            output,
            height,
            address,
            reward,
            max_block_size,
            target,
            prev_hash,
            workers,
            max_rounds,
        } => {
            if let Some(output) = output {
                config.output = output;
            }
            if let Some(height) = height {
                config.block_height = height;
            }
            if let Some(address) = address {
                config.payout_address = address;
            }
            if let Some(reward) = reward {
                config.block_reward = reward;
            }
            if let Some(max_block_size) = max_block_size {
                config.max_block_size = max_block_size;
            }
            if let Some(target) = target {
                config.target = target;
            }
            if let Some(prev_hash) = prev_hash {
                config.prev_block_hash = prev_hash;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(max_rounds) = max_rounds {
                config.max_rounds = max_rounds;
            }
            cli::cmd_mine(&config)
        }
        Commands::Validate => cli::cmd_validate(&config),
        Commands::HashHeader { header } => cli::cmd_hash_header(&header),
    }
}
