//! Miner configuration
//!
//! Defaults match a local single-block run: read `./mempool`, write
//! `output.txt`, mine height 1 on top of the all-zero hash.

use crate::core::{DifficultyTarget, MAX_BLOCK_SIZE};
use crate::crypto::{hash_from_hex, Hash, ZERO_HASH};
use crate::mining::{
    AssemblerConfig, ProofOfWorkMiner, DEFAULT_BLOCK_REWARD, DEFAULT_MAX_ROUNDS, FULL_NONCE_SPACE,
};
use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a mining run needs, passed explicitly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    pub mempool_dir: PathBuf,
    pub output: PathBuf,
    pub block_height: u64,
    /// Payout identity, used verbatim as the reward output script
    pub payout_address: String,
    pub block_reward: u64,
    pub max_block_size: usize,
    pub target: DifficultyTarget,
    /// Hex hash of the parent block
    pub prev_block_hash: String,
    pub workers: usize,
    pub max_rounds: u32,
    /// Nonces tried per round
    pub max_attempts: u64,
    /// Accept every signature instead of checking secp256k1
    pub trust_signatures: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            mempool_dir: PathBuf::from("./mempool"),
            output: PathBuf::from("output.txt"),
            block_height: 1,
            payout_address: "miner_address".to_string(),
            block_reward: DEFAULT_BLOCK_REWARD,
            max_block_size: MAX_BLOCK_SIZE,
            target: DifficultyTarget::default(),
            prev_block_hash: hex::encode(ZERO_HASH),
            workers: 1,
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_attempts: FULL_NONCE_SPACE,
            trust_signatures: false,
        }
    }
}

impl MinerConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn prev_block_hash(&self) -> Result<Hash, StorageError> {
        hash_from_hex(&self.prev_block_hash).ok_or_else(|| {
            StorageError::InvalidData(format!(
                "Previous block hash must be 64 hex characters: {}",
                self.prev_block_hash
            ))
        })
    }

    pub fn assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig {
            block_height: self.block_height,
            payout_script: self.payout_address.as_bytes().to_vec(),
            block_reward: self.block_reward,
            max_block_bytes: self.max_block_size,
            target: self.target,
            max_rounds: self.max_rounds,
            ..AssemblerConfig::default()
        }
    }

    pub fn miner(&self) -> ProofOfWorkMiner {
        ProofOfWorkMiner::new()
            .with_max_attempts(self.max_attempts)
            .with_workers(self.workers)
    }
}
