//! Block implementation for the miner
//!
//! A block contains a fixed 80-byte header and an ordered list of
//! transactions, the first of which is always the coinbase.

use crate::core::target::DifficultyTarget;
use crate::core::transaction::{Transaction, TransactionError};
use crate::crypto::{double_sha256, Hash};
use thiserror::Error;

// =============================================================================
// Block Constants
// =============================================================================

/// Maximum block size in bytes (1MB like Bitcoin pre-SegWit)
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Block header size in bytes (80 bytes like Bitcoin)
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Header version written by the assembler
pub const BLOCK_VERSION: u32 = 1;

// =============================================================================
// Block Errors
// =============================================================================

/// Block structure errors
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Block has no coinbase transaction at position 0")]
    MissingCoinbase,
    #[error("Transaction encoding failed: {0}")]
    Encoding(#[from] TransactionError),
}

/// Block header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block version
    pub version: u32,
    /// Hash of the previous block
    pub prev_block_hash: Hash,
    /// Merkle root of all transaction ids
    pub merkle_root: Hash,
    /// Seconds since the Unix epoch
    pub timestamp: u32,
    /// Compact difficulty target
    pub bits: u32,
    /// Nonce used for proof of work
    pub nonce: u32,
}

impl BlockHeader {
    /// Canonical 80-byte encoding
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut data = [0u8; BLOCK_HEADER_SIZE];
        data[0..4].copy_from_slice(&self.version.to_le_bytes());
        data[4..36].copy_from_slice(&self.prev_block_hash);
        data[36..68].copy_from_slice(&self.merkle_root);
        data[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        data[72..76].copy_from_slice(&self.bits.to_le_bytes());
        data[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        data
    }

    /// Decode a canonical 80-byte header
    pub fn deserialize(data: &[u8; BLOCK_HEADER_SIZE]) -> Self {
        let u32_at = |offset: usize| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&data[offset..offset + 4]);
            u32::from_le_bytes(word)
        };
        let hash_at = |offset: usize| {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&data[offset..offset + 32]);
            hash
        };

        Self {
            version: u32_at(0),
            prev_block_hash: hash_at(4),
            merkle_root: hash_at(36),
            timestamp: u32_at(68),
            bits: u32_at(72),
            nonce: u32_at(76),
        }
    }

    /// Calculate the hash of the block header
    pub fn hash(&self) -> Hash {
        double_sha256(&self.serialize())
    }

    /// Hash as a hex string
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    /// Check the hash against a full-width target
    pub fn meets_target(&self, target: &DifficultyTarget) -> bool {
        target.is_met_by(&self.hash())
    }

    /// Check the hash against the target encoded in `bits`
    pub fn is_valid_pow(&self) -> bool {
        self.meets_target(&DifficultyTarget::from_compact(self.bits))
    }
}

/// A block: header plus ordered transactions
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Get the coinbase transaction (first transaction)
    pub fn coinbase_tx(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Serialized size: header followed by every transaction's canonical bytes
    pub fn size(&self) -> Result<usize, BlockError> {
        self.transactions
            .iter()
            .try_fold(BLOCK_HEADER_SIZE, |acc, tx| -> Result<usize, BlockError> {
                Ok(acc + tx.size()?)
            })
    }

    /// Transaction ids in block order
    pub fn tx_ids(&self) -> Result<Vec<Hash>, BlockError> {
        self.transactions
            .iter()
            .map(|tx| tx.id().map_err(BlockError::from))
            .collect()
    }

    /// Check the coinbase position and the header's merkle commitment
    pub fn verify_structure(&self) -> Result<bool, BlockError> {
        if self.coinbase_tx().is_none() {
            return Err(BlockError::MissingCoinbase);
        }
        if self.transactions[1..].iter().any(Transaction::is_coinbase) {
            return Ok(false);
        }
        let root = crate::crypto::calculate_merkle_root(&self.tx_ids()?);
        Ok(root == self.header.merkle_root)
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
