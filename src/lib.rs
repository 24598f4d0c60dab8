//! mempool-miner: block assembly and proof-of-work mining in Rust
//!
//! This crate turns a pool of pending transactions into a mined block:
//! - Canonical binary transaction and 80-byte header encoding
//! - Double SHA-256 ids and merkle roots
//! - secp256k1 signature checks behind a pluggable verifier
//! - Value-balance validation and fee accounting
//! - Greedy size-bounded packing behind a height-committing coinbase
//! - Bounded nonce search, optionally across worker threads
//!
//! # Example
//!
//! ```rust
//! use mempool_miner::core::DifficultyTarget;
//! use mempool_miner::crypto::TrustingVerifier;
//! use mempool_miner::mining::{AssemblerConfig, BlockAssembler, ProofOfWorkMiner};
//!
//! let config = AssemblerConfig {
//!     target: DifficultyTarget::MAX,
//!     ..AssemblerConfig::default()
//! };
//! let assembler = BlockAssembler::new(config, TrustingVerifier, ProofOfWorkMiner::new());
//!
//! // Mine an empty block: just the coinbase
//! let mined = assembler.assemble(&[], [0u8; 32]).unwrap();
//! println!("Mined {} with fee {}", mined.hash_hex(), mined.total_fee);
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod storage;

// Re-export commonly used types
pub use core::{
    Block, BlockHeader, DifficultyTarget, PendingTransaction, Transaction, TransactionValidator,
    ValidationResult, MAX_BLOCK_SIZE,
};
pub use crypto::{KeyPair, Secp256k1Verifier, SignatureVerifier, TrustingVerifier};
pub use mining::{AssemblerConfig, BlockAssembler, Mempool, MinedBlock, ProofOfWorkMiner};
pub use storage::write_output;
