//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (canonical encoding, ids, mempool records)
//! - Blocks (80-byte headers, block size)
//! - Difficulty targets (fixed-width comparison, compact bits)
//! - Transaction validation

pub mod block;
pub mod target;
pub mod transaction;
pub mod validator;

pub use block::{Block, BlockError, BlockHeader, BLOCK_HEADER_SIZE, BLOCK_VERSION, MAX_BLOCK_SIZE};
pub use target::{DifficultyTarget, TargetError};
pub use transaction::{
    InputSource, PendingInput, PendingOutput, PendingTransaction, Transaction, TransactionError,
    TransactionInput, TransactionOutput, COINBASE_PREV_INDEX, SEQUENCE_FINAL, TX_VERSION,
};
pub use validator::{RejectReason, TransactionValidator, ValidatedTransaction, ValidationResult};
