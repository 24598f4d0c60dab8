//! Coinbase transaction construction
//!
//! The coinbase is the first transaction of every block. It has no real
//! input; its single input carries the block height so that coinbases at
//! different heights never share an id.

use crate::core::{InputSource, Transaction, TransactionInput, TransactionOutput, SEQUENCE_FINAL};

/// Builds reward transactions for a fixed block reward
#[derive(Debug, Clone, Copy)]
pub struct CoinbaseFactory {
    reward: u64,
}

impl CoinbaseFactory {
    pub fn new(reward: u64) -> Self {
        Self { reward }
    }

    pub fn reward(&self) -> u64 {
        self.reward
    }

    /// Create the coinbase paying the reward to `payout_script`
    pub fn create(&self, block_height: u64, payout_script: &[u8]) -> Transaction {
        let input = TransactionInput {
            source: InputSource::Coinbase {
                height_payload: encode_block_height(block_height),
            },
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        };

        let output = TransactionOutput {
            value: self.reward,
            script_pubkey: payout_script.to_vec(),
        };

        Transaction::new(vec![input], vec![output])
    }
}

/// Encode the height as a script push: length byte, then minimal
/// little-endian bytes (BIP34 style)
pub fn encode_block_height(height: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(9);
    let mut n = height;
    while n > 0 {
        bytes.push((n & 0xFF) as u8);
        n >>= 8;
    }

    // Keep the top bit clear so the number is not read as negative
    if bytes.last().is_some_and(|&last| last & 0x80 != 0) {
        bytes.push(0x00);
    }

    let mut payload = Vec::with_capacity(bytes.len() + 1);
    payload.push(bytes.len() as u8);
    payload.extend_from_slice(&bytes);
    payload
}
