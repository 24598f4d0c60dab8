//! Pending transaction validation
//!
//! Checks run in a fixed order and stop at the first failure:
//! structure, then value balance, then input signatures.

use crate::core::transaction::{PendingTransaction, Transaction};
use crate::crypto::{double_sha256, parse_p2pkh_script_sig, Hash, SignatureVerifier};
use log::debug;
use thiserror::Error;

/// Why a transaction was excluded
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("malformed structure")]
    MalformedStructure,
    #[error("outputs exceed inputs")]
    UnbalancedValue,
    #[error("bad signature")]
    BadSignature,
}

/// Outcome of validating one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Valid { fee: u64 },
    Invalid { reason: RejectReason },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }
}

/// A transaction that passed every check, with its derived data cached
#[derive(Debug, Clone)]
pub struct ValidatedTransaction {
    pub tx: Transaction,
    pub id: Hash,
    /// Canonical encoded size in bytes
    pub size: usize,
    pub fee: u64,
}

/// Validates pending transactions against an injected signature verifier
pub struct TransactionValidator<V> {
    verifier: V,
}

impl<V: SignatureVerifier> TransactionValidator<V> {
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }

    /// Validate and report the verdict
    pub fn validate(&self, pending: &PendingTransaction) -> ValidationResult {
        match self.check(pending) {
            Ok(valid) => ValidationResult::Valid { fee: valid.fee },
            Err(reason) => ValidationResult::Invalid { reason },
        }
    }

    /// Validate and keep the canonical transaction for block assembly
    pub fn check(
        &self,
        pending: &PendingTransaction,
    ) -> Result<ValidatedTransaction, RejectReason> {
        // 1. Structure
        let tx = pending.to_transaction().map_err(|e| {
            debug!("Malformed transaction: {}", e);
            RejectReason::MalformedStructure
        })?;
        if tx.version == 0 || tx.inputs.is_empty() || tx.outputs.is_empty() {
            debug!(
                "Malformed transaction: version {}, {} inputs, {} outputs",
                tx.version,
                tx.inputs.len(),
                tx.outputs.len()
            );
            return Err(RejectReason::MalformedStructure);
        }
        // Only the assembler's own coinbase may carry a height payload
        if tx.inputs.iter().any(|input| input.is_coinbase()) {
            debug!("Malformed transaction: pending record claims a coinbase input");
            return Err(RejectReason::MalformedStructure);
        }
        let input_values = pending.input_values().map_err(|e| {
            debug!("Malformed transaction: {}", e);
            RejectReason::MalformedStructure
        })?;
        let bytes = tx.serialize().map_err(|e| {
            debug!("Unencodable transaction: {}", e);
            RejectReason::MalformedStructure
        })?;
        let id = double_sha256(&bytes);

        // 2. Balance
        let total_in = input_values
            .iter()
            .try_fold(0u64, |acc, v| acc.checked_add(*v));
        let fee = match (total_in, tx.total_output()) {
            (Some(total_in), Some(total_out)) if total_out <= total_in => total_in - total_out,
            (total_in, total_out) => {
                debug!(
                    "Unbalanced transaction {}: inputs {:?}, outputs {:?}",
                    hex::encode(id),
                    total_in,
                    total_out
                );
                return Err(RejectReason::UnbalancedValue);
            }
        };

        // 3. Authorization
        for (index, input) in tx.inputs.iter().enumerate() {
            let (signature, public_key) = parse_p2pkh_script_sig(&input.script_sig).map_err(|e| {
                debug!("Input {} of {}: {}", index, hex::encode(id), e);
                RejectReason::BadSignature
            })?;
            if !self.verifier.verify(signature, &id, public_key) {
                debug!("Input {} of {}: signature rejected", index, hex::encode(id));
                return Err(RejectReason::BadSignature);
            }
        }

        Ok(ValidatedTransaction {
            tx,
            id,
            size: bytes.len(),
            fee,
        })
    }
}
