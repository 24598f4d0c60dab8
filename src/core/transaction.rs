//! Transaction model and canonical binary encoding
//!
//! Transactions follow a UTXO-style shape: inputs reference prior outputs
//! (or carry a coinbase height payload), outputs pay a value to an opaque
//! script. The transaction id is always derived from the canonical bytes:
//!
//! ```text
//! version(4 LE) | n_in(1)
//!   { prev_tx_id(32) | prev_index(4 LE) | script_len(1) | script | sequence(4 LE) }*
//! n_out(1)
//!   { value(8 LE) | script_len(1) | script }*
//! lock_time(4 LE)
//! ```
//!
//! Count and length prefixes are a single byte, so scripts and input/output
//! lists are limited to 255 entries. Larger values are rejected, never
//! truncated.

use crate::crypto::{double_sha256, hash_from_hex, Hash, ZERO_HASH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Current transaction version
pub const TX_VERSION: u32 = 1;

/// Default sequence number
pub const SEQUENCE_FINAL: u32 = 0xFFFFFFFF;

/// Output index marking a coinbase input
pub const COINBASE_PREV_INDEX: u32 = 0xFFFFFFFF;

/// Largest script or count representable by a one-byte prefix
pub const MAX_PREFIXED_LEN: usize = u8::MAX as usize;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction encoding and conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Encoding overflow: {field} length {len} exceeds {max}", max = MAX_PREFIXED_LEN)]
    EncodingOverflow { field: &'static str, len: usize },
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Invalid hex in field: {0}")]
    InvalidHex(&'static str),
    #[error("Unexpected end of data while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Where an input's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Reference to an output of a previous transaction
    Outpoint { tx_id: Hash, output_index: u32 },
    /// Coinbase marker carrying the encoded block height
    Coinbase { height_payload: Vec<u8> },
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInput {
    pub source: InputSource,
    /// Signature payload (empty for coinbase)
    pub script_sig: Vec<u8>,
    /// Relay hint, not enforced
    pub sequence: u32,
}

impl TransactionInput {
    /// Input spending `output_index` of `tx_id`
    pub fn spend(tx_id: Hash, output_index: u32, script_sig: Vec<u8>) -> Self {
        Self {
            source: InputSource::Outpoint {
                tx_id,
                output_index,
            },
            script_sig,
            sequence: SEQUENCE_FINAL,
        }
    }

    /// Check if this is a coinbase input
    pub fn is_coinbase(&self) -> bool {
        matches!(self.source, InputSource::Coinbase { .. })
    }

    /// Bytes written into the length-prefixed script slot
    fn script_slot(&self) -> Vec<u8> {
        match &self.source {
            InputSource::Outpoint { .. } => self.script_sig.clone(),
            InputSource::Coinbase { height_payload } => {
                let mut slot = height_payload.clone();
                slot.extend_from_slice(&self.script_sig);
                slot
            }
        }
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    /// Amount in the smallest unit
    pub value: u64,
    /// Opaque payout condition
    pub script_pubkey: Vec<u8>,
}

// =============================================================================
// Transaction
// =============================================================================

/// A transaction in canonical form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Reserved, always 0
    pub lock_time: u32,
}

impl Transaction {
    /// Create a new transaction at the current version
    pub fn new(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Self {
        Self {
            version: TX_VERSION,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// A coinbase transaction has exactly one input and it is a coinbase marker
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Get total output amount, `None` on overflow
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }

    /// Canonical byte encoding
    pub fn serialize(&self) -> Result<Vec<u8>, TransactionError> {
        let mut data = Vec::with_capacity(64 + self.inputs.len() * 110 + self.outputs.len() * 40);

        data.extend_from_slice(&self.version.to_le_bytes());

        data.push(prefix_len("input count", self.inputs.len())?);
        for input in &self.inputs {
            match &input.source {
                InputSource::Outpoint {
                    tx_id,
                    output_index,
                } => {
                    data.extend_from_slice(tx_id);
                    data.extend_from_slice(&output_index.to_le_bytes());
                }
                InputSource::Coinbase { .. } => {
                    data.extend_from_slice(&ZERO_HASH);
                    data.extend_from_slice(&COINBASE_PREV_INDEX.to_le_bytes());
                }
            }
            let script = input.script_slot();
            data.push(prefix_len("scriptSig", script.len())?);
            data.extend_from_slice(&script);
            data.extend_from_slice(&input.sequence.to_le_bytes());
        }

        data.push(prefix_len("output count", self.outputs.len())?);
        for output in &self.outputs {
            data.extend_from_slice(&output.value.to_le_bytes());
            data.push(prefix_len("scriptPubKey", output.script_pubkey.len())?);
            data.extend_from_slice(&output.script_pubkey);
        }

        data.extend_from_slice(&self.lock_time.to_le_bytes());
        Ok(data)
    }

    /// Decode the canonical encoding; the whole slice must be consumed
    pub fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = ByteReader::new(bytes);

        let version = reader.read_u32("version")?;

        let input_count = reader.read_u8("input count")?;
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            let tx_id: Hash = reader.read_array("prev_tx_id")?;
            let output_index = reader.read_u32("prev_index")?;
            let script_len = reader.read_u8("scriptSig length")?;
            let script = reader.take(script_len as usize, "scriptSig")?.to_vec();
            let sequence = reader.read_u32("sequence")?;

            let (source, script_sig) = if tx_id == ZERO_HASH && output_index == COINBASE_PREV_INDEX
            {
                (
                    InputSource::Coinbase {
                        height_payload: script,
                    },
                    Vec::new(),
                )
            } else {
                (
                    InputSource::Outpoint {
                        tx_id,
                        output_index,
                    },
                    script,
                )
            };
            inputs.push(TransactionInput {
                source,
                script_sig,
                sequence,
            });
        }

        let output_count = reader.read_u8("output count")?;
        let mut outputs = Vec::with_capacity(output_count as usize);
        for _ in 0..output_count {
            let value = reader.read_u64("value")?;
            let script_len = reader.read_u8("scriptPubKey length")?;
            let script_pubkey = reader.take(script_len as usize, "scriptPubKey")?.to_vec();
            outputs.push(TransactionOutput {
                value,
                script_pubkey,
            });
        }

        let lock_time = reader.read_u32("lock_time")?;

        if reader.remaining() > 0 {
            return Err(TransactionError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Transaction id: double SHA-256 of the canonical bytes
    pub fn id(&self) -> Result<Hash, TransactionError> {
        Ok(double_sha256(&self.serialize()?))
    }

    /// Transaction id as a hex string
    pub fn id_hex(&self) -> Result<String, TransactionError> {
        Ok(hex::encode(self.id()?))
    }

    /// Size of the canonical encoding in bytes
    pub fn size(&self) -> Result<usize, TransactionError> {
        Ok(self.serialize()?.len())
    }
}

fn prefix_len(field: &'static str, len: usize) -> Result<u8, TransactionError> {
    u8::try_from(len).map_err(|_| TransactionError::EncodingOverflow { field, len })
}

/// Cursor over an encoded transaction
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], TransactionError> {
        if self.remaining() < n {
            return Err(TransactionError::UnexpectedEof(field));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u8; N], TransactionError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn read_u8(&mut self, field: &'static str) -> Result<u8, TransactionError> {
        Ok(self.take(1, field)?[0])
    }

    fn read_u32(&mut self, field: &'static str) -> Result<u32, TransactionError> {
        Ok(u32::from_le_bytes(self.read_array(field)?))
    }

    fn read_u64(&mut self, field: &'static str) -> Result<u64, TransactionError> {
        Ok(u64::from_le_bytes(self.read_array(field)?))
    }
}

// =============================================================================
// Pending Transaction Records
// =============================================================================

/// Input as stored in the mempool
///
/// Either `txid`/`vout` or `coinbase` identifies the source. `value` is the
/// amount of the output being spent; it feeds the balance check and is not
/// part of the canonical encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInput {
    pub txid: Option<String>,
    pub vout: Option<u32>,
    /// Hex height payload for coinbase inputs
    pub coinbase: Option<String>,
    pub value: Option<u64>,
    #[serde(rename = "scriptsig")]
    pub script_sig: Option<String>,
    pub sequence: Option<u32>,
}

/// Output as stored in the mempool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOutput {
    pub value: Option<u64>,
    #[serde(rename = "scriptpubkey")]
    pub script_pubkey: Option<String>,
}

/// Transaction record as read from the mempool
///
/// Every field may be absent in the source data. Conversion into a
/// [`Transaction`] reports the first missing field instead of filling in
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub version: Option<u32>,
    pub vin: Option<Vec<PendingInput>>,
    pub vout: Option<Vec<PendingOutput>>,
}

impl PendingTransaction {
    /// Build a record from a canonical transaction and the values of the
    /// outputs its inputs spend
    pub fn from_transaction(tx: &Transaction, input_values: &[u64]) -> Self {
        let vin = tx
            .inputs
            .iter()
            .zip(input_values)
            .map(|(input, value)| {
                let (txid, vout, coinbase) = match &input.source {
                    InputSource::Outpoint {
                        tx_id,
                        output_index,
                    } => (Some(hex::encode(tx_id)), Some(*output_index), None),
                    InputSource::Coinbase { height_payload } => {
                        (None, None, Some(hex::encode(height_payload)))
                    }
                };
                PendingInput {
                    txid,
                    vout,
                    coinbase,
                    value: Some(*value),
                    script_sig: Some(hex::encode(&input.script_sig)),
                    sequence: Some(input.sequence),
                }
            })
            .collect();

        let vout = tx
            .outputs
            .iter()
            .map(|output| PendingOutput {
                value: Some(output.value),
                script_pubkey: Some(hex::encode(&output.script_pubkey)),
            })
            .collect();

        Self {
            version: Some(tx.version),
            vin: Some(vin),
            vout: Some(vout),
        }
    }

    /// Values of the outputs spent by each input
    pub fn input_values(&self) -> Result<Vec<u64>, TransactionError> {
        self.vin
            .as_ref()
            .ok_or(TransactionError::MissingField("vin"))?
            .iter()
            .map(|input| input.value.ok_or(TransactionError::MissingField("vin.value")))
            .collect()
    }

    /// Convert into canonical form
    pub fn to_transaction(&self) -> Result<Transaction, TransactionError> {
        let version = self.version.ok_or(TransactionError::MissingField("version"))?;

        let inputs = self
            .vin
            .as_ref()
            .ok_or(TransactionError::MissingField("vin"))?
            .iter()
            .map(PendingInput::to_input)
            .collect::<Result<Vec<_>, _>>()?;

        let outputs = self
            .vout
            .as_ref()
            .ok_or(TransactionError::MissingField("vout"))?
            .iter()
            .map(PendingOutput::to_output)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time: 0,
        })
    }
}

impl PendingInput {
    fn to_input(&self) -> Result<TransactionInput, TransactionError> {
        let source = match (&self.coinbase, &self.txid) {
            (Some(payload), _) => InputSource::Coinbase {
                height_payload: decode_hex(payload, "vin.coinbase")?,
            },
            (None, Some(txid)) => InputSource::Outpoint {
                tx_id: hash_from_hex(txid).ok_or(TransactionError::InvalidHex("vin.txid"))?,
                output_index: self.vout.ok_or(TransactionError::MissingField("vin.vout"))?,
            },
            (None, None) => return Err(TransactionError::MissingField("vin.txid")),
        };

        let script_sig = self
            .script_sig
            .as_deref()
            .ok_or(TransactionError::MissingField("vin.scriptsig"))?;

        Ok(TransactionInput {
            source,
            script_sig: decode_hex(script_sig, "vin.scriptsig")?,
            sequence: self
                .sequence
                .ok_or(TransactionError::MissingField("vin.sequence"))?,
        })
    }
}

impl PendingOutput {
    fn to_output(&self) -> Result<TransactionOutput, TransactionError> {
        let script_pubkey = self
            .script_pubkey
            .as_deref()
            .ok_or(TransactionError::MissingField("vout.scriptpubkey"))?;

        Ok(TransactionOutput {
            value: self.value.ok_or(TransactionError::MissingField("vout.value"))?,
            script_pubkey: decode_hex(script_pubkey, "vout.scriptpubkey")?,
        })
    }
}

fn decode_hex(value: &str, field: &'static str) -> Result<Vec<u8>, TransactionError> {
    hex::decode(value).map_err(|_| TransactionError::InvalidHex(field))
}

// =============================================================================
// Tests
// =============================================================================
