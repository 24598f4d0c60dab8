//! Mined block output file
//!
//! The file has three sections, one value per line with no trailing
//! newline: the block header hash, the serialized coinbase, then the id of
//! every included transaction starting with the coinbase. All values are
//! lowercase hex.

use crate::mining::MinedBlock;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Render the output text for a mined block
pub fn render_output(mined: &MinedBlock) -> String {
    let mut lines = Vec::with_capacity(mined.tx_ids.len() + 2);
    lines.push(mined.hash_hex());
    lines.push(mined.coinbase_hex());
    lines.extend(mined.tx_id_hexes());
    lines.join("\n")
}

/// Write the output file, replacing any previous one atomically
pub fn write_output(path: impl AsRef<Path>, mined: &MinedBlock) -> Result<(), StorageError> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .ok_or_else(|| StorageError::InvalidData(format!("Not a file path: {:?}", path)))?;

    // Write to temporary file first
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = fs::File::create(&temp_path)?;
    file.write_all(render_output(mined).as_bytes())?;
    file.sync_all()?;
    drop(file);

    // Atomic rename
    fs::rename(&temp_path, path)?;

    log::info!("Wrote block output to {:?}", path);
    Ok(())
}

/// Parsed contents of an output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub block_hash: String,
    pub coinbase: String,
    pub tx_ids: Vec<String>,
}

/// Read back an output file written by [`write_output`]
pub fn read_output(path: impl AsRef<Path>) -> Result<OutputRecord, StorageError> {
    let contents = fs::read_to_string(path)?;
    let mut lines = contents.split('\n');

    let block_hash = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| StorageError::InvalidData("Missing block hash".to_string()))?;
    let coinbase = lines
        .next()
        .ok_or_else(|| StorageError::InvalidData("Missing coinbase".to_string()))?;
    let tx_ids: Vec<String> = lines.map(str::to_string).collect();

    for value in [block_hash, coinbase].into_iter().chain(tx_ids.iter().map(String::as_str)) {
        if hex::decode(value).is_err() {
            return Err(StorageError::InvalidData(format!("Not hex: {}", value)));
        }
    }
    if tx_ids.is_empty() {
        return Err(StorageError::InvalidData("Missing coinbase id".to_string()));
    }

    Ok(OutputRecord {
        block_hash: block_hash.to_string(),
        coinbase: coinbase.to_string(),
        tx_ids,
    })
}
