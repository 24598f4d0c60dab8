//! CLI commands for the miner
//!
//! Implements all command handlers for the CLI interface.

use crate::cli::config::MinerConfig;
use crate::core::{
    BlockHeader, DifficultyTarget, TransactionValidator, ValidationResult, BLOCK_HEADER_SIZE,
};
use crate::crypto::{Secp256k1Verifier, SignatureVerifier, TrustingVerifier};
use crate::mining::{BlockAssembler, Mempool, MinedBlock};
use crate::storage::write_output;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Pick the signature verifier the configuration asks for
pub fn verifier(config: &MinerConfig) -> Box<dyn SignatureVerifier> {
    if config.trust_signatures {
        Box::new(TrustingVerifier)
    } else {
        Box::new(Secp256k1Verifier::new())
    }
}

/// Load the mempool, assemble and mine a block, and write the output file
pub fn run_mine(config: &MinerConfig) -> CliResult<MinedBlock> {
    let mempool = Mempool::load_dir(&config.mempool_dir)?;
    let prev_block_hash = config.prev_block_hash()?;

    let assembler =
        BlockAssembler::new(config.assembler_config(), verifier(config), config.miner());
    let mined = assembler.assemble(mempool.transactions(), prev_block_hash)?;

    write_output(&config.output, &mined)?;
    Ok(mined)
}

/// Mine one block from the mempool directory
pub fn cmd_mine(config: &MinerConfig) -> CliResult<()> {
    println!(
        "⛏️  Mining block {} from {:?} for: {}",
        config.block_height, config.mempool_dir, config.payout_address
    );
    println!("   Target: {}", config.target);
    if config.trust_signatures {
        println!("   ⚠️  Signature checks disabled");
    }

    let mined = run_mine(config)?;

    println!("\n   Block {} mined!", config.block_height);
    println!("   ├─ Hash: {}", mined.hash_hex());
    println!("   ├─ Nonce: {}", mined.header().nonce);
    println!("   ├─ Transactions: {}", mined.tx_ids.len());
    println!("   ├─ Size: {} bytes", mined.block_size);
    println!("   ├─ Total fee: {}", mined.total_fee);
    println!("   ├─ Rounds: {}", mined.rounds);
    println!("   ├─ Attempts: {}", mined.stats.hash_attempts);
    println!("   └─ Hash rate: {:.2} H/s", mined.stats.hash_rate);
    println!("\n📝 Output written to {:?}", config.output);

    Ok(())
}

/// Report the verdict for every pending transaction
pub fn cmd_validate(config: &MinerConfig) -> CliResult<()> {
    let mempool = Mempool::load_dir(&config.mempool_dir)?;
    let validator = TransactionValidator::new(verifier(config));

    println!("🔍 Validating {} pending transactions...", mempool.len());

    let mut valid = 0usize;
    for (path, tx) in mempool.entries() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match validator.validate(tx) {
            ValidationResult::Valid { fee } => {
                valid += 1;
                println!("   ✅ {} (fee {})", name, fee);
            }
            ValidationResult::Invalid { reason } => {
                println!("   ❌ {}: {}", name, reason);
            }
        }
    }

    println!(
        "\n📊 {} valid, {} invalid, {} unreadable",
        valid,
        mempool.len() - valid,
        mempool.skipped()
    );
    Ok(())
}

/// Decode an 80-byte header from hex
pub fn decode_header(header_hex: &str) -> CliResult<BlockHeader> {
    let bytes = hex::decode(header_hex.trim())?;
    let bytes: [u8; BLOCK_HEADER_SIZE] = bytes.as_slice().try_into().map_err(|_| {
        format!(
            "Header must be {} bytes, got {}",
            BLOCK_HEADER_SIZE,
            bytes.len()
        )
    })?;
    Ok(BlockHeader::deserialize(&bytes))
}

/// Print the hash and fields of a serialized header
pub fn cmd_hash_header(header_hex: &str) -> CliResult<()> {
    let header = decode_header(header_hex)?;
    let target = DifficultyTarget::from_compact(header.bits);

    println!("🧱 Block header");
    println!("   ├─ Hash: {}", header.hash_hex());
    println!("   ├─ Version: {}", header.version);
    println!("   ├─ Previous: {}", hex::encode(header.prev_block_hash));
    println!("   ├─ Merkle root: {}", hex::encode(header.merkle_root));
    println!("   ├─ Timestamp: {}", header.timestamp);
    println!("   ├─ Bits: {:#010x} (target {})", header.bits, target);
    println!("   ├─ Nonce: {}", header.nonce);
    if header.is_valid_pow() {
        println!("   └─ ✅ Meets its target");
    } else {
        println!("   └─ ❌ Does not meet its target");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PendingTransaction, Transaction, TransactionInput, TransactionOutput};
    use crate::crypto::p2pkh_script_sig;
    use crate::storage::read_output;
    use std::fs;
    use tempfile::TempDir;

    fn write_pending(dir: &std::path::Path, name: &str, input: u64, output: u64) -> Transaction {
        let tx = Transaction::new(
            vec![TransactionInput::spend(
                [7u8; 32],
                1,
                p2pkh_script_sig(&[0x30; 70], &[0x03; 33]),
            )],
            vec![TransactionOutput {
                value: output,
                script_pubkey: vec![0x76, 0xa9],
            }],
        );
        let pending = PendingTransaction::from_transaction(&tx, &[input]);
        fs::write(dir.join(name), serde_json::to_string_pretty(&pending).unwrap()).unwrap();
        tx
    }

    fn config(dir: &TempDir) -> MinerConfig {
        let mempool_dir = dir.path().join("mempool");
        fs::create_dir(&mempool_dir).unwrap();
        MinerConfig {
            mempool_dir,
            output: dir.path().join("output.txt"),
            target: DifficultyTarget::MAX,
            trust_signatures: true,
            ..MinerConfig::default()
        }
    }

    #[test]
    fn test_run_mine_writes_output() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let good = write_pending(&config.mempool_dir, "a.json", 50, 48);
        write_pending(&config.mempool_dir, "b.json", 100, 101);

        let mined = run_mine(&config).unwrap();
        assert_eq!(mined.total_fee, 52);

        let record = read_output(&config.output).unwrap();
        assert_eq!(record.block_hash, mined.hash_hex());
        assert_eq!(record.tx_ids.len(), 2);
        assert_eq!(record.tx_ids[1], good.id_hex().unwrap());
    }

    #[test]
    fn test_secp_verifier_rejects_placeholder_signatures() {
        let dir = TempDir::new().unwrap();
        let config = MinerConfig {
            trust_signatures: false,
            ..config(&dir)
        };
        write_pending(&config.mempool_dir, "a.json", 50, 48);

        let mined = run_mine(&config).unwrap();
        assert_eq!(mined.tx_ids.len(), 1);
        assert_eq!(mined.total_fee, 50);
    }

    #[test]
    fn test_run_mine_missing_mempool() {
        let dir = TempDir::new().unwrap();
        let config = MinerConfig {
            mempool_dir: dir.path().join("nope"),
            ..MinerConfig::default()
        };
        assert!(run_mine(&config).is_err());
    }

    #[test]
    fn test_decode_header() {
        let header = BlockHeader {
            version: 1,
            prev_block_hash: [1u8; 32],
            merkle_root: [2u8; 32],
            timestamp: 1_231_006_505,
            bits: 0x1d00ffff,
            nonce: 2_083_236_893,
        };
        let hex_str = hex::encode(header.serialize());

        assert_eq!(decode_header(&hex_str).unwrap(), header);
        assert!(decode_header(&hex_str[..158]).is_err());
        assert!(decode_header("not hex").is_err());
    }
}
