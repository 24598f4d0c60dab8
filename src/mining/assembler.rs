//! Block assembly
//!
//! Turns a list of pending transactions into a mined block:
//! validate, pack greedily under the size budget, commit to the included
//! ids with a merkle root, then search for a nonce. If the nonce space runs
//! out the timestamp is bumped and the search restarts, a bounded number of
//! times.

use crate::core::{
    Block, BlockHeader, DifficultyTarget, PendingTransaction, RejectReason, TransactionError,
    TransactionValidator, ValidatedTransaction, BLOCK_HEADER_SIZE, BLOCK_VERSION, MAX_BLOCK_SIZE,
};
use crate::crypto::{calculate_merkle_root, double_sha256, Hash, SignatureVerifier};
use crate::mining::coinbase::CoinbaseFactory;
use crate::mining::miner::{MineResult, MiningStats, ProofOfWorkMiner};
use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

/// Default number of timestamp refreshes before giving up
pub const DEFAULT_MAX_ROUNDS: u32 = 8;

/// Default block reward in the smallest unit
pub const DEFAULT_BLOCK_REWARD: u64 = 50;

/// Fatal assembly errors
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Proof of work exhausted after {rounds} rounds ({attempts} attempts)")]
    ProofOfWorkExhausted { rounds: u32, attempts: u64 },
    #[error("Block budget of {budget} bytes cannot hold header and coinbase ({required} bytes)")]
    BudgetTooSmall { budget: usize, required: usize },
    #[error("Coinbase encoding failed: {0}")]
    CoinbaseEncoding(#[from] TransactionError),
}

/// Parameters for one assembly
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub block_height: u64,
    /// scriptPubKey of the reward output
    pub payout_script: Vec<u8>,
    pub block_reward: u64,
    /// Budget for header plus all transactions
    pub max_block_bytes: usize,
    pub target: DifficultyTarget,
    pub block_version: u32,
    /// Timestamp refreshes allowed after the nonce space is exhausted
    pub max_rounds: u32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            block_height: 1,
            payout_script: b"miner_address".to_vec(),
            block_reward: DEFAULT_BLOCK_REWARD,
            max_block_bytes: MAX_BLOCK_SIZE,
            target: DifficultyTarget::default(),
            block_version: BLOCK_VERSION,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

/// A mined block and the figures reported about it
#[derive(Debug, Clone)]
pub struct MinedBlock {
    pub block: Block,
    pub hash: Hash,
    /// Canonical bytes of the coinbase transaction
    pub coinbase_bytes: Vec<u8>,
    /// Included ids, coinbase first
    pub tx_ids: Vec<Hash>,
    /// Block reward plus fees of the included transactions
    pub total_fee: u64,
    /// Header plus transaction bytes
    pub block_size: usize,
    pub rounds: u32,
    pub stats: MiningStats,
}

impl MinedBlock {
    pub fn header(&self) -> &BlockHeader {
        &self.block.header
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn coinbase_hex(&self) -> String {
        hex::encode(&self.coinbase_bytes)
    }

    pub fn tx_id_hexes(&self) -> Vec<String> {
        self.tx_ids.iter().map(hex::encode).collect()
    }
}

/// Seconds since the Unix epoch, clamped to the header's 32-bit field
pub fn current_timestamp() -> u32 {
    u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX)
}

/// Builds and mines blocks from pending transactions
pub struct BlockAssembler<V> {
    config: AssemblerConfig,
    validator: TransactionValidator<V>,
    miner: ProofOfWorkMiner,
    coinbase: CoinbaseFactory,
    clock: fn() -> u32,
}

impl<V: SignatureVerifier> BlockAssembler<V> {
    pub fn new(config: AssemblerConfig, verifier: V, miner: ProofOfWorkMiner) -> Self {
        let coinbase = CoinbaseFactory::new(config.block_reward);
        Self {
            config,
            validator: TransactionValidator::new(verifier),
            miner,
            coinbase,
            clock: current_timestamp,
        }
    }

    /// Replace the timestamp source
    pub fn with_clock(mut self, clock: fn() -> u32) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn validator(&self) -> &TransactionValidator<V> {
        &self.validator
    }

    /// Assemble and mine a block on top of `prev_block_hash`
    pub fn assemble(
        &self,
        pending: &[PendingTransaction],
        prev_block_hash: Hash,
    ) -> Result<MinedBlock, AssemblyError> {
        let valid = self.select_valid(pending);

        let coinbase_tx = self
            .coinbase
            .create(self.config.block_height, &self.config.payout_script);
        let coinbase_bytes = coinbase_tx.serialize()?;
        let coinbase_id = double_sha256(&coinbase_bytes);

        let (included, block_size) = self.pack(&valid, coinbase_bytes.len())?;

        let total_fee = included
            .iter()
            .fold(self.coinbase.reward(), |acc, v| acc.saturating_add(v.fee));

        let mut tx_ids = Vec::with_capacity(included.len() + 1);
        tx_ids.push(coinbase_id);
        tx_ids.extend(included.iter().map(|v| v.id));
        let merkle_root = calculate_merkle_root(&tx_ids);

        // Mine against what the header's bits expand to, not the raw target
        let target = self.config.target.normalized();
        if target != self.config.target {
            debug!(
                "Target {} rounded down to {} by compact encoding",
                self.config.target, target
            );
        }

        let mut header = BlockHeader {
            version: self.config.block_version,
            prev_block_hash,
            merkle_root,
            timestamp: (self.clock)(),
            bits: target.to_compact(),
            nonce: 0,
        };

        info!(
            "Mining block {} with {} transactions ({} bytes, target {})...",
            self.config.block_height,
            tx_ids.len(),
            block_size,
            target
        );

        let max_rounds = self.config.max_rounds.max(1);
        let mut total_attempts = 0u64;

        for round in 1..=max_rounds {
            let (result, stats) = self.miner.mine(&header, &target);
            total_attempts += result.attempts();

            match result {
                MineResult::Found {
                    header: mined,
                    hash,
                    ..
                } => {
                    info!(
                        "Block {} mined in {}ms ({} attempts, {:.2} H/s, round {})",
                        self.config.block_height,
                        stats.time_ms,
                        stats.hash_attempts,
                        stats.hash_rate,
                        round
                    );

                    let mut transactions = Vec::with_capacity(tx_ids.len());
                    transactions.push(coinbase_tx);
                    transactions.extend(included.into_iter().map(|v| v.tx));

                    return Ok(MinedBlock {
                        block: Block {
                            header: mined,
                            transactions,
                        },
                        hash,
                        coinbase_bytes,
                        tx_ids,
                        total_fee,
                        block_size,
                        rounds: round,
                        stats: MiningStats {
                            hash_attempts: total_attempts,
                            ..stats
                        },
                    });
                }
                MineResult::Exhausted { attempts } => {
                    let refreshed = (self.clock)().max(header.timestamp.saturating_add(1));
                    warn!(
                        "Nonce space exhausted after {} attempts (round {}/{}), timestamp {} -> {}",
                        attempts, round, max_rounds, header.timestamp, refreshed
                    );
                    header.timestamp = refreshed;
                    header.nonce = 0;
                }
            }
        }

        Err(AssemblyError::ProofOfWorkExhausted {
            rounds: max_rounds,
            attempts: total_attempts,
        })
    }

    /// Validate in input order, keeping only valid transactions
    fn select_valid(&self, pending: &[PendingTransaction]) -> Vec<ValidatedTransaction> {
        let mut valid = Vec::with_capacity(pending.len());
        let (mut malformed, mut unbalanced, mut bad_sig) = (0usize, 0usize, 0usize);

        for (index, tx) in pending.iter().enumerate() {
            match self.validator.check(tx) {
                Ok(v) => valid.push(v),
                Err(reason) => {
                    debug!("Excluding pending transaction #{}: {}", index, reason);
                    match reason {
                        RejectReason::MalformedStructure => malformed += 1,
                        RejectReason::UnbalancedValue => unbalanced += 1,
                        RejectReason::BadSignature => bad_sig += 1,
                    }
                }
            }
        }

        info!(
            "Validated {} pending transactions: {} valid, {} malformed, {} unbalanced, \
             {} bad signature",
            pending.len(),
            valid.len(),
            malformed,
            unbalanced,
            bad_sig
        );
        valid
    }

    /// Greedy in-order packing; the first transaction that does not fit
    /// ends packing
    fn pack(
        &self,
        valid: &[ValidatedTransaction],
        coinbase_size: usize,
    ) -> Result<(Vec<ValidatedTransaction>, usize), AssemblyError> {
        let budget = self.config.max_block_bytes;
        let mut used = BLOCK_HEADER_SIZE + coinbase_size;
        if used > budget {
            return Err(AssemblyError::BudgetTooSmall {
                budget,
                required: used,
            });
        }

        let mut included = Vec::new();
        for v in valid {
            if used + v.size > budget {
                info!(
                    "Block full: {} + {} bytes exceeds {}, {} valid transactions left out",
                    used,
                    v.size,
                    budget,
                    valid.len() - included.len()
                );
                break;
            }
            used += v.size;
            included.push(v.clone());
        }

        Ok((included, used))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Transaction, TransactionInput, TransactionOutput};
    use crate::crypto::{p2pkh_script_sig, TrustingVerifier};
    use crate::mining::coinbase::CoinbaseFactory;

    fn fixed_clock() -> u32 {
        1_700_000_000
    }

    fn pending(tag: u8, input_value: u64, outputs: &[u64]) -> PendingTransaction {
        let tx = Transaction::new(
            vec![TransactionInput::spend(
                [tag; 32],
                0,
                p2pkh_script_sig(&[0x30; 71], &[0x02; 33]),
            )],
            outputs
                .iter()
                .map(|&value| TransactionOutput {
                    value,
                    script_pubkey: vec![0x51],
                })
                .collect(),
        );
        PendingTransaction::from_transaction(&tx, &[input_value])
    }

    fn assembler(config: AssemblerConfig) -> BlockAssembler<TrustingVerifier> {
        BlockAssembler::new(config, TrustingVerifier, ProofOfWorkMiner::new())
            .with_clock(fixed_clock)
    }

    fn easy_config() -> AssemblerConfig {
        AssemblerConfig {
            target: DifficultyTarget::MAX,
            ..AssemblerConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_selection() {
        let mut malformed = pending(1, 100, &[90]);
        malformed.vin.as_mut().unwrap()[0].script_sig = None;
        let unbalanced = pending(2, 100, &[101]);
        let valid = pending(3, 50, &[48]);

        let config = AssemblerConfig {
            block_height: 1,
            block_reward: 50,
            max_block_bytes: 1_000_000,
            ..easy_config()
        };
        let mined = assembler(config)
            .assemble(&[malformed, unbalanced, valid.clone()], [0u8; 32])
            .unwrap();

        let coinbase = CoinbaseFactory::new(50).create(1, b"miner_address");
        let coinbase_id = coinbase.id().unwrap();
        let valid_id = valid.to_transaction().unwrap().id().unwrap();

        assert_eq!(mined.tx_ids, vec![coinbase_id, valid_id]);
        assert_eq!(mined.total_fee, 52);
        assert_eq!(mined.coinbase_bytes, coinbase.serialize().unwrap());

        let mut pair = coinbase_id.to_vec();
        pair.extend_from_slice(&valid_id);
        assert_eq!(mined.header().merkle_root, double_sha256(&pair));

        assert!(mined.block.verify_structure().unwrap());
        assert_eq!(mined.block.size().unwrap(), mined.block_size);
    }

    #[test]
    fn test_header_fields() {
        let prev = [0xAB; 32];
        let mined = assembler(easy_config()).assemble(&[], prev).unwrap();

        let header = mined.header();
        assert_eq!(header.version, BLOCK_VERSION);
        assert_eq!(header.prev_block_hash, prev);
        assert_eq!(header.timestamp, fixed_clock());
        assert_eq!(header.bits, DifficultyTarget::MAX.to_compact());
        assert!(header.is_valid_pow());
        assert_eq!(header.merkle_root, mined.tx_ids[0]);
        assert_eq!(mined.hash, header.hash());
        assert_eq!(mined.rounds, 1);
    }

    #[test]
    fn test_mined_hash_meets_target() {
        let mut bytes = [0xFF; 32];
        bytes[0] = 0x00;
        let target = DifficultyTarget::from_bytes(bytes);
        let config = AssemblerConfig {
            target,
            ..AssemblerConfig::default()
        };

        let mined = assembler(config).assemble(&[pending(4, 10, &[9])], [0u8; 32]).unwrap();
        assert!(target.is_met_by(&mined.hash));
        assert_eq!(mined.hash, mined.header().hash());
    }

    #[test]
    fn test_header_bits_cover_mined_hash() {
        // 00ff..ff is not exact in compact form; the header must still verify
        let target = DifficultyTarget::from_hex(&format!("00{}", "ff".repeat(31))).unwrap();
        let config = AssemblerConfig {
            target,
            ..AssemblerConfig::default()
        };

        for tag in 1..=8u8 {
            let mined = assembler(config.clone())
                .assemble(&[pending(tag, 10, &[9])], [tag; 32])
                .unwrap();
            assert!(mined.header().is_valid_pow());
            assert!(target.normalized().is_met_by(&mined.hash));
            assert_eq!(mined.header().bits, target.to_compact());
        }
    }

    #[test]
    fn test_pending_coinbase_is_excluded() {
        let forged = CoinbaseFactory::new(999_000).create(2, b"forger");
        let forged = PendingTransaction::from_transaction(&forged, &[1_000_000]);
        let honest = pending(5, 50, &[48]);

        let mined = assembler(easy_config())
            .assemble(&[forged, honest.clone()], [0u8; 32])
            .unwrap();

        assert_eq!(mined.tx_ids.len(), 2);
        assert_eq!(mined.tx_ids[1], honest.to_transaction().unwrap().id().unwrap());
        assert_eq!(mined.total_fee, 52);
        assert_eq!(
            mined.block.transactions.iter().filter(|tx| tx.is_coinbase()).count(),
            1
        );
        assert!(mined.block.verify_structure().unwrap());
    }

    #[test]
    fn test_size_budget_halts_packing() {
        let txs: Vec<PendingTransaction> = (1..=4).map(|i| pending(i, 100, &[99])).collect();
        let tx_size = txs[0].to_transaction().unwrap().size().unwrap();
        let coinbase_size = CoinbaseFactory::new(50)
            .create(1, b"miner_address")
            .size()
            .unwrap();

        // Room for exactly two transactions, one byte short of a third
        let budget = BLOCK_HEADER_SIZE + coinbase_size + 3 * tx_size - 1;
        let config = AssemblerConfig {
            max_block_bytes: budget,
            ..easy_config()
        };

        let mined = assembler(config).assemble(&txs, [0u8; 32]).unwrap();
        assert_eq!(mined.tx_ids.len(), 3);
        assert_eq!(mined.block_size, BLOCK_HEADER_SIZE + coinbase_size + 2 * tx_size);
        assert!(mined.block_size <= budget);
    }

    #[test]
    fn test_oversize_transaction_stops_packing() {
        let small = pending(1, 100, &[99]);
        let mut big = pending(2, 100, &[99]);
        big.vout.as_mut().unwrap()[0].script_pubkey = Some("51".repeat(200));
        let small_after = pending(3, 100, &[99]);

        let small_size = small.to_transaction().unwrap().size().unwrap();
        let coinbase_size = CoinbaseFactory::new(50)
            .create(1, b"miner_address")
            .size()
            .unwrap();
        let budget = BLOCK_HEADER_SIZE + coinbase_size + 2 * small_size;

        let config = AssemblerConfig {
            max_block_bytes: budget,
            ..easy_config()
        };
        let mined = assembler(config)
            .assemble(&[small.clone(), big, small_after], [0u8; 32])
            .unwrap();

        // The later small transaction would fit but packing stops at the big one
        assert_eq!(mined.tx_ids.len(), 2);
        assert_eq!(mined.tx_ids[1], small.to_transaction().unwrap().id().unwrap());
    }

    #[test]
    fn test_never_exceeds_budget() {
        let txs: Vec<PendingTransaction> = (1..=20).map(|i| pending(i, 1000, &[990])).collect();
        for budget in [200usize, 300, 450, 777, 1200, 5000] {
            let config = AssemblerConfig {
                max_block_bytes: budget,
                ..easy_config()
            };
            match assembler(config).assemble(&txs, [0u8; 32]) {
                Ok(mined) => {
                    assert!(mined.block_size <= budget);
                    assert_eq!(mined.block.size().unwrap(), mined.block_size);
                }
                Err(AssemblyError::BudgetTooSmall { budget: b, required }) => {
                    assert_eq!(b, budget);
                    assert!(required > budget);
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    #[test]
    fn test_budget_too_small_for_coinbase() {
        let config = AssemblerConfig {
            max_block_bytes: BLOCK_HEADER_SIZE,
            ..easy_config()
        };
        assert!(matches!(
            assembler(config).assemble(&[], [0u8; 32]),
            Err(AssemblyError::BudgetTooSmall { .. })
        ));
    }

    #[test]
    fn test_exhausted_after_bounded_rounds() {
        let config = AssemblerConfig {
            target: DifficultyTarget::ZERO,
            max_rounds: 3,
            ..AssemblerConfig::default()
        };
        let assembler = BlockAssembler::new(
            config,
            TrustingVerifier,
            ProofOfWorkMiner::new().with_max_attempts(10),
        )
        .with_clock(fixed_clock);

        match assembler.assemble(&[], [0u8; 32]) {
            Err(AssemblyError::ProofOfWorkExhausted { rounds, attempts }) => {
                assert_eq!(rounds, 3);
                assert_eq!(attempts, 30);
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|m| m.hash)),
        }
    }

    #[test]
    fn test_payout_script_too_long() {
        let config = AssemblerConfig {
            payout_script: vec![0u8; 300],
            ..easy_config()
        };
        assert!(matches!(
            assembler(config).assemble(&[], [0u8; 32]),
            Err(AssemblyError::CoinbaseEncoding(_))
        ));
    }
}
