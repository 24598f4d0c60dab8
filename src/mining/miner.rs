//! Proof-of-work nonce search
//!
//! The search is bounded: it tries at most `max_attempts` nonces starting
//! at zero and reports `Exhausted` instead of looping forever. Only the
//! header's nonce is ever changed; varying anything else is up to the
//! caller.

use crate::core::{BlockHeader, DifficultyTarget};
use crate::crypto::Hash;
use log::debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

/// Number of distinct 32-bit nonces
pub const FULL_NONCE_SPACE: u64 = 1 << 32;

/// How often a worker looks at the shared stop flag
const STOP_CHECK_INTERVAL: u64 = 1024;

/// Outcome of a nonce search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineResult {
    /// `header` carries the winning nonce
    Found {
        header: BlockHeader,
        hash: Hash,
        attempts: u64,
    },
    /// No nonce in the searched range satisfied the target
    Exhausted { attempts: u64 },
}

impl MineResult {
    pub fn attempts(&self) -> u64 {
        match self {
            MineResult::Found { attempts, .. } | MineResult::Exhausted { attempts } => *attempts,
        }
    }
}

/// Mining statistics
#[derive(Debug, Clone, Default)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn from_run(attempts: u64, started: Instant) -> Self {
        let elapsed = started.elapsed().as_millis();
        let hash_rate = if elapsed > 0 {
            (attempts as f64) / (elapsed as f64 / 1000.0)
        } else {
            attempts as f64
        };
        Self {
            hash_attempts: attempts,
            time_ms: elapsed,
            hash_rate,
        }
    }
}

/// Bounded proof-of-work searcher
#[derive(Debug, Clone)]
pub struct ProofOfWorkMiner {
    max_attempts: u64,
    workers: usize,
}

impl ProofOfWorkMiner {
    /// Search the whole nonce space on the current thread
    pub fn new() -> Self {
        Self {
            max_attempts: FULL_NONCE_SPACE,
            workers: 1,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Split the search across `workers` threads (at least one)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    /// Search for a nonce whose header hash is below `target`
    pub fn mine(
        &self,
        header: &BlockHeader,
        target: &DifficultyTarget,
    ) -> (MineResult, MiningStats) {
        let started = Instant::now();
        let result = if self.workers == 1 {
            mine(header, target, self.max_attempts)
        } else {
            mine_parallel(header, target, self.max_attempts, self.workers)
        };
        let stats = MiningStats::from_run(result.attempts(), started);
        (result, stats)
    }
}

impl Default for ProofOfWorkMiner {
    fn default() -> Self {
        Self::new()
    }
}

/// Try nonces `0, 1, 2, ...` (wrapping at 2^32) up to `max_attempts` times
pub fn mine(header: &BlockHeader, target: &DifficultyTarget, max_attempts: u64) -> MineResult {
    let mut candidate = header.clone();

    for attempt in 0..max_attempts {
        candidate.nonce = attempt as u32;
        let hash = candidate.hash();

        if target.is_met_by(&hash) {
            return MineResult::Found {
                header: candidate,
                hash,
                attempts: attempt + 1,
            };
        }
    }

    MineResult::Exhausted {
        attempts: max_attempts,
    }
}

/// Search disjoint contiguous nonce ranges on `workers` threads
///
/// The first worker to succeed raises a shared stop flag. A worker that has
/// not found a solution only stops early when another worker already has,
/// so `Exhausted` always means every range was fully scanned.
pub fn mine_parallel(
    header: &BlockHeader,
    target: &DifficultyTarget,
    max_attempts: u64,
    workers: usize,
) -> MineResult {
    let workers = (workers.max(1) as u64).min(max_attempts.max(1));
    let chunk = max_attempts.div_ceil(workers);

    let stop = AtomicBool::new(false);
    let attempts = AtomicU64::new(0);
    let winner: Mutex<Option<(BlockHeader, Hash)>> = Mutex::new(None);

    thread::scope(|scope| {
        for worker_id in 0..workers {
            let start = worker_id * chunk;
            let end = (start + chunk).min(max_attempts);
            if start >= end {
                continue;
            }
            let (stop, attempts, winner) = (&stop, &attempts, &winner);

            scope.spawn(move || {
                let mut candidate = header.clone();
                let mut local_attempts = 0u64;

                for n in start..end {
                    if local_attempts % STOP_CHECK_INTERVAL == 0 && stop.load(Ordering::Relaxed) {
                        break;
                    }
                    candidate.nonce = n as u32;
                    local_attempts += 1;
                    let hash = candidate.hash();

                    if target.is_met_by(&hash) {
                        // Only the first winner publishes its header
                        if !stop.swap(true, Ordering::SeqCst) {
                            if let Ok(mut slot) = winner.lock() {
                                *slot = Some((candidate.clone(), hash));
                            }
                            debug!("Worker {} found nonce {}", worker_id, candidate.nonce);
                        }
                        break;
                    }
                }

                attempts.fetch_add(local_attempts, Ordering::Relaxed);
            });
        }
    });

    let attempts = attempts.into_inner();
    let winner = winner.into_inner().ok().flatten();
    match winner {
        Some((header, hash)) => MineResult::Found {
            header,
            hash,
            attempts,
        },
        None => MineResult::Exhausted { attempts },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: [0u8; 32],
            merkle_root: [0x5a; 32],
            timestamp: 1_700_000_000,
            bits: DifficultyTarget::default().to_compact(),
            nonce: 0,
        }
    }

    /// Target that roughly one hash in 256 meets
    fn easy_target() -> DifficultyTarget {
        let mut bytes = [0xFFu8; 32];
        bytes[0] = 0x00;
        DifficultyTarget::from_bytes(bytes)
    }

    #[test]
    fn test_max_target_found_at_nonce_zero() {
        match mine(&header(), &DifficultyTarget::MAX, FULL_NONCE_SPACE) {
            MineResult::Found {
                header: found,
                hash,
                attempts,
            } => {
                assert_eq!(found.nonce, 0);
                assert_eq!(attempts, 1);
                assert_eq!(hash, found.hash());
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_target_exhausts() {
        let result = mine(&header(), &DifficultyTarget::ZERO, 500);
        assert_eq!(result, MineResult::Exhausted { attempts: 500 });
    }

    #[test]
    fn test_zero_attempts() {
        let result = mine(&header(), &DifficultyTarget::MAX, 0);
        assert_eq!(result, MineResult::Exhausted { attempts: 0 });
    }

    #[test]
    fn test_found_header_is_valid_and_only_nonce_changes() {
        let original = header();
        let target = easy_target();

        match mine(&original, &target, 100_000) {
            MineResult::Found {
                header: found,
                hash,
                attempts,
            } => {
                assert!(target.is_met_by(&hash));
                assert!(found.meets_target(&target));
                assert_eq!(attempts, found.nonce as u64 + 1);

                let mut expected = original.clone();
                expected.nonce = found.nonce;
                assert_eq!(found, expected);
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_first_nonce_wins() {
        let target = easy_target();
        if let MineResult::Found { header: found, .. } = mine(&header(), &target, 100_000) {
            for nonce in 0..found.nonce {
                let mut h = header();
                h.nonce = nonce;
                assert!(!h.meets_target(&target));
            }
        } else {
            panic!("expected Found");
        }
    }

    #[test]
    fn test_parallel_finds_valid_nonce() {
        let target = easy_target();
        match mine_parallel(&header(), &target, 100_000, 4) {
            MineResult::Found {
                header: found,
                hash,
                ..
            } => {
                assert_eq!(hash, found.hash());
                assert!(target.is_met_by(&hash));
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_parallel_workers_stop_after_a_win() {
        // Every range holds many solutions; a full scan would be 2^32 attempts
        let target = easy_target();
        let result = mine_parallel(&header(), &target, FULL_NONCE_SPACE, 4);

        assert!(matches!(result, MineResult::Found { .. }));
        assert!(result.attempts() >= 1);
        assert!(
            result.attempts() < 1_000_000,
            "workers kept searching: {} attempts",
            result.attempts()
        );
    }

    #[test]
    fn test_parallel_exhausts_whole_range() {
        let result = mine_parallel(&header(), &DifficultyTarget::ZERO, 1_001, 4);
        assert_eq!(result, MineResult::Exhausted { attempts: 1_001 });
    }

    #[test]
    fn test_parallel_more_workers_than_attempts() {
        let result = mine_parallel(&header(), &DifficultyTarget::ZERO, 3, 8);
        assert_eq!(result, MineResult::Exhausted { attempts: 3 });
    }

    #[test]
    fn test_miner_dispatch_and_stats() {
        let miner = ProofOfWorkMiner::new().with_max_attempts(64).with_workers(2);
        assert_eq!(miner.max_attempts(), 64);

        let (result, stats) = miner.mine(&header(), &DifficultyTarget::ZERO);
        assert_eq!(result, MineResult::Exhausted { attempts: 64 });
        assert_eq!(stats.hash_attempts, 64);

        let (result, stats) = ProofOfWorkMiner::default().mine(&header(), &DifficultyTarget::MAX);
        assert!(matches!(result, MineResult::Found { attempts: 1, .. }));
        assert_eq!(stats.hash_attempts, 1);
    }
}
