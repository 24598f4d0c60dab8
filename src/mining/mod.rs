//! Mining module: block assembly, coinbase creation, nonce search and the
//! on-disk pending transaction pool

pub mod assembler;
pub mod coinbase;
pub mod mempool;
pub mod miner;

pub use assembler::{
    current_timestamp, AssemblerConfig, AssemblyError, BlockAssembler, MinedBlock,
    DEFAULT_BLOCK_REWARD, DEFAULT_MAX_ROUNDS,
};
pub use coinbase::{encode_block_height, CoinbaseFactory};
pub use mempool::{Mempool, MempoolError};
pub use miner::{mine, mine_parallel, MineResult, MiningStats, ProofOfWorkMiner, FULL_NONCE_SPACE};
