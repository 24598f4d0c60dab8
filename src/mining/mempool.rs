//! Pending transaction pool loaded from disk
//!
//! Each `*.json` file in the mempool directory holds one pending
//! transaction. Files are read in file-name order so the same directory
//! always yields the same block.

use crate::core::PendingTransaction;
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Mempool errors
#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("Cannot read mempool directory {path:?}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Pending transactions in load order
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<PendingTransaction>,
    sources: Vec<PathBuf>,
    skipped: usize,
}

impl Mempool {
    /// Create an empty mempool
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir`, skipping files that cannot be
    /// read or parsed
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, MempoolError> {
        let dir = dir.as_ref();
        let read_dir_err = |source: io::Error| MempoolError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_dir_err)? {
            let path = entry.map_err(read_dir_err)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut mempool = Self::new();
        for path in paths {
            match Self::load_file(&path) {
                Ok(tx) => mempool.push(tx, path),
                Err(e) => {
                    warn!("Skipping mempool file {:?}: {}", path, e);
                    mempool.skipped += 1;
                }
            }
        }

        info!(
            "Loaded {} pending transactions from {:?} ({} skipped)",
            mempool.len(),
            dir,
            mempool.skipped
        );
        Ok(mempool)
    }

    /// Read one pending transaction file
    pub fn load_file(path: &Path) -> Result<PendingTransaction, MempoolError> {
        let contents = fs::read_to_string(path)?;
        let tx = serde_json::from_str(&contents)?;
        debug!("Loaded pending transaction from {:?}", path);
        Ok(tx)
    }

    /// Append a transaction read from `source`
    pub fn push(&mut self, tx: PendingTransaction, source: PathBuf) {
        self.transactions.push(tx);
        self.sources.push(source);
    }

    pub fn transactions(&self) -> &[PendingTransaction] {
        &self.transactions
    }

    /// Pair each transaction with the file it came from
    pub fn entries(&self) -> impl Iterator<Item = (&Path, &PendingTransaction)> {
        self.sources
            .iter()
            .map(PathBuf::as_path)
            .zip(self.transactions.iter())
    }

    /// Number of files that were skipped while loading
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
