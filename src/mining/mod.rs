//! Transaction pooling ahead of block assembly

pub mod mempool;

pub use mempool::{Mempool, MempoolEntry, MempoolStats, TxSummary, DEFAULT_MEMPOOL_SIZE};
