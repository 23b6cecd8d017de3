//! Ledger configuration

use serde::{Deserialize, Serialize};

use crate::consensus::Consensus;
use crate::core::MAX_BLOCK_TXS;
use crate::mining::DEFAULT_MEMPOOL_SIZE;

/// What happens after a transaction is accepted through
/// [`Ledger::submit_with_policy`](super::Ledger::submit_with_policy)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SealPolicy {
    /// Blocks are only sealed on request
    #[default]
    Manual,
    /// Seal a block as soon as `count` transactions are pending
    WhenPending { count: usize },
}

/// Ledger engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Rule used to seal and verify blocks
    pub consensus: Consensus,
    /// Transactions taken from the mempool per block
    pub max_block_transactions: usize,
    /// Pending transactions held before `MempoolFull`
    pub mempool_capacity: usize,
    pub seal_policy: SealPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            consensus: Consensus::default(),
            max_block_transactions: MAX_BLOCK_TXS,
            mempool_capacity: DEFAULT_MEMPOOL_SIZE,
            seal_policy: SealPolicy::Manual,
        }
    }
}

/// Per-block overrides for assembly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockParams {
    /// Seed of the stake draw; defaults to one derived from the tip hash
    pub seed: Option<u64>,
    /// Cap on transactions taken; defaults to the configured maximum
    pub max_transactions: Option<usize>,
}

impl BlockParams {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}
