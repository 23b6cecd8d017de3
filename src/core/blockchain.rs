//! Chain implementation
//!
//! The chain owns its blocks and the UTXO set derived from them. `append`
//! is the only way (after genesis) to change either, and it is
//! all-or-nothing: every check runs against a staged copy of the UTXO set
//! which replaces the live one only when the whole block is accepted.

use std::collections::HashSet;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::consensus::{Consensus, StakeWeights};
use crate::core::address::Address;
use crate::core::block::{Block, GENESIS_PREVIOUS_HASH, MAX_BLOCK_TXS};
use crate::core::error::{InvariantViolation, LedgerError, LedgerResult};
use crate::core::transaction::MAX_AMOUNT;
use crate::core::utxo::UtxoSet;
use crate::core::validation::validate_transaction;
use crate::crypto::SignatureVerifier;

/// The chain of blocks plus its derived spendable state
#[derive(Debug, Clone)]
pub struct Chain {
    /// Blocks from genesis to tip
    blocks: Vec<Block>,
    /// Rule every appended block must satisfy
    consensus: Consensus,
    /// Unspent outputs as of the tip
    utxo_set: UtxoSet,
}

impl Chain {
    /// Create a chain whose genesis block mints `allocations`.
    ///
    /// Allocations are held to the same `MAX_AMOUNT` bound as transactions,
    /// each on its own and in total.
    pub fn new(consensus: Consensus, allocations: &[(Address, u64)]) -> LedgerResult<Self> {
        check_allocations(allocations.iter().map(|(_, amount)| *amount))?;
        let genesis = Block::genesis(allocations);
        let mut utxo_set = UtxoSet::new();
        for tx in &genesis.transactions {
            utxo_set.apply_transaction(tx);
        }

        info!(
            "Genesis {} created under {} ({} allocations)",
            &genesis.hash()[..16],
            consensus.name(),
            allocations.len()
        );

        Ok(Self {
            blocks: vec![genesis],
            consensus,
            utxo_set,
        })
    }

    /// Get the latest block
    pub fn tip(&self) -> &Block {
        self.blocks
            .last()
            .expect("Chain should have at least genesis block")
    }

    /// Hash of the latest block
    pub fn tip_hash(&self) -> String {
        self.tip().hash()
    }

    /// Height of the tip (genesis is 0)
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn consensus(&self) -> &Consensus {
        &self.consensus
    }

    /// Get a block by height
    pub fn block(&self, height: u64) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    /// Get a block by hash
    pub fn block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash() == hash)
    }

    /// Snapshot of the spendable outputs at the tip
    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxo_set
    }

    /// Stake weights the active rule derives from the tip state
    pub fn stake_weights(&self) -> StakeWeights {
        self.consensus.stake_weights(&self.utxo_set)
    }

    /// Validate a candidate block and, if it passes, make it the new tip.
    ///
    /// Returns the new tip hash. On error neither the blocks nor the UTXO
    /// set change.
    pub fn append(
        &mut self,
        block: Block,
        verifier: &dyn SignatureVerifier,
    ) -> LedgerResult<String> {
        let staged = match self.check_block(&block, verifier) {
            Ok(staged) => staged,
            Err(e) => {
                warn!("Rejected block {}: {}", &block.hash()[..16], e);
                return Err(e);
            }
        };

        let hash = block.hash();
        self.utxo_set = staged;
        self.blocks.push(block);

        info!(
            "Appended block {} at height {} ({} txs, {} utxos)",
            &hash[..16],
            self.height(),
            self.tip().tx_count(),
            self.utxo_set.len()
        );

        Ok(hash)
    }

    /// Run every block check and return the UTXO set the block would produce
    fn check_block(
        &self,
        block: &Block,
        verifier: &dyn SignatureVerifier,
    ) -> LedgerResult<UtxoSet> {
        // (a) builds on the current tip
        let tip_hash = self.tip_hash();
        if block.header.previous_hash != tip_hash {
            return Err(LedgerError::StaleTip {
                expected: tip_hash,
                found: block.header.previous_hash.clone(),
            });
        }

        if block.transactions.len() > MAX_BLOCK_TXS {
            return Err(LedgerError::InvalidBlock(format!(
                "too many transactions: {} (max: {})",
                block.transactions.len(),
                MAX_BLOCK_TXS
            )));
        }

        // (b) merkle root commits to exactly these transactions
        if !block.verify_merkle_root() {
            return Err(LedgerError::InvalidBlock("invalid merkle root".to_string()));
        }

        // (c) transactions validate in order, each seeing the earlier ones applied
        let mut staged = self.utxo_set.clone();
        for tx in &block.transactions {
            validate_transaction(tx, &staged, verifier)?;
            staged.apply_transaction(tx);
        }

        // (d) consensus seal, judged against stake at the parent
        let weights = self.consensus.stake_weights(&self.utxo_set);
        if !self.consensus.verify(block, &weights, verifier) {
            return Err(LedgerError::InvalidBlock(format!(
                "{} verification failed",
                self.consensus.name()
            )));
        }

        // (e) no outpoint consumed twice across the block
        let mut spent = HashSet::new();
        for outpoint in block.transactions.iter().flat_map(|tx| tx.spent_outpoints()) {
            if !spent.insert(outpoint) {
                return Err(LedgerError::DoubleSpendOrUnknownInput(outpoint.clone()));
            }
        }

        Ok(staged)
    }

    /// Recompute the UTXO set by replaying every block from genesis
    pub fn replay_utxo_set(&self) -> UtxoSet {
        let mut utxo_set = UtxoSet::new();
        for tx in self.blocks.iter().flat_map(|b| &b.transactions) {
            utxo_set.apply_transaction(tx);
        }
        utxo_set
    }

    /// Re-check links, merkle roots and the derived UTXO set
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let genesis = self.blocks.first().ok_or(InvariantViolation::MissingGenesis)?;
        if genesis.header.previous_hash != GENESIS_PREVIOUS_HASH {
            return Err(InvariantViolation::BrokenLink { height: 0 });
        }

        for (height, pair) in self.blocks.windows(2).enumerate() {
            if pair[1].header.previous_hash != pair[0].hash() {
                return Err(InvariantViolation::BrokenLink {
                    height: height as u64 + 1,
                });
            }
        }

        for (height, block) in self.blocks.iter().enumerate() {
            if !block.verify_merkle_root() {
                return Err(InvariantViolation::MerkleMismatch {
                    height: height as u64,
                });
            }
        }

        let replayed = self.replay_utxo_set();
        if replayed != self.utxo_set {
            return Err(InvariantViolation::UtxoSetDivergence {
                live: self.utxo_set.len(),
                replayed: replayed.len(),
            });
        }

        Ok(())
    }

    /// Get chain statistics
    pub fn stats(&self) -> ChainStats {
        ChainStats {
            height: self.height(),
            total_blocks: self.blocks.len() as u64,
            total_transactions: self.blocks.iter().map(|b| b.tx_count() as u64).sum(),
            total_value: self.utxo_set.total_value(),
            utxo_count: self.utxo_set.len(),
            tip_hash: self.tip_hash(),
        }
    }

    /// Serializable form: blocks and rule, without derived state
    pub fn to_record(&self) -> ChainRecord {
        ChainRecord {
            consensus: self.consensus.clone(),
            blocks: self.blocks.clone(),
        }
    }

    /// Rebuild a chain from a record, re-validating every block after genesis
    pub fn from_record(
        record: ChainRecord,
        verifier: &dyn SignatureVerifier,
    ) -> LedgerResult<Self> {
        let mut blocks = record.blocks.into_iter();
        let genesis = blocks
            .next()
            .ok_or_else(|| LedgerError::InvalidBlock("record has no genesis block".to_string()))?;

        if genesis.header.previous_hash != GENESIS_PREVIOUS_HASH || !genesis.verify_merkle_root() {
            return Err(LedgerError::InvalidBlock("malformed genesis block".to_string()));
        }
        check_allocations(
            genesis
                .transactions
                .iter()
                .flat_map(|tx| tx.outputs.iter().map(|output| output.amount)),
        )?;

        let mut utxo_set = UtxoSet::new();
        for tx in &genesis.transactions {
            utxo_set.apply_transaction(tx);
        }

        let mut chain = Self {
            blocks: vec![genesis],
            consensus: record.consensus,
            utxo_set,
        };
        for block in blocks {
            chain.append(block, verifier)?;
        }

        Ok(chain)
    }
}

/// Reject genesis amounts no transaction could ever spend
fn check_allocations(amounts: impl IntoIterator<Item = u64>) -> LedgerResult<()> {
    let mut total: u128 = 0;
    for amount in amounts {
        if amount > MAX_AMOUNT {
            return Err(LedgerError::InvalidTx(format!(
                "allocation {} exceeds maximum {}",
                amount, MAX_AMOUNT
            )));
        }
        total += amount as u128;
    }

    if total > MAX_AMOUNT as u128 {
        return Err(LedgerError::InvalidTx(format!(
            "allocations total {} exceeds maximum {}",
            total, MAX_AMOUNT
        )));
    }
    Ok(())
}

/// Persistable chain contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainRecord {
    pub consensus: Consensus,
    pub blocks: Vec<Block>,
}

/// Chain statistics
#[derive(Debug, Clone)]
pub struct ChainStats {
    pub height: u64,
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub total_value: u128,
    pub utxo_count: usize,
    pub tip_hash: String,
}
