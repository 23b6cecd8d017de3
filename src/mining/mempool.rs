//! Transaction pool (mempool) for pending transactions
//!
//! Holds unconfirmed transactions that each validate against the current
//! UTXO set and that never claim the same outpoint twice. Features:
//! - Conflict detection through a claimed-outpoint index
//! - Fee-based block selection with deterministic tie breaking
//! - Pruning after the tip moves

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::core::{
    validate_transaction, LedgerError, LedgerResult, Outpoint, PendingView, Transaction, UtxoSet,
};
use crate::crypto::SignatureVerifier;

// =============================================================================
// Configuration
// =============================================================================

/// Default maximum mempool transaction count
pub const DEFAULT_MEMPOOL_SIZE: usize = 10_000;

// =============================================================================
// Mempool Entry
// =============================================================================

/// Entry in the mempool with metadata
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    /// The transaction
    pub tx: Transaction,
    /// Fee established when the transaction was admitted
    pub fee: u64,
    /// Arrival order, used to break fee ties
    pub sequence: u64,
}

/// Display form of a pending transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSummary {
    pub id: String,
    pub inputs: usize,
    pub outputs: usize,
    pub total_output: u128,
    pub fee: u64,
}

// =============================================================================
// Mempool
// =============================================================================

/// Memory pool for pending transactions
#[derive(Debug, Clone)]
pub struct Mempool {
    /// Transactions indexed by ID
    entries: HashMap<String, MempoolEntry>,
    /// Transaction IDs in order of arrival
    by_time: Vec<String>,
    /// Outpoints spent by some pooled transaction
    claimed: HashSet<Outpoint>,
    /// Maximum pool size
    max_size: usize,
    /// Next arrival number
    next_sequence: u64,
}

impl Mempool {
    /// Create a new mempool
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMPOOL_SIZE)
    }

    /// Create a mempool holding at most `max_size` transactions
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            by_time: Vec::new(),
            claimed: HashSet::new(),
            max_size,
            next_sequence: 0,
        }
    }

    /// Validate `tx` against the UTXO set minus pooled claims and admit it.
    ///
    /// Returns the fee. A spend of an outpoint another pooled transaction
    /// already consumes fails with `DoubleSpendOrUnknownInput`.
    pub fn add(
        &mut self,
        tx: Transaction,
        utxo_set: &UtxoSet,
        verifier: &dyn SignatureVerifier,
    ) -> LedgerResult<u64> {
        if self.entries.len() >= self.max_size {
            return Err(LedgerError::MempoolFull(self.max_size));
        }

        let view = PendingView::new(utxo_set, &self.claimed);
        let fee = match validate_transaction(&tx, &view, verifier) {
            Ok(fee) => fee,
            Err(e) => {
                debug!("Mempool rejected {}: {}", tx.id, e);
                return Err(e);
            }
        };

        // Every input is unspent and unclaimed, so a repeated id cannot get here
        self.claimed.extend(tx.spent_outpoints().cloned());

        let tx_id = tx.id.clone();
        let entry = MempoolEntry {
            tx,
            fee,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.by_time.push(tx_id.clone());
        self.entries.insert(tx_id.clone(), entry);

        debug!("Mempool accepted {} (fee {}, {} pending)", tx_id, fee, self.len());
        Ok(fee)
    }

    /// Remove a transaction from the pool
    pub fn remove_transaction(&mut self, tx_id: &str) -> Option<Transaction> {
        let entry = self.entries.remove(tx_id)?;
        self.by_time.retain(|id| id != tx_id);
        for outpoint in entry.tx.spent_outpoints() {
            self.claimed.remove(outpoint);
        }
        Some(entry.tx)
    }

    /// Remove transactions that are now in a block
    pub fn remove<S: AsRef<str>>(&mut self, tx_ids: &[S]) {
        for id in tx_ids {
            self.remove_transaction(id.as_ref());
        }
    }

    /// All pending transactions in arrival order
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.by_time
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| e.tx.clone()))
            .collect()
    }

    /// Up to `limit` transactions for a block: highest fee first, earlier
    /// arrival first among equal fees
    pub fn select(&self, limit: usize) -> Vec<Transaction> {
        let mut ranked: Vec<&MempoolEntry> = self.entries.values().collect();
        ranked.sort_by(|a, b| b.fee.cmp(&a.fee).then(a.sequence.cmp(&b.sequence)));
        ranked
            .into_iter()
            .take(limit)
            .map(|e| e.tx.clone())
            .collect()
    }

    /// Drop transactions that no longer validate against `utxo_set`.
    ///
    /// Called after the tip changes. Survivors are re-admitted in arrival
    /// order; returns the ids that were dropped.
    pub fn prune(&mut self, utxo_set: &UtxoSet, verifier: &dyn SignatureVerifier) -> Vec<String> {
        let pending: Vec<MempoolEntry> = self
            .by_time
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect();

        self.entries.clear();
        self.by_time.clear();
        self.claimed.clear();

        let mut dropped = Vec::new();
        for entry in pending {
            let view = PendingView::new(utxo_set, &self.claimed);
            match validate_transaction(&entry.tx, &view, verifier) {
                Ok(fee) => {
                    self.claimed.extend(entry.tx.spent_outpoints().cloned());
                    let tx_id = entry.tx.id.clone();
                    self.by_time.push(tx_id.clone());
                    self.entries.insert(tx_id, MempoolEntry { fee, ..entry });
                }
                Err(e) => {
                    warn!("Pruned {} from mempool: {}", entry.tx.id, e);
                    dropped.push(entry.tx.id);
                }
            }
        }

        dropped
    }

    /// Outpoints claimed by pending transactions
    pub fn claimed(&self) -> &HashSet<Outpoint> {
        &self.claimed
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, id: &str) -> Option<&Transaction> {
        self.entries.get(id).map(|e| &e.tx)
    }

    /// Get a mempool entry by ID
    pub fn get_entry(&self, id: &str) -> Option<&MempoolEntry> {
        self.entries.get(id)
    }

    /// Check if a transaction is in the pool
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Get the number of pending transactions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Summaries in arrival order
    pub fn summaries(&self) -> Vec<TxSummary> {
        self.by_time
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| TxSummary {
                id: e.tx.id.clone(),
                inputs: e.tx.inputs.len(),
                outputs: e.tx.outputs.len(),
                total_output: e.tx.total_output(),
                fee: e.fee,
            })
            .collect()
    }

    /// Get mempool statistics
    pub fn stats(&self) -> MempoolStats {
        MempoolStats {
            tx_count: self.entries.len(),
            total_fees: self.entries.values().map(|e| e.fee as u128).sum(),
            max_fee: self.entries.values().map(|e| e.fee).max().unwrap_or(0),
            min_fee: self.entries.values().map(|e| e.fee).min().unwrap_or(0),
        }
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

/// Mempool statistics
#[derive(Debug, Clone)]
pub struct MempoolStats {
    pub tx_count: usize,
    pub total_fees: u128,
    pub max_fee: u64,
    pub min_fee: u64,
}

// =============================================================================
// Tests
// =============================================================================
