//! Ledger engine
//!
//! Ties the chain, the mempool and this node's validator keys together into
//! the single owned value the outside world talks to. Every mutation takes
//! `&mut self` and either completes or leaves the ledger untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::consensus::AssemblyContext;
use crate::core::{
    get_balance, Address, Block, Chain, ChainRecord, InvariantViolation, LedgerError,
    LedgerResult, PendingView, Transaction, MAX_BLOCK_TXS,
};
use crate::crypto::{KeyPair, MerkleProof, Secp256k1Verifier, SignatureVerifier, Signer};
use crate::ledger::config::{BlockParams, LedgerConfig, SealPolicy};
use crate::mining::{Mempool, TxSummary};
use crate::wallet::{self, Keyring};

/// Where the chain currently ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipSummary {
    pub height: u64,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub transactions: usize,
    pub consensus: String,
    pub utxo_count: usize,
    pub pending: usize,
}

/// Result of an accepted submission that may have sealed a block.
///
/// The transaction is pooled whatever the policy does; a failed seal is
/// reported in `seal_error` and leaves the chain as it was.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub tx_id: String,
    /// Hash of the block sealed by the policy, if any
    pub sealed_block: Option<String>,
    /// Why the policy's seal attempt failed
    pub seal_error: Option<LedgerError>,
}

/// Where a confirmed transaction sits, with its merkle path
#[derive(Debug, Clone)]
pub struct InclusionProof {
    pub height: u64,
    pub block_hash: String,
    pub merkle_root: String,
    pub proof: MerkleProof,
}

/// Default stake-draw seed: the leading 8 bytes of the tip hash
pub fn seed_from_tip(tip_hash: &str) -> u64 {
    let mut seed = [0u8; 8];
    if let Ok(bytes) = hex::decode(tip_hash) {
        for (slot, byte) in seed.iter_mut().zip(bytes) {
            *slot = byte;
        }
    }
    u64::from_be_bytes(seed)
}

/// The ledger engine
pub struct Ledger {
    config: LedgerConfig,
    chain: Chain,
    mempool: Mempool,
    keyring: Keyring,
    verifier: Arc<dyn SignatureVerifier + Send + Sync>,
}

impl Ledger {
    /// Create a ledger whose genesis block mints `allocations`
    pub fn new(config: LedgerConfig, allocations: &[(Address, u64)]) -> LedgerResult<Self> {
        let chain = Chain::new(config.consensus.clone(), allocations)?;
        let mempool = Mempool::with_capacity(config.mempool_capacity);
        Ok(Self {
            config,
            chain,
            mempool,
            keyring: Keyring::new(),
            verifier: Arc::new(Secp256k1Verifier),
        })
    }

    /// Rebuild a ledger from persisted blocks and pending transactions.
    ///
    /// Blocks are re-appended and pending transactions re-submitted, so a
    /// tampered record fails here rather than producing a corrupt ledger.
    pub fn restore(
        config: LedgerConfig,
        blocks: Vec<Block>,
        pending: Vec<Transaction>,
        keyring: Keyring,
    ) -> LedgerResult<Self> {
        let verifier: Arc<dyn SignatureVerifier + Send + Sync> = Arc::new(Secp256k1Verifier);
        let record = ChainRecord {
            consensus: config.consensus.clone(),
            blocks,
        };
        let chain = Chain::from_record(record, verifier.as_ref())?;
        let mut ledger = Self {
            mempool: Mempool::with_capacity(config.mempool_capacity),
            config,
            chain,
            keyring,
            verifier,
        };
        for tx in pending {
            ledger.submit_transaction(tx)?;
        }

        info!(
            "Restored ledger at height {} with {} pending transactions",
            ledger.chain.height(),
            ledger.mempool.len()
        );
        Ok(ledger)
    }

    /// Replace the signature verifier
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier + Send + Sync>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Hold a validator's key so this node can seal stake blocks for it
    pub fn register_validator(&mut self, key: KeyPair) -> Address {
        let address = self.keyring.insert(key);
        info!("Registered validator key for {}", address);
        address
    }

    /// Build and sign a payment against outputs not already claimed by the mempool
    pub fn create_transaction(
        &self,
        spender: &Address,
        recipient: &Address,
        amount: u64,
        fee: u64,
        signer: &dyn Signer,
    ) -> LedgerResult<Transaction> {
        let view = PendingView::new(self.chain.utxo_set(), self.mempool.claimed());
        wallet::create_transaction(spender, recipient, amount, fee, &view, signer)
    }

    /// Validate a transaction and add it to the mempool
    pub fn submit_transaction(&mut self, tx: Transaction) -> LedgerResult<String> {
        let tx_id = tx.id.clone();
        let fee = self
            .mempool
            .add(tx, self.chain.utxo_set(), self.verifier.as_ref())?;
        info!("Accepted transaction {} (fee {})", tx_id, fee);
        Ok(tx_id)
    }

    /// Submit, then seal a block if the configured policy asks for one.
    ///
    /// `Err` means the transaction was rejected. Once it is pooled the call
    /// succeeds, even if the seal that follows fails.
    pub fn submit_with_policy(&mut self, tx: Transaction) -> LedgerResult<SubmitOutcome> {
        let tx_id = self.submit_transaction(tx)?;
        let mut outcome = SubmitOutcome {
            tx_id,
            sealed_block: None,
            seal_error: None,
        };

        let due = match self.config.seal_policy {
            SealPolicy::Manual => false,
            SealPolicy::WhenPending { count } => self.mempool.len() >= count.max(1),
        };
        if due {
            match self.assemble_and_append_block(BlockParams::default()) {
                Ok(hash) => outcome.sealed_block = Some(hash),
                Err(e) => {
                    warn!("Seal policy failed after accepting {}: {}", outcome.tx_id, e);
                    outcome.seal_error = Some(e);
                }
            }
        }

        Ok(outcome)
    }

    /// Pending transactions a block built with `params` would carry
    pub fn select_for_block(&self, params: &BlockParams) -> Vec<Transaction> {
        let limit = params
            .max_transactions
            .unwrap_or(self.config.max_block_transactions)
            .min(MAX_BLOCK_TXS);
        self.mempool.select(limit)
    }

    /// Assemble a sealed candidate on the current tip without appending it
    pub fn assemble_block(&self, params: &BlockParams) -> LedgerResult<Block> {
        let transactions = self.select_for_block(params);
        let tip_hash = self.chain.tip_hash();
        let stake_weights = self.chain.stake_weights();
        let ctx = AssemblyContext {
            previous_hash: &tip_hash,
            stake_weights: &stake_weights,
            seed: params.seed.unwrap_or_else(|| seed_from_tip(&tip_hash)),
            keyring: &self.keyring,
        };

        self.chain.consensus().assemble(transactions, &ctx)
    }

    /// Append a block, then drop its transactions and anything it invalidated
    /// from the mempool
    pub fn append_block(&mut self, block: Block) -> LedgerResult<String> {
        let confirmed: Vec<String> = block.transactions.iter().map(|tx| tx.id.clone()).collect();
        let hash = self.chain.append(block, self.verifier.as_ref())?;

        self.mempool.remove(&confirmed);
        self.mempool
            .prune(self.chain.utxo_set(), self.verifier.as_ref());
        Ok(hash)
    }

    pub fn assemble_and_append_block(&mut self, params: BlockParams) -> LedgerResult<String> {
        let block = self.assemble_block(&params)?;
        self.append_block(block)
    }

    /// Confirmed balance at the tip
    pub fn balance(&self, address: &Address) -> u128 {
        get_balance(address, self.chain.utxo_set())
    }

    /// Confirmed balance minus outputs already claimed by pending spends
    pub fn spendable_balance(&self, address: &Address) -> u128 {
        let view = PendingView::new(self.chain.utxo_set(), self.mempool.claimed());
        get_balance(address, &view)
    }

    pub fn tip(&self) -> TipSummary {
        let tip = self.chain.tip();
        TipSummary {
            height: self.chain.height(),
            hash: tip.hash(),
            timestamp: tip.header.timestamp,
            transactions: tip.tx_count(),
            consensus: self.chain.consensus().name().to_string(),
            utxo_count: self.chain.utxo_set().len(),
            pending: self.mempool.len(),
        }
    }

    /// Locate a confirmed transaction and prove it against its block's merkle root
    pub fn inclusion_proof(&self, tx_id: &str) -> Option<InclusionProof> {
        self.chain
            .blocks()
            .iter()
            .enumerate()
            .find_map(|(height, block)| {
                block.inclusion_proof(tx_id).map(|proof| InclusionProof {
                    height: height as u64,
                    block_hash: block.hash(),
                    merkle_root: block.header.merkle_root.clone(),
                    proof,
                })
            })
    }

    pub fn list_mempool(&self) -> Vec<TxSummary> {
        self.mempool.summaries()
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.chain.check_invariants()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }
}
