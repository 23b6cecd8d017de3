//! Concurrent access to one ledger
//!
//! [`SharedLedger`] is a cloneable handle around an `Arc<RwLock<..>>`.
//! Submission and block append each hold the write lock from validation
//! through application, so two callers can never both spend one output.
//! [`SharedLedger::mine_detached`] runs the nonce search off the lock and
//! on a blocking thread; it is abandoned as soon as any other block lands.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::consensus::{Consensus, ProofOfWork};
use crate::core::{Address, Block, InvariantViolation, LedgerError, LedgerResult, Transaction};
use crate::crypto::Signer;
use crate::ledger::config::BlockParams;
use crate::ledger::engine::{Ledger, TipSummary};
use crate::mining::TxSummary;

/// Attempts a detached search makes before giving up on a moving tip
pub const MAX_SEAL_ATTEMPTS: usize = 3;

struct Inner {
    ledger: Ledger,
    /// Cancelled and replaced every time the tip moves
    tip_changed: CancellationToken,
}

impl Inner {
    fn advance_tip(&mut self) {
        self.tip_changed.cancel();
        self.tip_changed = CancellationToken::new();
    }

    fn append(&mut self, block: Block) -> LedgerResult<String> {
        let hash = self.ledger.append_block(block)?;
        self.advance_tip();
        Ok(hash)
    }
}

/// Shared, lock-protected ledger handle
#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<Inner>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                ledger,
                tip_changed: CancellationToken::new(),
            })),
        }
    }

    /// Take the ledger back once no other handle remains
    pub fn into_ledger(self) -> Result<Ledger, Self> {
        Arc::try_unwrap(self.inner)
            .map(|lock| lock.into_inner().ledger)
            .map_err(|inner| Self { inner })
    }

    /// Token that fires the next time a block is appended
    pub async fn tip_changed(&self) -> CancellationToken {
        self.inner.read().await.tip_changed.child_token()
    }

    pub async fn submit_transaction(&self, tx: Transaction) -> LedgerResult<String> {
        self.inner.write().await.ledger.submit_transaction(tx)
    }

    pub async fn append_block(&self, block: Block) -> LedgerResult<String> {
        self.inner.write().await.append(block)
    }

    /// Seal a block from the mempool and append it.
    ///
    /// Work is searched through [`SharedLedger::mine_detached`] so the lock
    /// is never held during a nonce search; stake blocks are assembled and
    /// appended under one write lock.
    pub async fn assemble_and_append_block(&self, params: BlockParams) -> LedgerResult<String> {
        let is_work = matches!(
            self.inner.read().await.ledger.chain().consensus(),
            Consensus::ProofOfWork(_)
        );
        if is_work {
            self.mine_detached(params).await
        } else {
            self.seal_locked(params).await
        }
    }

    async fn seal_locked(&self, params: BlockParams) -> LedgerResult<String> {
        let mut inner = self.inner.write().await;
        let block = inner.ledger.assemble_block(&params)?;
        inner.append(block)
    }

    /// Seal a block without holding the lock during the nonce search.
    ///
    /// The candidate is snapshotted under a read lock and searched on a
    /// blocking thread. If another block is appended first the search is
    /// cancelled (or the append reports a stale tip) and the candidate is
    /// rebuilt, up to [`MAX_SEAL_ATTEMPTS`] times. Stake sealing is cheap and
    /// simply runs under the write lock.
    pub async fn mine_detached(&self, params: BlockParams) -> LedgerResult<String> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let candidate = {
                let inner = self.inner.read().await;
                match inner.ledger.chain().consensus() {
                    Consensus::ProofOfWork(pow) => Some((
                        inner.ledger.select_for_block(&params),
                        inner.ledger.chain().tip_hash(),
                        pow.difficulty(),
                        inner.tip_changed.child_token(),
                    )),
                    Consensus::MockProofOfStake(_) => None,
                }
            };

            let Some((transactions, previous_hash, difficulty, cancel)) = candidate else {
                return self.seal_locked(params).await;
            };

            let parent = previous_hash.clone();
            let found = tokio::task::spawn_blocking(move || {
                ProofOfWork::assemble_cancellable(transactions, &parent, difficulty, &cancel)
            })
            .await
            .map_err(|e| LedgerError::InvalidBlock(format!("mining task failed: {}", e)))?;

            let stale = match found {
                Some((block, stats)) => match self.append_block(block).await {
                    Ok(hash) => {
                        info!(
                            "Detached search sealed {} ({} hashes, {:.2} H/s)",
                            &hash[..16],
                            stats.hash_attempts,
                            stats.hash_rate
                        );
                        return Ok(hash);
                    }
                    Err(e @ LedgerError::StaleTip { .. }) => e,
                    Err(e) => return Err(e),
                },
                None => {
                    debug!("Nonce search on {} cancelled", &previous_hash[..16]);
                    LedgerError::StaleTip {
                        expected: self.inner.read().await.ledger.chain().tip_hash(),
                        found: previous_hash,
                    }
                }
            };

            if attempt >= MAX_SEAL_ATTEMPTS {
                return Err(stale);
            }
            warn!("Seal attempt {} lost the race: {}", attempt, stale);
        }
    }

    pub async fn create_transaction(
        &self,
        spender: &Address,
        recipient: &Address,
        amount: u64,
        fee: u64,
        signer: &(dyn Signer + Sync),
    ) -> LedgerResult<Transaction> {
        self.inner
            .read()
            .await
            .ledger
            .create_transaction(spender, recipient, amount, fee, signer)
    }

    pub async fn balance(&self, address: &Address) -> u128 {
        self.inner.read().await.ledger.balance(address)
    }

    pub async fn tip(&self) -> TipSummary {
        self.inner.read().await.ledger.tip()
    }

    pub async fn list_mempool(&self) -> Vec<TxSummary> {
        self.inner.read().await.ledger.list_mempool()
    }

    pub async fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.inner.read().await.ledger.check_invariants()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::consensus::MAX_POW_DIFFICULTY;
    use crate::ledger::LedgerConfig;
    use crate::wallet::{self, Wallet};

    fn shared(allocations: &[(Address, u64)]) -> SharedLedger {
        let config = LedgerConfig {
            consensus: Consensus::ProofOfWork(ProofOfWork::new(4)),
            ..LedgerConfig::default()
        };
        SharedLedger::new(Ledger::new(config, allocations).unwrap())
    }

    #[tokio::test]
    async fn test_concurrent_conflicting_submissions() {
        let alice = Wallet::from_name("alice").unwrap();
        let bob = Wallet::from_name("bob").unwrap();
        let carol = Wallet::from_name("carol").unwrap();
        let allocations = [(alice.address(), 100)];
        let ledger = shared(&allocations);

        // Both spend the same genesis output
        let mut utxos = crate::core::UtxoSet::new();
        utxos.apply_transaction(&Transaction::genesis_allocation(&allocations));
        let to_bob = wallet::create_transaction(
            &alice.address(),
            &bob.address(),
            40,
            0,
            &utxos,
            alice.key_pair(),
        )
        .unwrap();
        let to_carol = wallet::create_transaction(
            &alice.address(),
            &carol.address(),
            40,
            0,
            &utxos,
            alice.key_pair(),
        )
        .unwrap();

        let (a, b) = {
            let first = ledger.clone();
            let second = ledger.clone();
            tokio::join!(
                tokio::spawn(async move { first.submit_transaction(to_bob).await }),
                tokio::spawn(async move { second.submit_transaction(to_carol).await })
            )
        };
        let results = [a.unwrap(), b.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(LedgerError::DoubleSpendOrUnknownInput(_)))));
        assert_eq!(ledger.list_mempool().await.len(), 1);
    }

    #[tokio::test]
    async fn test_mine_detached_confirms_pending() {
        let alice = Wallet::from_name("alice").unwrap();
        let bob = Wallet::from_name("bob").unwrap();
        let ledger = shared(&[(alice.address(), 100)]);

        let tx = ledger
            .create_transaction(&alice.address(), &bob.address(), 25, 5, alice.key_pair())
            .await
            .unwrap();
        ledger.submit_transaction(tx).await.unwrap();

        let hash = ledger.mine_detached(BlockParams::default()).await.unwrap();

        assert_eq!(ledger.tip().await.hash, hash);
        assert_eq!(ledger.balance(&bob.address()).await, 25);
        assert_eq!(ledger.balance(&alice.address()).await, 70);
        assert!(ledger.list_mempool().await.is_empty());
    }

    #[tokio::test]
    async fn test_append_cancels_outstanding_search() {
        let ledger = shared(&[]);
        let token = ledger.tip_changed().await;
        assert!(!token.is_cancelled());

        ledger
            .assemble_and_append_block(BlockParams::default())
            .await
            .unwrap();

        assert!(token.is_cancelled());
        assert!(!ledger.tip_changed().await.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pow_search_does_not_hold_the_lock() {
        let alice = Wallet::from_name("alice").unwrap();
        let bob = Wallet::from_name("bob").unwrap();
        let config = LedgerConfig {
            consensus: Consensus::ProofOfWork(ProofOfWork::new(MAX_POW_DIFFICULTY)),
            ..LedgerConfig::default()
        };
        let ledger = SharedLedger::new(Ledger::new(config, &[(alice.address(), 100)]).unwrap());
        let tx = ledger
            .create_transaction(&alice.address(), &bob.address(), 10, 0, alice.key_pair())
            .await
            .unwrap();

        let sealer = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .assemble_and_append_block(BlockParams::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // A writer gets through while the search is still running
        let submitted = tokio::time::timeout(Duration::from_secs(5), ledger.submit_transaction(tx))
            .await
            .expect("submit blocked behind the nonce search");
        assert!(submitted.is_ok());
        assert!(!sealer.is_finished());

        // Moving the tip abandons each attempt until the sealer gives up
        while !sealer.is_finished() {
            ledger.inner.write().await.advance_tip();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(
            sealer.await.unwrap(),
            Err(LedgerError::StaleTip { .. })
        ));
        assert_eq!(ledger.tip().await.height, 0);
        assert_eq!(ledger.list_mempool().await.len(), 1);
    }

    #[tokio::test]
    async fn test_racing_sealers_both_land() {
        let ledger = shared(&[]);

        let (detached, locked) = tokio::join!(
            ledger.mine_detached(BlockParams::default()),
            ledger.assemble_and_append_block(BlockParams::default())
        );

        assert!(detached.is_ok());
        assert!(locked.is_ok());
        assert_eq!(ledger.tip().await.height, 2);
        assert!(ledger.check_invariants().await.is_ok());
    }
}
