//! Proof of work
//!
//! Nonce search over the block header: starting at zero, the nonce is
//! incremented until the double SHA-256 of the header falls strictly below
//! the target for the configured difficulty.

use std::time::Instant;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::{compute_merkle_root, Block, BlockHeader, Seal, Transaction};
use crate::crypto::{calculate_target, is_below_target};

/// Default mining difficulty (number of leading zero bits)
pub const DEFAULT_DIFFICULTY: u32 = 12;

/// Highest difficulty accepted; keeps searches short enough for a simulator
pub const MAX_POW_DIFFICULTY: u32 = 32;

/// How many nonces are tried between cancellation checks
const CANCEL_CHECK_INTERVAL: u64 = 1_024;

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn new(hash_attempts: u64, started: Instant) -> Self {
        let time_ms = started.elapsed().as_millis();
        let hash_rate = if time_ms > 0 {
            (hash_attempts as f64) / (time_ms as f64 / 1000.0)
        } else {
            hash_attempts as f64
        };

        Self {
            hash_attempts,
            time_ms,
            hash_rate,
        }
    }
}

/// Proof-of-work rule with a fixed difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWork {
    difficulty: u32,
}

impl ProofOfWork {
    /// Create the rule, clamping the difficulty to [`MAX_POW_DIFFICULTY`]
    pub fn new(difficulty: u32) -> Self {
        if difficulty > MAX_POW_DIFFICULTY {
            warn!(
                "Difficulty {} clamped to {}",
                difficulty, MAX_POW_DIFFICULTY
            );
        }
        Self {
            difficulty: difficulty.min(MAX_POW_DIFFICULTY),
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty.min(MAX_POW_DIFFICULTY)
    }

    /// Build a block over `transactions` and search for a valid nonce
    pub fn assemble(
        transactions: Vec<Transaction>,
        previous_hash: &str,
        difficulty: u32,
    ) -> (Block, MiningStats) {
        // A token nobody holds never fires, so the first pass completes
        let cancel = CancellationToken::new();
        loop {
            if let Some(found) =
                Self::assemble_cancellable(transactions.clone(), previous_hash, difficulty, &cancel)
            {
                return found;
            }
        }
    }

    /// Like [`ProofOfWork::assemble`], but gives up once `cancel` fires
    pub fn assemble_cancellable(
        transactions: Vec<Transaction>,
        previous_hash: &str,
        difficulty: u32,
        cancel: &CancellationToken,
    ) -> Option<(Block, MiningStats)> {
        let difficulty = difficulty.min(MAX_POW_DIFFICULTY);
        let mut header = BlockHeader::build(
            previous_hash,
            compute_merkle_root(&transactions),
            Utc::now(),
            Seal::Work {
                difficulty,
                nonce: 0,
            },
        );

        info!(
            "Mining block on {} with difficulty {} ({} txs)...",
            &previous_hash[..previous_hash.len().min(16)],
            difficulty,
            transactions.len()
        );

        let stats = search(&mut header, difficulty, cancel)?;

        info!(
            "Block {} mined in {}ms ({} attempts, {:.2} H/s)",
            &header.hash()[..16],
            stats.time_ms,
            stats.hash_attempts,
            stats.hash_rate
        );

        Some((Block::new(header, transactions), stats))
    }

    /// Check the header hash against the target; independent of the producer
    pub fn verify(block: &Block, difficulty: u32) -> bool {
        if !matches!(block.header.seal, Seal::Work { .. }) {
            return false;
        }
        let target = calculate_target(difficulty.min(MAX_POW_DIFFICULTY));
        is_below_target(&block.header.hash_bytes(), &target)
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

/// Increment the nonce until the header meets the target or the search is cancelled
fn search(
    header: &mut BlockHeader,
    difficulty: u32,
    cancel: &CancellationToken,
) -> Option<MiningStats> {
    let started = Instant::now();
    let target = calculate_target(difficulty);
    let mut attempts = 0u64;

    loop {
        if let Seal::Work { nonce, .. } = &mut header.seal {
            *nonce = attempts;
        }
        attempts += 1;

        if is_below_target(&header.hash_bytes(), &target) {
            return Some(MiningStats::new(attempts, started));
        }

        if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            info!("Nonce search abandoned after {} attempts", attempts);
            return None;
        }

        // Exhausted the nonce space: move the timestamp and start over
        if attempts == u64::MAX {
            header.timestamp = Utc::now();
            attempts = 0;
        }
    }
}
