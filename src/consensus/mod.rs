//! Consensus rules
//!
//! The two rules share one contract, `assemble` a candidate block from
//! selected transactions and `verify` a block someone else produced, and are
//! modelled as a closed enum rather than trait objects.

pub mod pos;
pub mod pow;

use serde::{Deserialize, Serialize};

use crate::core::{Block, LedgerResult, Transaction, UtxoSet};
use crate::crypto::SignatureVerifier;
use crate::wallet::Keyring;

pub use pos::{MockProofOfStake, StakeWeights};
pub use pow::{MiningStats, ProofOfWork, DEFAULT_DIFFICULTY, MAX_POW_DIFFICULTY};

/// Inputs a rule may need while assembling a block
pub struct AssemblyContext<'a> {
    /// Hash of the block being built upon
    pub previous_hash: &'a str,
    /// Stake at the parent tip (ignored by proof of work)
    pub stake_weights: &'a StakeWeights,
    /// Sole randomness source of the stake draw
    pub seed: u64,
    /// Signing keys available to this node
    pub keyring: &'a Keyring,
}

/// The active consensus rule of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Consensus {
    ProofOfWork(ProofOfWork),
    MockProofOfStake(MockProofOfStake),
}

impl Consensus {
    pub fn name(&self) -> &'static str {
        match self {
            Consensus::ProofOfWork(_) => "proof-of-work",
            Consensus::MockProofOfStake(_) => "mock-proof-of-stake",
        }
    }

    /// Stake weights derived from the UTXO set at the parent tip
    pub fn stake_weights(&self, utxos: &UtxoSet) -> StakeWeights {
        match self {
            Consensus::ProofOfWork(_) => StakeWeights::new(),
            Consensus::MockProofOfStake(pos) => pos.stake_weights(utxos),
        }
    }

    /// Build a sealed block containing exactly `transactions`
    pub fn assemble(
        &self,
        transactions: Vec<Transaction>,
        ctx: &AssemblyContext<'_>,
    ) -> LedgerResult<Block> {
        match self {
            Consensus::ProofOfWork(pow) => {
                let (block, _) =
                    ProofOfWork::assemble(transactions, ctx.previous_hash, pow.difficulty());
                Ok(block)
            }
            Consensus::MockProofOfStake(_) => MockProofOfStake::assemble(
                transactions,
                ctx.previous_hash,
                ctx.stake_weights,
                ctx.seed,
                ctx.keyring,
            ),
        }
    }

    /// Check the block's seal under this rule
    pub fn verify(
        &self,
        block: &Block,
        stake_weights: &StakeWeights,
        verifier: &dyn SignatureVerifier,
    ) -> bool {
        match self {
            Consensus::ProofOfWork(pow) => ProofOfWork::verify(block, pow.difficulty()),
            Consensus::MockProofOfStake(_) => {
                MockProofOfStake::verify(block, stake_weights, verifier)
            }
        }
    }
}

impl Default for Consensus {
    fn default() -> Self {
        Consensus::ProofOfWork(ProofOfWork::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GENESIS_PREVIOUS_HASH;
    use crate::crypto::{KeyPair, Secp256k1Verifier, Signer};

    #[test]
    fn test_pow_variant_roundtrip() {
        let consensus = Consensus::ProofOfWork(ProofOfWork::new(6));
        let keyring = Keyring::new();
        let weights = StakeWeights::new();
        let ctx = AssemblyContext {
            previous_hash: GENESIS_PREVIOUS_HASH,
            stake_weights: &weights,
            seed: 0,
            keyring: &keyring,
        };

        let block = consensus.assemble(vec![], &ctx).unwrap();
        assert!(consensus.verify(&block, &weights, &Secp256k1Verifier));
    }

    #[test]
    fn test_variants_reject_each_other() {
        let validator = KeyPair::from_seed("validator").unwrap();
        let mut keyring = Keyring::new();
        keyring.insert(validator.clone());
        let weights: StakeWeights = [(validator.address(), 10)].into_iter().collect();
        let ctx = AssemblyContext {
            previous_hash: GENESIS_PREVIOUS_HASH,
            stake_weights: &weights,
            seed: 9,
            keyring: &keyring,
        };

        let pow = Consensus::ProofOfWork(ProofOfWork::new(0));
        let pos = Consensus::MockProofOfStake(MockProofOfStake::new(vec![validator.address()]));

        let staked = pos.assemble(vec![], &ctx).unwrap();
        let worked = pow.assemble(vec![], &ctx).unwrap();

        assert!(pos.verify(&staked, &weights, &Secp256k1Verifier));
        assert!(!pow.verify(&staked, &weights, &Secp256k1Verifier));
        assert!(!pos.verify(&worked, &weights, &Secp256k1Verifier));
    }

    #[test]
    fn test_consensus_serde() {
        let consensus = Consensus::ProofOfWork(ProofOfWork::new(10));
        let json = serde_json::to_string(&consensus).unwrap();
        assert!(json.contains("proof_of_work"));
        let back: Consensus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, consensus);
    }
}
