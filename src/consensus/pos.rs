//! Mock proof of stake
//!
//! A validator is drawn from the stake weights with probability proportional
//! to its stake. The draw uses a `StdRng` seeded only by the caller's seed, so
//! the same seed and weights always pick the same validator. The winner
//! signs the header digest. Verification checks that signature and that the
//! validator holds stake; it does not replay the draw.

use std::collections::BTreeMap;

use chrono::Utc;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::{
    compute_merkle_root, Address, Block, BlockHeader, LedgerError, LedgerResult, Seal,
    Transaction, UtxoSet,
};
use crate::crypto::{SignatureVerifier, Signer};
use crate::wallet::Keyring;

/// Stake held by each candidate validator, iterated in address order
pub type StakeWeights = BTreeMap<Address, u64>;

/// Mock proof-of-stake rule over a fixed validator set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockProofOfStake {
    /// Addresses allowed to propose; their balance is their stake
    validators: Vec<Address>,
}

impl MockProofOfStake {
    pub fn new(validators: Vec<Address>) -> Self {
        let mut validators = validators;
        validators.sort();
        validators.dedup();
        Self { validators }
    }

    pub fn validators(&self) -> &[Address] {
        &self.validators
    }

    /// Current balance of every validator
    pub fn stake_weights(&self, utxos: &UtxoSet) -> StakeWeights {
        utxos.balances_of(&self.validators)
    }

    /// Weighted draw over `weights` driven only by `seed`.
    ///
    /// Zero-stake entries can never be selected; `None` when nobody has stake.
    pub fn select_validator(weights: &StakeWeights, seed: u64) -> Option<Address> {
        let total: u128 = weights.values().map(|w| *w as u128).sum();
        if total == 0 {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut ticket = rng.gen_range(0..total);

        for (address, weight) in weights {
            let weight = *weight as u128;
            if ticket < weight {
                return Some(*address);
            }
            ticket -= weight;
        }

        None
    }

    /// Build a block over `transactions` sealed by the drawn validator
    pub fn assemble(
        transactions: Vec<Transaction>,
        previous_hash: &str,
        stake_weights: &StakeWeights,
        seed: u64,
        keyring: &Keyring,
    ) -> LedgerResult<Block> {
        let validator =
            Self::select_validator(stake_weights, seed).ok_or(LedgerError::NoEligibleValidator)?;
        let key = keyring.get(&validator).ok_or_else(|| {
            debug!("validator {} drawn but its key is not in the keyring", validator);
            LedgerError::NoEligibleValidator
        })?;

        let mut header = BlockHeader::build(
            previous_hash,
            compute_merkle_root(&transactions),
            Utc::now(),
            Seal::Stake {
                seed,
                validator,
                public_key: key.public_key_hex(),
                signature: String::new(),
            },
        );

        let signature = hex::encode(key.sign(&header.signing_digest())?);
        if let Seal::Stake { signature: slot, .. } = &mut header.seal {
            *slot = signature;
        }

        info!(
            "Validator {} sealed block {} (seed {}, {} txs)",
            validator,
            &header.hash()[..16],
            seed,
            transactions.len()
        );

        Ok(Block::new(header, transactions))
    }

    /// Check the validator's signature and that it had stake
    pub fn verify(
        block: &Block,
        stake_weights: &StakeWeights,
        verifier: &dyn SignatureVerifier,
    ) -> bool {
        let Seal::Stake {
            validator,
            public_key,
            signature,
            ..
        } = &block.header.seal
        else {
            return false;
        };

        let key_matches = Address::from_public_key_hex(public_key)
            .map(|address| address == *validator)
            .unwrap_or(false);
        if !key_matches {
            return false;
        }

        let has_stake = stake_weights.get(validator).copied().unwrap_or(0) > 0;
        if !has_stake {
            return false;
        }

        verifier.verify(public_key, &block.header.signing_digest(), signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GENESIS_PREVIOUS_HASH;
    use crate::crypto::{KeyPair, Secp256k1Verifier};

    fn keyring(names: &[&str]) -> (Keyring, Vec<Address>) {
        let mut keyring = Keyring::new();
        let mut addresses = Vec::new();
        for name in names {
            let key = KeyPair::from_seed(name).unwrap();
            addresses.push(key.address());
            keyring.insert(key);
        }
        (keyring, addresses)
    }

    #[test]
    fn test_selection_is_deterministic() {
        let (_, addresses) = keyring(&["v1", "v2", "v3"]);
        let weights: StakeWeights = addresses.iter().map(|a| (*a, 10)).collect();

        for seed in 0..20 {
            let first = MockProofOfStake::select_validator(&weights, seed);
            let second = MockProofOfStake::select_validator(&weights, seed);
            assert_eq!(first, second);
            assert!(first.is_some());
        }
    }

    #[test]
    fn test_zero_stake_never_selected() {
        let (_, addresses) = keyring(&["rich", "poor"]);
        let mut weights = StakeWeights::new();
        weights.insert(addresses[0], 50);
        weights.insert(addresses[1], 0);

        for seed in 0..100 {
            assert_eq!(
                MockProofOfStake::select_validator(&weights, seed),
                Some(addresses[0])
            );
        }
    }

    #[test]
    fn test_no_stake_no_validator() {
        let (keys, addresses) = keyring(&["v1"]);
        let weights: StakeWeights = addresses.iter().map(|a| (*a, 0)).collect();
        assert!(MockProofOfStake::select_validator(&weights, 1).is_none());
        assert!(MockProofOfStake::select_validator(&StakeWeights::new(), 1).is_none());
        assert!(matches!(
            MockProofOfStake::assemble(vec![], GENESIS_PREVIOUS_HASH, &weights, 1, &keys),
            Err(LedgerError::NoEligibleValidator)
        ));
    }

    #[test]
    fn test_selection_roughly_follows_stake() {
        let (_, addresses) = keyring(&["whale", "minnow"]);
        let mut weights = StakeWeights::new();
        weights.insert(addresses[0], 900);
        weights.insert(addresses[1], 100);

        let whale_wins = (0..1_000)
            .filter(|seed| MockProofOfStake::select_validator(&weights, *seed) == Some(addresses[0]))
            .count();
        assert!(whale_wins > 800, "whale won only {} draws", whale_wins);
    }

    #[test]
    fn test_assemble_and_verify() {
        let (keys, addresses) = keyring(&["v1", "v2"]);
        let weights: StakeWeights = addresses.iter().map(|a| (*a, 25)).collect();

        let block =
            MockProofOfStake::assemble(vec![], GENESIS_PREVIOUS_HASH, &weights, 42, &keys).unwrap();
        assert!(block.verify_merkle_root());
        assert!(MockProofOfStake::verify(&block, &weights, &Secp256k1Verifier));

        let Seal::Stake { validator, .. } = &block.header.seal else {
            panic!("expected a stake seal");
        };
        assert_eq!(
            Some(*validator),
            MockProofOfStake::select_validator(&weights, 42)
        );
    }

    #[test]
    fn test_verify_requires_stake() {
        let (keys, addresses) = keyring(&["v1"]);
        let weights: StakeWeights = addresses.iter().map(|a| (*a, 5)).collect();
        let block =
            MockProofOfStake::assemble(vec![], GENESIS_PREVIOUS_HASH, &weights, 3, &keys).unwrap();

        let drained: StakeWeights = addresses.iter().map(|a| (*a, 0)).collect();
        assert!(!MockProofOfStake::verify(&block, &drained, &Secp256k1Verifier));
    }

    #[test]
    fn test_verify_rejects_forged_signature() {
        let (keys, addresses) = keyring(&["v1"]);
        let weights: StakeWeights = addresses.iter().map(|a| (*a, 5)).collect();
        let mut block =
            MockProofOfStake::assemble(vec![], GENESIS_PREVIOUS_HASH, &weights, 3, &keys).unwrap();

        // Header changed after signing
        block.header.merkle_root = "00".repeat(32);
        assert!(!MockProofOfStake::verify(&block, &weights, &Secp256k1Verifier));
    }

    #[test]
    fn test_verify_rejects_key_for_other_address() {
        let (keys, addresses) = keyring(&["v1"]);
        let weights: StakeWeights = addresses.iter().map(|a| (*a, 5)).collect();
        let mut block =
            MockProofOfStake::assemble(vec![], GENESIS_PREVIOUS_HASH, &weights, 3, &keys).unwrap();

        let impostor = KeyPair::from_seed("impostor").unwrap();
        if let Seal::Stake { public_key, .. } = &mut block.header.seal {
            *public_key = impostor.public_key_hex();
        }
        assert!(!MockProofOfStake::verify(&block, &weights, &Secp256k1Verifier));
    }

    #[test]
    fn test_missing_key_is_not_eligible() {
        let (_, addresses) = keyring(&["v1"]);
        let weights: StakeWeights = addresses.iter().map(|a| (*a, 5)).collect();
        assert!(matches!(
            MockProofOfStake::assemble(vec![], GENESIS_PREVIOUS_HASH, &weights, 3, &Keyring::new()),
            Err(LedgerError::NoEligibleValidator)
        ));
    }
}
