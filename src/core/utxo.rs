//! Unspent transaction output tracking
//!
//! [`UtxoSet`] is the authoritative spendable state. It is only mutated by
//! block application (and genesis), never by validation. Read access goes
//! through the [`UtxoView`] trait so the mempool can layer its own claims on
//! top without copying the set.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::address::Address;
use crate::core::transaction::{Outpoint, Transaction};

/// Unspent Transaction Output (UTXO)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: Outpoint,
    pub amount: u64,
    pub owner: Address,
}

/// Read-only access to spendable outputs
pub trait UtxoView {
    /// Look up an unspent output
    fn get(&self, outpoint: &Outpoint) -> Option<&Utxo>;

    /// Unspent outputs owned by `address`, in outpoint order
    fn owned_by(&self, address: &Address) -> Vec<&Utxo>;

    fn contains(&self, outpoint: &Outpoint) -> bool {
        self.get(outpoint).is_some()
    }
}

/// Sum of the amounts owned by an address
pub fn get_balance(address: &Address, view: &dyn UtxoView) -> u128 {
    view.owned_by(address)
        .iter()
        .map(|utxo| utxo.amount as u128)
        .sum()
}

/// Mapping outpoint -> UTXO, ordered for deterministic iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    entries: BTreeMap<Outpoint, Utxo>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the outputs a transaction consumes and insert the ones it creates.
    ///
    /// Callers validate first; this step never fails.
    pub fn apply_transaction(&mut self, tx: &Transaction) {
        for outpoint in tx.spent_outpoints() {
            self.entries.remove(outpoint);
        }
        for utxo in tx.created_utxos() {
            self.entries.insert(utxo.outpoint.clone(), utxo);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.entries.values()
    }

    /// Total value held in unspent outputs
    pub fn total_value(&self) -> u128 {
        self.entries.values().map(|u| u.amount as u128).sum()
    }

    /// Balance of each address in `addresses` (zero when it owns nothing)
    pub fn balances_of<'a>(
        &self,
        addresses: impl IntoIterator<Item = &'a Address>,
    ) -> BTreeMap<Address, u64> {
        let mut balances: BTreeMap<Address, u64> =
            addresses.into_iter().map(|address| (*address, 0)).collect();

        for utxo in self.entries.values() {
            if let Some(balance) = balances.get_mut(&utxo.owner) {
                *balance = balance.saturating_add(utxo.amount);
            }
        }

        balances
    }
}

impl UtxoView for UtxoSet {
    fn get(&self, outpoint: &Outpoint) -> Option<&Utxo> {
        self.entries.get(outpoint)
    }

    fn owned_by(&self, address: &Address) -> Vec<&Utxo> {
        self.entries
            .values()
            .filter(|utxo| utxo.owner == *address)
            .collect()
    }
}

/// A UTXO set with some outpoints hidden because pending transactions claim them
pub struct PendingView<'a> {
    base: &'a UtxoSet,
    claimed: &'a HashSet<Outpoint>,
}

impl<'a> PendingView<'a> {
    pub fn new(base: &'a UtxoSet, claimed: &'a HashSet<Outpoint>) -> Self {
        Self { base, claimed }
    }
}

impl UtxoView for PendingView<'_> {
    fn get(&self, outpoint: &Outpoint) -> Option<&Utxo> {
        if self.claimed.contains(outpoint) {
            return None;
        }
        self.base.get(outpoint)
    }

    fn owned_by(&self, address: &Address) -> Vec<&Utxo> {
        self.base
            .owned_by(address)
            .into_iter()
            .filter(|utxo| !self.claimed.contains(&utxo.outpoint))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{TxInput, TxOutput};
    use crate::crypto::{KeyPair, Signer};

    fn addr(name: &str) -> Address {
        KeyPair::from_seed(name).unwrap().address()
    }

    #[test]
    fn test_apply_transaction() {
        let alice = addr("alice");
        let bob = addr("bob");
        let genesis = Transaction::genesis_allocation(&[(alice, 100)]);

        let mut set = UtxoSet::new();
        set.apply_transaction(&genesis);
        assert_eq!(get_balance(&alice, &set), 100);

        let spend = Transaction::new(
            vec![TxInput::unsigned(Outpoint::new(genesis.id.clone(), 0))],
            vec![TxOutput::new(bob, 60), TxOutput::new(alice, 39)],
        );
        set.apply_transaction(&spend);

        assert!(!set.contains(&Outpoint::new(genesis.id.clone(), 0)));
        assert_eq!(get_balance(&alice, &set), 39);
        assert_eq!(get_balance(&bob, &set), 60);
        assert_eq!(set.total_value(), 99);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_pending_view_hides_claims() {
        let alice = addr("alice");
        let genesis = Transaction::genesis_allocation(&[(alice, 10), (alice, 20)]);
        let mut set = UtxoSet::new();
        set.apply_transaction(&genesis);

        let mut claimed = HashSet::new();
        claimed.insert(Outpoint::new(genesis.id.clone(), 0));
        let view = PendingView::new(&set, &claimed);

        assert!(view.get(&Outpoint::new(genesis.id.clone(), 0)).is_none());
        assert!(view.get(&Outpoint::new(genesis.id.clone(), 1)).is_some());
        assert_eq!(get_balance(&alice, &view), 20);
        assert_eq!(get_balance(&alice, &set), 30);
    }

    #[test]
    fn test_balances_of() {
        let alice = addr("alice");
        let bob = addr("bob");
        let carol = addr("carol");
        let genesis = Transaction::genesis_allocation(&[(alice, 10), (bob, 5), (alice, 1)]);
        let mut set = UtxoSet::new();
        set.apply_transaction(&genesis);

        let balances = set.balances_of([&alice, &carol]);
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[&alice], 11);
        assert_eq!(balances[&carol], 0);
    }
}
