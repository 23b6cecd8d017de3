//! Signing keys held by this node, looked up by address

use std::collections::HashMap;

use crate::core::Address;
use crate::crypto::{KeyPair, Signer};

/// Key pairs indexed by the address they control
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: HashMap<Address, KeyPair>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key; returns its address
    pub fn insert(&mut self, key: KeyPair) -> Address {
        let address = key.address();
        self.keys.insert(address, key);
        address
    }

    pub fn get(&self, address: &Address) -> Option<&KeyPair> {
        self.keys.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.keys.contains_key(address)
    }

    /// Addresses with a key, sorted
    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.keys.keys().copied().collect();
        addresses.sort();
        addresses
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut keyring = Keyring::new();
        assert!(keyring.is_empty());

        let key = KeyPair::from_seed("validator").unwrap();
        let address = keyring.insert(key.clone());

        assert_eq!(address, key.address());
        assert!(keyring.contains(&address));
        assert_eq!(keyring.get(&address).unwrap().public_key_hex(), key.public_key_hex());
        assert!(keyring.get(&KeyPair::from_seed("other").unwrap().address()).is_none());
    }

    #[test]
    fn test_addresses_sorted_and_deduplicated() {
        let mut keyring = Keyring::new();
        for name in ["c", "a", "b", "a"] {
            keyring.insert(KeyPair::from_seed(name).unwrap());
        }

        let addresses = keyring.addresses();
        assert_eq!(keyring.len(), 3);
        assert!(addresses.windows(2).all(|w| w[0] < w[1]));
    }
}
