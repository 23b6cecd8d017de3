//! Wallet implementation for the ledger
//!
//! Provides key management and transaction creation.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{
    get_balance, Address, LedgerError, LedgerResult, Transaction, TransactionBuilder, Utxo,
    UtxoView, MAX_AMOUNT,
};
use crate::crypto::{KeyError, KeyPair, Signer};

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// Serializable wallet data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct WalletData {
    private_key_hex: String,
    address: Address,
    label: Option<String>,
}

/// Build and sign a payment from `spender` to `recipient`.
///
/// Coins are selected from `utxos` in outpoint order until `amount + fee` is
/// covered; any excess comes back to the spender as a change output.
pub fn create_transaction(
    spender: &Address,
    recipient: &Address,
    amount: u64,
    fee: u64,
    utxos: &dyn UtxoView,
    signer: &dyn Signer,
) -> LedgerResult<Transaction> {
    if amount == 0 {
        return Err(LedgerError::InvalidTx("amount must be positive".to_string()));
    }
    if signer.address() != *spender {
        return Err(LedgerError::InvalidTx(format!(
            "signer does not own {}",
            spender
        )));
    }

    let required = amount as u128 + fee as u128;
    if required > MAX_AMOUNT as u128 {
        return Err(LedgerError::InvalidTx(format!(
            "amount plus fee exceeds maximum {}",
            MAX_AMOUNT
        )));
    }

    let mut selected: Vec<&Utxo> = Vec::new();
    let mut selected_amount = 0u128;
    for utxo in utxos.owned_by(spender) {
        if selected_amount >= required {
            break;
        }
        selected_amount += utxo.amount as u128;
        selected.push(utxo);
    }

    if selected_amount < required {
        return Err(LedgerError::InsufficientFunds {
            required,
            available: get_balance(spender, utxos),
        });
    }

    let mut builder = TransactionBuilder::new();
    for utxo in &selected {
        builder = builder.add_input(utxo);
    }
    builder = builder.add_output(*recipient, amount);

    // Change back to the spender; bounded by the selected total
    let change = selected_amount - required;
    if change > 0 {
        let change = u64::try_from(change)
            .map_err(|_| LedgerError::InvalidTx("change output overflows".to_string()))?;
        builder = builder.add_output(*spender, change);
    }

    let tx = builder.build_and_sign(signer)?;
    debug!(
        "Created {} spending {} inputs ({} -> {}, amount {}, fee {})",
        tx.id,
        selected.len(),
        spender,
        recipient,
        amount,
        fee
    );
    Ok(tx)
}

/// A wallet holding one key pair
#[derive(Debug, Clone)]
pub struct Wallet {
    /// The key pair for signing transactions
    key_pair: KeyPair,
    /// Optional label for the wallet
    pub label: Option<String>,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
            label: None,
        }
    }

    /// Deterministic wallet derived from a name; the name becomes the label
    pub fn from_name(name: &str) -> Result<Self, WalletError> {
        Ok(Self {
            key_pair: KeyPair::from_seed(name)?,
            label: Some(name.to_string()),
        })
    }

    /// Import a wallet from a private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
        Ok(Self {
            key_pair,
            label: None,
        })
    }

    /// Get the wallet's address
    pub fn address(&self) -> Address {
        self.key_pair.address()
    }

    /// Get the wallet's public key (hex)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Get the wallet's private key (hex)
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Balance visible through `utxos`
    pub fn balance(&self, utxos: &dyn UtxoView) -> u128 {
        get_balance(&self.address(), utxos)
    }

    /// Pay `recipient` from this wallet's outputs in `utxos`
    pub fn create_transaction(
        &self,
        recipient: &Address,
        amount: u64,
        fee: u64,
        utxos: &dyn UtxoView,
    ) -> LedgerResult<Transaction> {
        create_transaction(
            &self.address(),
            recipient,
            amount,
            fee,
            utxos,
            &self.key_pair,
        )
    }

    /// Save wallet to file
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            private_key_hex: self.private_key(),
            address: self.address(),
            label: self.label.clone(),
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load wallet from file
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: WalletData = serde_json::from_str(&json)?;

        let mut wallet = Self::from_private_key(&data.private_key_hex)?;
        if wallet.address() != data.address {
            return Err(KeyError::InvalidAddress(data.address.to_string()).into());
        }
        wallet.label = data.label;
        Ok(wallet)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{validate_transaction, UtxoSet};
    use crate::crypto::Secp256k1Verifier;

    fn funded(owner: &Address, amounts: &[u64]) -> UtxoSet {
        let allocations: Vec<(Address, u64)> = amounts.iter().map(|a| (*owner, *a)).collect();
        let mut utxos = UtxoSet::new();
        utxos.apply_transaction(&Transaction::genesis_allocation(&allocations));
        utxos
    }

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new();
        assert!(!wallet.address().to_string().is_empty());
        assert!(!wallet.public_key().is_empty());
        assert!(!wallet.private_key().is_empty());
    }

    #[test]
    fn test_named_wallet_is_deterministic() {
        let first = Wallet::from_name("alice").unwrap();
        let second = Wallet::from_name("alice").unwrap();
        assert_eq!(first.address(), second.address());
        assert_eq!(first.label.as_deref(), Some("alice"));
        assert_ne!(first.address(), Wallet::from_name("bob").unwrap().address());
    }

    #[test]
    fn test_wallet_import() {
        let wallet1 = Wallet::new();
        let private_key = wallet1.private_key();

        let wallet2 = Wallet::from_private_key(&private_key).unwrap();
        assert_eq!(wallet1.address(), wallet2.address());
    }

    #[test]
    fn test_wallet_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test_wallet.json");

        let wallet1 = Wallet::from_name("Test Wallet").unwrap();
        wallet1.save(&path).unwrap();

        let wallet2 = Wallet::load(&path).unwrap();
        assert_eq!(wallet1.address(), wallet2.address());
        assert_eq!(wallet1.label, wallet2.label);
    }

    #[test]
    fn test_transaction_creation_with_change() {
        let alice = Wallet::from_name("alice").unwrap();
        let bob = Wallet::from_name("bob").unwrap();
        let utxos = funded(&alice.address(), &[100]);

        let tx = alice
            .create_transaction(&bob.address(), 10, 1, &utxos)
            .unwrap();

        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].recipient, bob.address());
        assert_eq!(tx.outputs[0].amount, 10);
        assert_eq!(tx.outputs[1].recipient, alice.address());
        assert_eq!(tx.outputs[1].amount, 89);
        assert_eq!(validate_transaction(&tx, &utxos, &Secp256k1Verifier).unwrap(), 1);
    }

    #[test]
    fn test_exact_amount_has_no_change() {
        let alice = Wallet::from_name("alice").unwrap();
        let bob = Wallet::from_name("bob").unwrap();
        let utxos = funded(&alice.address(), &[30, 20]);

        let tx = alice
            .create_transaction(&bob.address(), 48, 2, &utxos)
            .unwrap();

        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(validate_transaction(&tx, &utxos, &Secp256k1Verifier).unwrap(), 2);
    }

    #[test]
    fn test_selection_stops_once_covered() {
        let alice = Wallet::from_name("alice").unwrap();
        let bob = Wallet::from_name("bob").unwrap();
        let utxos = funded(&alice.address(), &[5, 5, 5, 5]);

        let tx = alice.create_transaction(&bob.address(), 7, 0, &utxos).unwrap();
        assert_eq!(tx.inputs.len(), 2);
    }

    #[test]
    fn test_insufficient_funds() {
        let alice = Wallet::from_name("alice").unwrap();
        let bob = Wallet::from_name("bob").unwrap();
        let empty = UtxoSet::new();

        match alice.create_transaction(&bob.address(), 1, 0, &empty) {
            Err(LedgerError::InsufficientFunds {
                required,
                available,
            }) => {
                assert_eq!(required, 1);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let utxos = funded(&alice.address(), &[10]);
        assert!(matches!(
            alice.create_transaction(&bob.address(), 10, 1, &utxos),
            Err(LedgerError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_amount_and_foreign_signer() {
        let alice = Wallet::from_name("alice").unwrap();
        let bob = Wallet::from_name("bob").unwrap();
        let utxos = funded(&alice.address(), &[10]);

        assert!(matches!(
            alice.create_transaction(&bob.address(), 0, 0, &utxos),
            Err(LedgerError::InvalidTx(_))
        ));
        assert!(matches!(
            create_transaction(
                &alice.address(),
                &bob.address(),
                5,
                0,
                &utxos,
                bob.key_pair()
            ),
            Err(LedgerError::InvalidTx(_))
        ));
    }
}
