//! Transaction handling for the ledger
//!
//! Implements a UTXO-based transaction model with digital signatures.
//! A transaction id is the SHA-256 of its canonical payload: the spent
//! outpoints and the created outputs, without signatures or public keys.
//! Every input signs that same payload, so ids are stable across signing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::address::Address;
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::utxo::Utxo;
use crate::crypto::{sha256, Signer};

// =============================================================================
// Constants
// =============================================================================

/// Largest amount any single output or transaction total may carry
pub const MAX_AMOUNT: u64 = 21_000_000 * 100_000_000;

// =============================================================================
// Outpoint
// =============================================================================

/// Reference to one output of a confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    /// Id of the transaction that created the output
    pub tx_id: String,
    /// Position of the output in that transaction
    pub index: u32,
}

impl Outpoint {
    pub fn new(tx_id: impl Into<String>, index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

// =============================================================================
// Transaction Input / Output
// =============================================================================

/// Transaction input (reference to a previous output plus its authorization)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Output being spent
    pub outpoint: Outpoint,
    /// Public key of the spender (must hash to the output's owner)
    pub public_key: String,
    /// Signature over the transaction signing hash
    pub signature: String,
}

impl TxInput {
    /// Unsigned input spending `outpoint`
    pub fn unsigned(outpoint: Outpoint) -> Self {
        Self {
            outpoint,
            public_key: String::new(),
            signature: String::new(),
        }
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount of coins
    pub amount: u64,
    /// Recipient's address
    pub recipient: Address,
}

impl TxOutput {
    pub fn new(recipient: Address, amount: u64) -> Self {
        Self { amount, recipient }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content hash of the canonical payload
    pub id: String,
    /// Transaction inputs
    pub inputs: Vec<TxInput>,
    /// Transaction outputs
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create a new transaction (unsigned)
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: String::new(),
            inputs,
            outputs,
        };
        tx.id = tx.calculate_hash();
        tx
    }

    /// Input-less transaction that mints the genesis allocations
    pub fn genesis_allocation(allocations: &[(Address, u64)]) -> Self {
        let outputs = allocations
            .iter()
            .map(|(address, amount)| TxOutput::new(*address, *amount))
            .collect();
        Self::new(Vec::new(), outputs)
    }

    /// Whether this is an allocation (only legal inside the genesis block)
    pub fn is_allocation(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Canonical, length-prefixed encoding of outpoints and outputs
    pub fn canonical_payload(&self) -> Vec<u8> {
        let mut data = Vec::new();

        data.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            let tx_id = input.outpoint.tx_id.as_bytes();
            data.extend_from_slice(&(tx_id.len() as u32).to_le_bytes());
            data.extend_from_slice(tx_id);
            data.extend_from_slice(&input.outpoint.index.to_le_bytes());
        }

        data.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            data.extend_from_slice(&output.amount.to_le_bytes());
            data.extend_from_slice(output.recipient.as_bytes());
        }

        data
    }

    /// Hash that every input signature commits to
    pub fn signing_hash(&self) -> Vec<u8> {
        sha256(&self.canonical_payload())
    }

    /// Calculate the transaction id
    pub fn calculate_hash(&self) -> String {
        hex::encode(self.signing_hash())
    }

    /// Whether the stored id matches the content
    pub fn has_valid_id(&self) -> bool {
        self.id == self.calculate_hash()
    }

    /// Sign a single input with the provided signer
    pub fn sign_input(&mut self, index: usize, signer: &dyn Signer) -> LedgerResult<()> {
        let signing_hash = self.signing_hash();
        let input = self
            .inputs
            .get_mut(index)
            .ok_or_else(|| LedgerError::InvalidTx(format!("no input at index {}", index)))?;

        input.signature = hex::encode(signer.sign(&signing_hash)?);
        input.public_key = signer.public_key_hex();
        Ok(())
    }

    /// Sign all inputs with the provided signer
    pub fn sign(&mut self, signer: &dyn Signer) -> LedgerResult<()> {
        for index in 0..self.inputs.len() {
            self.sign_input(index, signer)?;
        }
        Ok(())
    }

    /// Outpoints consumed by this transaction, in input order
    pub fn spent_outpoints(&self) -> impl Iterator<Item = &Outpoint> {
        self.inputs.iter().map(|input| &input.outpoint)
    }

    /// Outputs this transaction creates, keyed by their outpoint
    pub fn created_utxos(&self) -> impl Iterator<Item = Utxo> + '_ {
        self.outputs
            .iter()
            .enumerate()
            .map(move |(index, output)| Utxo {
                outpoint: Outpoint::new(self.id.clone(), index as u32),
                amount: output.amount,
                owner: output.recipient,
            })
    }

    /// Get total output amount
    pub fn total_output(&self) -> u128 {
        self.outputs.iter().map(|o| o.amount as u128).sum()
    }
}

// =============================================================================
// Transaction Builder
// =============================================================================

/// Builder for assembling and signing transactions
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input spending a UTXO
    pub fn add_input(mut self, utxo: &Utxo) -> Self {
        self.inputs.push(TxInput::unsigned(utxo.outpoint.clone()));
        self
    }

    /// Add an output
    pub fn add_output(mut self, recipient: Address, amount: u64) -> Self {
        self.outputs.push(TxOutput::new(recipient, amount));
        self
    }

    /// Build and sign every input with one key
    pub fn build_and_sign(self, signer: &dyn Signer) -> LedgerResult<Transaction> {
        let mut tx = self.build();
        tx.sign(signer)?;
        Ok(tx)
    }

    /// Build without signing
    pub fn build(self) -> Transaction {
        Transaction::new(self.inputs, self.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, Secp256k1Verifier, SignatureVerifier};

    fn utxo(owner: Address, amount: u64) -> Utxo {
        Utxo {
            outpoint: Outpoint::new("ab".repeat(32), 0),
            amount,
            owner,
        }
    }

    #[test]
    fn test_transaction_signing() {
        let key_pair = KeyPair::from_seed("alice").unwrap();
        let recipient = KeyPair::from_seed("bob").unwrap().address();

        let tx = TransactionBuilder::new()
            .add_input(&utxo(key_pair.address(), 100))
            .add_output(recipient, 50)
            .add_output(key_pair.address(), 49)
            .build_and_sign(&key_pair)
            .unwrap();

        let verifier = Secp256k1Verifier;
        for input in &tx.inputs {
            assert_eq!(input.public_key, key_pair.public_key_hex());
            assert!(verifier.verify(&input.public_key, &tx.signing_hash(), &input.signature));
        }
        assert_eq!(tx.total_output(), 99);
    }

    #[test]
    fn test_id_excludes_signatures() {
        let key_pair = KeyPair::from_seed("alice").unwrap();
        let unsigned = TransactionBuilder::new()
            .add_input(&utxo(key_pair.address(), 10))
            .add_output(key_pair.address(), 10)
            .build();

        let mut signed = unsigned.clone();
        signed.sign(&key_pair).unwrap();

        assert_eq!(unsigned.id, signed.id);
        assert!(signed.has_valid_id());
    }

    #[test]
    fn test_transaction_hash_depends_on_content() {
        let alice = KeyPair::from_seed("alice").unwrap().address();
        let bob = KeyPair::from_seed("bob").unwrap().address();

        let tx1 = Transaction::genesis_allocation(&[(alice, 50)]);
        let tx2 = Transaction::genesis_allocation(&[(bob, 50)]);
        let tx3 = Transaction::genesis_allocation(&[(alice, 51)]);
        assert_ne!(tx1.id, tx2.id);
        assert_ne!(tx1.id, tx3.id);

        let mut tampered = tx1.clone();
        tampered.outputs[0].amount = 5_000;
        assert!(!tampered.has_valid_id());
    }

    #[test]
    fn test_created_utxos() {
        let alice = KeyPair::from_seed("alice").unwrap().address();
        let bob = KeyPair::from_seed("bob").unwrap().address();
        let tx = Transaction::genesis_allocation(&[(alice, 7), (bob, 9)]);

        let utxos: Vec<Utxo> = tx.created_utxos().collect();
        assert_eq!(utxos.len(), 2);
        assert_eq!(utxos[1].outpoint, Outpoint::new(tx.id.clone(), 1));
        assert_eq!(utxos[1].owner, bob);
        assert_eq!(utxos[1].amount, 9);
        assert!(tx.is_allocation());
    }

    #[test]
    fn test_sign_missing_input() {
        let key_pair = KeyPair::from_seed("alice").unwrap();
        let mut tx = Transaction::new(vec![], vec![]);
        assert!(matches!(
            tx.sign_input(3, &key_pair),
            Err(LedgerError::InvalidTx(_))
        ));
    }
}
