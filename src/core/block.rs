//! Block implementation for the ledger
//!
//! A block contains a header with metadata and a list of transactions.
//! The header commits to the transactions through the merkle root and to
//! its consensus proof through the [`Seal`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::address::Address;
use crate::core::transaction::Transaction;
use crate::crypto::{
    calculate_merkle_root, double_sha256, double_sha256_hex, leaf_hash, merkle_proof, MerkleProof,
};

// =============================================================================
// Block Constants
// =============================================================================

/// Current block header version
pub const BLOCK_VERSION: u32 = 1;

/// Maximum number of transactions per block
pub const MAX_BLOCK_TXS: usize = 1_000;

/// Previous hash carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Consensus-specific header fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Seal {
    /// Proof of work: the nonce that brings the header hash under the target
    Work { difficulty: u32, nonce: u64 },
    /// Mock proof of stake: the drawn validator's signature over the header
    Stake {
        seed: u64,
        validator: Address,
        public_key: String,
        signature: String,
    },
}

impl Seal {
    fn write_bytes(&self, data: &mut Vec<u8>, include_signature: bool) {
        match self {
            Seal::Work { difficulty, nonce } => {
                data.push(0);
                data.extend_from_slice(&difficulty.to_le_bytes());
                data.extend_from_slice(&nonce.to_le_bytes());
            }
            Seal::Stake {
                seed,
                validator,
                public_key,
                signature,
            } => {
                data.push(1);
                data.extend_from_slice(&seed.to_le_bytes());
                data.extend_from_slice(validator.as_bytes());
                data.extend_from_slice(&(public_key.len() as u32).to_le_bytes());
                data.extend_from_slice(public_key.as_bytes());
                if include_signature {
                    data.extend_from_slice(&(signature.len() as u32).to_le_bytes());
                    data.extend_from_slice(signature.as_bytes());
                }
            }
        }
    }
}

/// Block header containing metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block version
    pub version: u32,
    /// Hash of the previous block
    pub previous_hash: String,
    /// Merkle root of all transactions
    pub merkle_root: String,
    /// Block creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Consensus fields
    pub seal: Seal,
}

impl BlockHeader {
    /// Assemble a header. Nothing is validated here.
    pub fn build(
        previous_hash: impl Into<String>,
        merkle_root: impl Into<String>,
        timestamp: DateTime<Utc>,
        seal: Seal,
    ) -> Self {
        Self {
            version: BLOCK_VERSION,
            previous_hash: previous_hash.into(),
            merkle_root: merkle_root.into(),
            timestamp,
            seal,
        }
    }

    fn bytes(&self, include_signature: bool) -> Vec<u8> {
        let mut data = Vec::with_capacity(180);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.previous_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.timestamp().to_le_bytes());
        data.extend_from_slice(&self.timestamp.timestamp_subsec_nanos().to_le_bytes());
        self.seal.write_bytes(&mut data, include_signature);
        data
    }

    /// Canonical header bytes (everything, seal included)
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes(true)
    }

    /// Raw header hash bytes, compared against the proof-of-work target
    pub fn hash_bytes(&self) -> Vec<u8> {
        double_sha256(&self.to_bytes())
    }

    /// Calculate the hash of the block header
    pub fn hash(&self) -> String {
        double_sha256_hex(&self.to_bytes())
    }

    /// Digest a stake validator signs: the header without the signature
    pub fn signing_digest(&self) -> Vec<u8> {
        double_sha256(&self.bytes(false))
    }
}

/// Merkle leaf for a transaction id
fn tx_leaf(tx_id: &str) -> Vec<u8> {
    leaf_hash(&hex::decode(tx_id).unwrap_or_else(|_| tx_id.as_bytes().to_vec()))
}

fn tx_leaves(transactions: &[Transaction]) -> Vec<Vec<u8>> {
    transactions.iter().map(|tx| tx_leaf(&tx.id)).collect()
}

/// Merkle root over the transactions' ids, hex encoded
pub fn compute_merkle_root(transactions: &[Transaction]) -> String {
    hex::encode(calculate_merkle_root(&tx_leaves(transactions)))
}

/// Check a proof that `tx_id` sits under the hex `merkle_root`
pub fn verify_inclusion(tx_id: &str, proof: &MerkleProof, merkle_root: &str) -> bool {
    match hex::decode(merkle_root) {
        Ok(root) => proof.verify(&tx_leaf(tx_id), &root),
        Err(_) => false,
    }
}

/// A block in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// List of transactions in the block
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// Create the genesis block holding the faucet allocations.
    ///
    /// The timestamp is fixed at the Unix epoch so the genesis hash depends
    /// only on the allocations.
    pub fn genesis(allocations: &[(Address, u64)]) -> Self {
        let transactions = if allocations.is_empty() {
            Vec::new()
        } else {
            vec![Transaction::genesis_allocation(allocations)]
        };

        let header = BlockHeader::build(
            GENESIS_PREVIOUS_HASH,
            compute_merkle_root(&transactions),
            DateTime::<Utc>::default(),
            Seal::Work {
                difficulty: 0,
                nonce: 0,
            },
        );

        Self::new(header, transactions)
    }

    /// Block hash (hash of the header)
    pub fn hash(&self) -> String {
        self.header.hash()
    }

    /// Verify the block's merkle root
    pub fn verify_merkle_root(&self) -> bool {
        compute_merkle_root(&self.transactions) == self.header.merkle_root
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Merkle path proving `tx_id` is one of this block's transactions
    pub fn inclusion_proof(&self, tx_id: &str) -> Option<MerkleProof> {
        let index = self.transactions.iter().position(|tx| tx.id == tx_id)?;
        merkle_proof(&tx_leaves(&self.transactions), index)
    }
}
