//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and proof-of-work targets
//! - ECDSA key management (secp256k1) behind signer / verifier traits
//! - Merkle tree calculations

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{
    calculate_target, double_sha256, double_sha256_hex, is_below_target, sha256, sha256_hex,
    HASH_LEN,
};
pub use keys::{
    public_key_from_hex, public_key_hash, sign_message, verify_signature, KeyError, KeyPair,
    Secp256k1Verifier, SignatureVerifier, Signer,
};
pub use merkle::{calculate_merkle_root, leaf_hash, merkle_proof, MerkleProof};
