//! ECDSA key management for the ledger
//!
//! Provides key pair generation, signing, and verification using
//! the secp256k1 elliptic curve (same as Bitcoin). The ledger engine only
//! sees this module through the [`Signer`] and [`SignatureVerifier`] traits.

use rand::rngs::OsRng;
use ripemd::Ripemd160;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::Digest;
use thiserror::Error;

use super::hash::sha256;
use crate::core::Address;

/// Length of a public key hash (RIPEMD160)
pub const PUBKEY_HASH_LEN: usize = 20;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// Something that can authorize spends: it owns an address and signs payloads
pub trait Signer {
    /// Compressed public key, hex encoded
    fn public_key_hex(&self) -> String;

    /// Address derived from the public key
    fn address(&self) -> Address;

    /// Sign a payload (hashed to 32 bytes if it is not already)
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, KeyError>;
}

/// Signature checking capability consumed by validation and consensus
pub trait SignatureVerifier {
    fn verify(&self, public_key_hex: &str, payload: &[u8], signature_hex: &str) -> bool;
}

/// secp256k1 ECDSA verifier over hex-encoded keys and compact signatures
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, public_key_hex: &str, payload: &[u8], signature_hex: &str) -> bool {
        let Ok(public_key) = public_key_from_hex(public_key_hex) else {
            return false;
        };
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        verify_signature(&public_key, payload, &signature).unwrap_or(false)
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Deterministic key pair whose secret is SHA-256 of the seed.
    ///
    /// Simulation only: anyone who knows the seed knows the key.
    pub fn from_seed(seed: &str) -> Result<Self, KeyError> {
        let secret_key = SecretKey::from_slice(&sha256(seed.as_bytes()))
            .map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl Signer for KeyPair {
    fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    fn address(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, KeyError> {
        sign_message(&self.secret_key, payload)
    }
}

/// RIPEMD160(SHA256(compressed public key))
pub fn public_key_hash(public_key: &PublicKey) -> [u8; PUBKEY_HASH_LEN] {
    let sha256_hash = sha256(&public_key.serialize());

    let mut ripemd = Ripemd160::new();
    ripemd.update(&sha256_hash);
    ripemd.finalize().into()
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign a message hash with a secret key
pub fn sign_message(secret_key: &SecretKey, message_hash: &[u8]) -> Result<Vec<u8>, KeyError> {
    let secp = Secp256k1::new();

    // Ensure message hash is 32 bytes
    let hash = if message_hash.len() == 32 {
        message_hash.to_vec()
    } else {
        sha256(message_hash)
    };

    let message = Message::from_digest_slice(&hash)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(signature.serialize_compact().to_vec())
}

/// Verify a signature against a public key
pub fn verify_signature(
    public_key: &PublicKey,
    message_hash: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::new();

    let hash = if message_hash.len() == 32 {
        message_hash.to_vec()
    } else {
        sha256(message_hash)
    };

    let message = Message::from_digest_slice(&hash)?;
    let sig = secp256k1::ecdsa::Signature::from_compact(signature)
        .map_err(|_| KeyError::InvalidSignature)?;

    Ok(secp.verify_ecdsa(&message, &sig, public_key).is_ok())
}
