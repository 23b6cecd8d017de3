//! Ledger addresses
//!
//! An address is the RIPEMD160(SHA256(pubkey)) hash of a public key. It is
//! shown to users in Base58Check form (version byte `0x00`, four byte
//! double-SHA-256 checksum), the same way Bitcoin P2PKH addresses are.

use std::fmt;
use std::str::FromStr;

use secp256k1::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::keys::{public_key_from_hex, public_key_hash, KeyError, PUBKEY_HASH_LEN};
use crate::crypto::double_sha256;

/// Version byte prepended before Base58Check encoding
pub const ADDRESS_VERSION: u8 = 0x00;

/// Fixed-length address derived one-way from a public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; PUBKEY_HASH_LEN]);

impl Address {
    /// Wrap raw hash bytes
    pub const fn from_bytes(bytes: [u8; PUBKEY_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive the address owned by a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(public_key_hash(public_key))
    }

    /// Derive the address from a hex-encoded compressed public key
    pub fn from_public_key_hex(public_key_hex: &str) -> Result<Self, KeyError> {
        Ok(Self::from_public_key(&public_key_from_hex(public_key_hex)?))
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(1 + PUBKEY_HASH_LEN + 4);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&self.0);
        let checksum = double_sha256(&payload);
        payload.extend_from_slice(&checksum[..4]);
        f.write_str(&bs58::encode(payload).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| KeyError::InvalidAddress(e.to_string()))?;

        if bytes.len() != 1 + PUBKEY_HASH_LEN + 4 {
            return Err(KeyError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                1 + PUBKEY_HASH_LEN + 4,
                bytes.len()
            )));
        }
        if bytes[0] != ADDRESS_VERSION {
            return Err(KeyError::InvalidAddress(format!(
                "unknown version byte {:#04x}",
                bytes[0]
            )));
        }

        let (payload, checksum) = bytes.split_at(1 + PUBKEY_HASH_LEN);
        if double_sha256(payload)[..4] != *checksum {
            return Err(KeyError::InvalidAddress("bad checksum".to_string()));
        }

        let mut hash = [0u8; PUBKEY_HASH_LEN];
        hash.copy_from_slice(&payload[1..]);
        Ok(Self(hash))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, Signer};

    #[test]
    fn test_address_format() {
        let address = KeyPair::generate().address();
        // Version byte 0x00 encodes to a leading '1'
        assert!(address.to_string().starts_with('1'));
    }

    #[test]
    fn test_address_parse_roundtrip() {
        let address = KeyPair::from_seed("alice").unwrap().address();
        let parsed: Address = address.to_string().parse().unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_address_checksum_rejected() {
        let address = KeyPair::from_seed("alice").unwrap().address().to_string();
        let mut chars: Vec<char> = address.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '2' { '3' } else { '2' };
        let tampered: String = chars.into_iter().collect();
        assert!(tampered.parse::<Address>().is_err());
        assert!("not-an-address".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_from_public_key_hex() {
        let kp = KeyPair::from_seed("bob").unwrap();
        let derived = Address::from_public_key_hex(&kp.public_key_hex()).unwrap();
        assert_eq!(derived, kp.address());
        assert!(Address::from_public_key_hex("00").is_err());
    }

    #[test]
    fn test_address_serde_as_string() {
        let address = KeyPair::from_seed("carol").unwrap().address();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
