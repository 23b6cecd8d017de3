//! Hashing utilities for the ledger
//!
//! SHA-256 based hashing used for transaction ids, block hashes, merkle
//! trees and the proof-of-work target comparison.

use sha2::{Digest, Sha256};

/// Length in bytes of every digest produced here
pub const HASH_LEN: usize = 32;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
/// Used for block header hashes
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Computes double SHA-256 hash and returns it as a hex string
pub fn double_sha256_hex(data: &[u8]) -> String {
    hex::encode(double_sha256(data))
}

/// Calculate the proof-of-work target for a difficulty.
///
/// The target is a big-endian 256-bit number with `difficulty` leading zero
/// bits followed by ones, so every extra bit of difficulty halves it.
pub fn calculate_target(difficulty: u32) -> [u8; HASH_LEN] {
    let mut target = [0xFF; HASH_LEN];
    let difficulty = (difficulty as usize).min(HASH_LEN * 8);
    let full_bytes = difficulty / 8;
    let remaining_bits = difficulty % 8;

    for byte in target.iter_mut().take(full_bytes) {
        *byte = 0;
    }

    if remaining_bits > 0 && full_bytes < HASH_LEN {
        target[full_bytes] = 0xFF >> remaining_bits;
    }

    target
}

/// Checks `hash < target`, both read as big-endian unsigned integers
pub fn is_below_target(hash: &[u8], target: &[u8; HASH_LEN]) -> bool {
    hash.len() == HASH_LEN && hash < &target[..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            sha256_hex(data),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_double_sha256() {
        let data = b"hello world";
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
        assert_eq!(double_sha256_hex(data).len(), 64);
    }

    #[test]
    fn test_target_strictly_shrinks() {
        for difficulty in 0..64 {
            assert!(calculate_target(difficulty + 1) < calculate_target(difficulty));
        }
    }

    #[test]
    fn test_target_shape() {
        let target = calculate_target(12);
        assert_eq!(target[0], 0x00);
        assert_eq!(target[1], 0x0F);
        assert!(target[2..].iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn test_is_below_target() {
        let target = calculate_target(16);
        let mut hash = vec![0x00, 0x00, 0x0F];
        hash.resize(HASH_LEN, 0xFF);
        assert!(is_below_target(&hash, &target));

        hash[1] = 0x01;
        assert!(!is_below_target(&hash, &target));

        // The target itself is not strictly below
        assert!(!is_below_target(&target, &target));
        assert!(!is_below_target(&[0x00], &target));
    }
}
