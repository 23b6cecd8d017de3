//! Merkle tree over transaction ids
//!
//! Leaves are `sha256(tx_id)`, parents are `sha256(left || right)`, and an
//! odd level pairs its last hash with itself. The root of an empty list is
//! `sha256("")`.

use super::hash::sha256;

/// Hash a leaf (raw transaction id bytes)
pub fn leaf_hash(data: &[u8]) -> Vec<u8> {
    sha256(data)
}

fn parent_hash(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut data = left.to_vec();
    data.extend_from_slice(right);
    sha256(&data)
}

fn next_level(level: &[Vec<u8>]) -> Vec<Vec<u8>> {
    level
        .chunks(2)
        .map(|chunk| match chunk {
            [left, right] => parent_hash(left, right),
            [single] => parent_hash(single, single),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Calculate the merkle root over already-hashed leaves
pub fn calculate_merkle_root(leaves: &[Vec<u8>]) -> Vec<u8> {
    if leaves.is_empty() {
        return sha256(b"");
    }

    let mut current_level: Vec<Vec<u8>> = leaves.to_vec();
    while current_level.len() > 1 {
        current_level = next_level(&current_level);
    }

    current_level.remove(0)
}

/// Merkle proof for verifying transaction inclusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Sibling hashes from leaf to root, flagged when the sibling is on the left
    pub siblings: Vec<(Vec<u8>, bool)>,
}

impl MerkleProof {
    /// Verify the proof against a root hash
    pub fn verify(&self, leaf: &[u8], root: &[u8]) -> bool {
        let mut current = leaf.to_vec();

        for (sibling, is_left) in &self.siblings {
            current = if *is_left {
                parent_hash(sibling, &current)
            } else {
                parent_hash(&current, sibling)
            };
        }

        current == root
    }
}

/// Build an inclusion proof for the leaf at `index`
pub fn merkle_proof(leaves: &[Vec<u8>], index: usize) -> Option<MerkleProof> {
    if index >= leaves.len() {
        return None;
    }

    let mut siblings = Vec::new();
    let mut level: Vec<Vec<u8>> = leaves.to_vec();
    let mut position = index;

    while level.len() > 1 {
        let sibling_position = position ^ 1;
        let sibling = level
            .get(sibling_position)
            .unwrap_or(&level[position])
            .clone();
        siblings.push((sibling, position % 2 == 1));

        level = next_level(&level);
        position /= 2;
    }

    Some(MerkleProof { siblings })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(names: &[&str]) -> Vec<Vec<u8>> {
        names.iter().map(|n| leaf_hash(n.as_bytes())).collect()
    }

    #[test]
    fn test_merkle_root_single() {
        let hashes = leaves(&["tx1"]);
        assert_eq!(calculate_merkle_root(&hashes), hashes[0]);
    }

    #[test]
    fn test_merkle_root_two() {
        let hashes = leaves(&["tx1", "tx2"]);
        let root = calculate_merkle_root(&hashes);

        let mut expected = hashes[0].clone();
        expected.extend_from_slice(&hashes[1]);
        assert_eq!(root, sha256(&expected));
    }

    #[test]
    fn test_merkle_root_odd_duplicates_last() {
        let three = leaves(&["tx1", "tx2", "tx3"]);
        let four = leaves(&["tx1", "tx2", "tx3", "tx3"]);
        assert_eq!(calculate_merkle_root(&three), calculate_merkle_root(&four));
    }

    #[test]
    fn test_merkle_root_order_sensitive() {
        let a = leaves(&["tx1", "tx2", "tx3"]);
        let b = leaves(&["tx2", "tx1", "tx3"]);
        assert_ne!(calculate_merkle_root(&a), calculate_merkle_root(&b));
        assert_eq!(calculate_merkle_root(&a), calculate_merkle_root(&a));
    }

    #[test]
    fn test_empty_merkle_root() {
        assert_eq!(calculate_merkle_root(&[]), sha256(b""));
    }

    #[test]
    fn test_merkle_proofs() {
        let hashes = leaves(&["a", "b", "c", "d", "e"]);
        let root = calculate_merkle_root(&hashes);

        for (i, leaf) in hashes.iter().enumerate() {
            let proof = merkle_proof(&hashes, i).unwrap();
            assert!(proof.verify(leaf, &root));
            assert!(!proof.verify(&leaf_hash(b"forged"), &root));
        }
        assert!(merkle_proof(&hashes, 5).is_none());
    }
}
