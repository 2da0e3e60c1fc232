//! The Merkle accumulator backing each [`crate::Proof`].
//!
//! After every transition the tree is rebuilt over all leaves recorded so
//! far, in insertion order. Internal nodes hash the concatenation of their
//! children, left first; whenever a level has an odd number of nodes the
//! last one is duplicated before pairing — the standard Bitcoin-style
//! scheme. Rebuilding on every append is `O(n)`, acceptable up to roughly
//! 10⁴ transitions; an incremental accumulator could replace this as a
//! drop-in as long as it produces bit-identical roots and proofs for the
//! same leaf sequence.
//!
//! Note this diverges from a pad-to-power-of-two scheme (pad the leaf level
//! up front, then reduce on a perfect tree) for non-power-of-two leaf
//! counts: at 3 leaves, pad-up-front duplicates leaf 3 once at the leaf
//! level and proceeds on a perfect tree of depth 2, while duplicate-last-
//! per-level duplicates leaf 3 to pair at level 0, producing a single
//! level-1 node, which then pairs with itself duplicated again at level 1.
//! The two schemes only agree when the leaf count is already a power of two.

use crate::hashing::{self, hash_leaf, hash_node, Digest};

/// An inclusion proof: the sibling hashes from a leaf to the root, in
/// leaf-to-root order. Direction (was this node the left or right child at
/// each level) is implicit from the leaf's index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    /// Index of the leaf this proof is for, at the time it was generated.
    pub leaf_index: usize,
    /// Sibling hashes from the leaf's level up to (but not including) the root.
    pub siblings: Vec<Digest>,
}

impl MerkleProof {
    /// Verify that `leaf` is included under `root` at `leaf_index`.
    pub fn verify(&self, leaf: &Digest, root: &Digest) -> bool {
        let mut current = hash_leaf(leaf);
        let mut index = self.leaf_index;

        for sibling in &self.siblings {
            current = if index % 2 == 0 {
                hash_node(&current, sibling)
            } else {
                hash_node(sibling, &current)
            };
            index /= 2;
        }

        current == *root
    }

    /// Render this proof's sibling path as lowercase hex strings, the wire
    /// format for `merkle_proof`.
    pub fn to_hex_vec(&self) -> Vec<String> {
        self.siblings.iter().map(hashing::to_hex).collect()
    }
}

/// Compute the Merkle root over `leaves` using the duplicate-last-per-level
/// scheme. Each leaf is domain-separated with [`hash_leaf`] before entering
/// the tree, so a single-leaf tree's root is never equal to the leaf's own
/// bare hash.
///
/// Returns the empty-leaf-prefix hash when `leaves` is empty.
pub fn compute_root(leaves: &[Digest]) -> Digest {
    if leaves.is_empty() {
        return hash_leaf(&[]);
    }

    let mut level: Vec<Digest> = leaves.iter().map(|d| hash_leaf(d)).collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().expect("level is non-empty");
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| hash_node(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

/// Build an inclusion proof for the leaf at `leaf_index` within `leaves`.
///
/// Returns `None` if `leaf_index` is out of range.
pub fn build_proof(leaves: &[Digest], leaf_index: usize) -> Option<MerkleProof> {
    if leaf_index >= leaves.len() {
        return None;
    }

    let mut level: Vec<Digest> = leaves.iter().map(|d| hash_leaf(d)).collect();
    let mut index = leaf_index;
    let mut siblings = Vec::new();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().expect("level is non-empty");
            level.push(last);
        }

        let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
        siblings.push(level[sibling_index]);

        level = level
            .chunks_exact(2)
            .map(|pair| hash_node(&pair[0], &pair[1]))
            .collect();
        index /= 2;
    }

    Some(MerkleProof {
        leaf_index,
        siblings,
    })
}
