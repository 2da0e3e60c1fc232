//! SHA-256 hashing with Merkle domain separation.
//!
//! SHA-256 is the hash function used throughout this engine. Merkle leaves and
//! internal nodes are domain-separated with a prefix byte so a leaf hash can
//! never be mistaken for an internal node hash (second-preimage resistance,
//! RFC 6962 section 2.1):
//!
//! ```text
//! leaf_hash = SHA256(0x00 || leaf_bytes)
//! node_hash = SHA256(0x01 || left || right)
//! ```

use sha2::{Digest as _, Sha256};

/// A SHA-256 digest: 32 bytes.
pub type Digest = [u8; 32];

/// Domain separation prefix for Merkle leaf hashes.
pub const LEAF_PREFIX: u8 = 0x00;

/// Domain separation prefix for Merkle internal node hashes.
pub const NODE_PREFIX: u8 = 0x01;

/// Hash arbitrary bytes with plain SHA-256, no domain separation.
///
/// Used for `state_hash`, which commits to a transition's canonical form
/// directly rather than as a Merkle node.
pub fn sha256(input: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Hash a Merkle leaf: `SHA256(0x00 || leaf_bytes)`.
pub fn hash_leaf(leaf_bytes: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(leaf_bytes);
    hasher.finalize().into()
}

/// Hash a Merkle internal node: `SHA256(0x01 || left || right)`.
pub fn hash_node(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Render a digest as lowercase hex, the wire format for `state_hash`,
/// `prev_hash`, and `merkle_root`.
pub fn to_hex(digest: &Digest) -> String {
    hex::encode(digest)
}

/// Parse a lowercase hex digest back into bytes.
pub fn from_hex(s: &str) -> Result<Digest, hex::FromHexError> {
    let bytes = hex::decode(s)?;
    bytes
        .try_into()
        .map_err(|_| hex::FromHexError::InvalidStringLength)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_empty_matches_fips_vector() {
        assert_eq!(
            to_hex(&sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_abc_matches_fips_vector() {
        assert_eq!(
            to_hex(&sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn domain_separation_differs() {
        let leaf_h = hash_leaf(b"test");
        let node_h = hash_node(&sha256(b"test"), &sha256(b"test"));
        assert_ne!(leaf_h, node_h);
    }

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_leaf(b"hello"), hash_leaf(b"hello"));
        let d = sha256(b"x");
        assert_eq!(hash_node(&d, &d), hash_node(&d, &d));
    }

    #[test]
    fn hex_roundtrip() {
        let d = sha256(b"roundtrip");
        let hex = to_hex(&d);
        assert_eq!(from_hex(&hex).unwrap(), d);
    }
}
