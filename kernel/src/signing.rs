//! RSA signing and the proof/verification surface built on top of
//! [`crate::hashing`], [`crate::merkle`], and [`crate::canonical`].
//!
//! Keys are PKCS#8 DER, carried as hex strings at module boundaries. Signing
//! uses PKCS#1 v1.5 over SHA-256 (`rsa::pkcs1v15`), the same RustCrypto
//! family as this crate's existing `sha2` dependency; see `DESIGN.md` for
//! why RSA rather than Ed25519.
//!
//! The signature is computed over the ASCII/UTF-8 bytes of the lowercase-hex
//! `state_hash` string, not the raw 32-byte digest — an unusual but
//! deliberate contract, documented here so callers verifying signatures out
//! of process get it right on the first try.

use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::pkcs1v15::{SigningKey, VerifyingKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use signature::{SignatureEncoding, Signer, Verifier};

use crate::error::KernelError;
use crate::hashing::{self, Digest};
use crate::merkle::{self, MerkleProof};

/// Bit length used by [`generate_keypair`]. 2048 is the minimum size still
/// considered acceptable for RSA-PKCS1v15-SHA256 signatures.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Generate a fresh RSA key pair using the system RNG.
pub fn generate_keypair(bits: usize) -> Result<(RsaPrivateKey, RsaPublicKey), KernelError> {
    let mut rng = rand::rngs::OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| KernelError::CryptoKey(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);
    Ok((private_key, public_key))
}

/// Encode a private key as hex-encoded PKCS#8 DER.
pub fn private_key_to_hex(key: &RsaPrivateKey) -> Result<String, KernelError> {
    let der = key
        .to_pkcs8_der()
        .map_err(|e| KernelError::CryptoKey(e.to_string()))?;
    Ok(hex::encode(der.as_bytes()))
}

/// Encode a public key as hex-encoded PKCS#8 DER (SubjectPublicKeyInfo).
pub fn public_key_to_hex(key: &RsaPublicKey) -> Result<String, KernelError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| KernelError::CryptoKey(e.to_string()))?;
    Ok(hex::encode(der.as_bytes()))
}

/// Parse a private key from hex-encoded PKCS#8 DER.
pub fn private_key_from_hex(s: &str) -> Result<RsaPrivateKey, KernelError> {
    let der = hex::decode(s).map_err(|e| KernelError::CryptoKey(e.to_string()))?;
    RsaPrivateKey::from_pkcs8_der(&der).map_err(|e| KernelError::CryptoKey(e.to_string()))
}

/// Parse a public key from hex-encoded PKCS#8 DER.
pub fn public_key_from_hex(s: &str) -> Result<RsaPublicKey, KernelError> {
    let der = hex::decode(s).map_err(|e| KernelError::CryptoKey(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&der).map_err(|e| KernelError::CryptoKey(e.to_string()))
}

/// Sign `state_hash_hex` (the lowercase-hex `state_hash` string, not the raw
/// digest) and return the signature as a hex string.
pub fn sign(private_key: &RsaPrivateKey, state_hash_hex: &str) -> Result<String, KernelError> {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key
        .try_sign(state_hash_hex.as_bytes())
        .map_err(|e| KernelError::CryptoOp(e.to_string()))?;
    Ok(hex::encode(signature.to_vec()))
}

/// Verify `signature_hex` over `state_hash_hex` under `public_key`.
pub fn verify(
    public_key: &RsaPublicKey,
    state_hash_hex: &str,
    signature_hex: &str,
) -> Result<(), KernelError> {
    let sig_bytes = hex::decode(signature_hex).map_err(|e| KernelError::CryptoOp(e.to_string()))?;
    let signature = rsa::pkcs1v15::Signature::try_from(sig_bytes.as_slice())
        .map_err(|e| KernelError::CryptoOp(e.to_string()))?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    verifying_key
        .verify(state_hash_hex.as_bytes(), &signature)
        .map_err(|e| KernelError::CryptoOp(e.to_string()))
}

/// A finished, signed, Merkle-anchored transition record.
#[derive(Clone, Debug, PartialEq)]
pub struct Proof {
    /// Hash of this transition's canonical form, as lowercase hex.
    pub state_hash: String,
    /// `state_hash` of the previous accepted transition, or empty for the first.
    pub prev_hash: String,
    /// Root of the Merkle tree over all leaf hashes up to and including this one.
    pub merkle_root: String,
    /// Inclusion path for `state_hash` under `merkle_root`, as lowercase hex siblings.
    pub merkle_proof: Vec<String>,
    /// Digital signature over the ASCII bytes of `state_hash`, as lowercase hex.
    pub signature: String,
    /// Millisecond-resolution wall-clock stamp at proof creation.
    pub timestamp: u64,
}

impl Proof {
    /// Serialize as the normative wire format: `stateHash`,
    /// `prevHash`, `merkleRoot`, `merkleProof`, `signature`, `timestamp`.
    pub fn to_value(&self) -> crate::value::Value {
        crate::value::Value::object([
            (
                "stateHash".to_string(),
                crate::value::Value(serde_json::Value::String(self.state_hash.clone())),
            ),
            (
                "prevHash".to_string(),
                crate::value::Value(serde_json::Value::String(self.prev_hash.clone())),
            ),
            (
                "merkleRoot".to_string(),
                crate::value::Value(serde_json::Value::String(self.merkle_root.clone())),
            ),
            (
                "merkleProof".to_string(),
                crate::value::Value(serde_json::Value::Array(
                    self.merkle_proof
                        .iter()
                        .map(|s| serde_json::Value::String(s.clone()))
                        .collect(),
                )),
            ),
            (
                "signature".to_string(),
                crate::value::Value(serde_json::Value::String(self.signature.clone())),
            ),
            (
                "timestamp".to_string(),
                crate::value::Value(serde_json::Value::Number(self.timestamp.into())),
            ),
        ])
    }
}

/// Result of [`verify_chain`]: either every proof in the chain checked out,
/// or the index and reason of the first one that didn't.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainVerification {
    /// Whether the whole chain verified.
    pub ok: bool,
    /// Index of the first proof found invalid, if any.
    pub failed_at: Option<usize>,
    /// Which invariant failed at `failed_at`, if any.
    pub reason: Option<String>,
}

impl ChainVerification {
    fn ok() -> Self {
        ChainVerification {
            ok: true,
            failed_at: None,
            reason: None,
        }
    }

    fn fail(index: usize, reason: impl Into<String>) -> Self {
        ChainVerification {
            ok: false,
            failed_at: Some(index),
            reason: Some(reason.into()),
        }
    }
}

/// Check signatures, `prev_hash` chaining, and Merkle roots/proofs across an
/// entire proof sequence.
///
/// This is the crate's normative trust boundary: the only function external
/// auditors need to call, given nothing but the proof sequence and the
/// signer's public key.
pub fn verify_chain(proofs: &[Proof], public_key: &RsaPublicKey) -> ChainVerification {
    let mut leaves: Vec<Digest> = Vec::with_capacity(proofs.len());

    for (i, proof) in proofs.iter().enumerate() {
        if let Err(e) = verify(public_key, &proof.state_hash, &proof.signature) {
            return ChainVerification::fail(i, format!("signature invalid: {e}"));
        }

        let expected_prev = if i == 0 {
            String::new()
        } else {
            proofs[i - 1].state_hash.clone()
        };
        if proof.prev_hash != expected_prev {
            return ChainVerification::fail(i, "prev_hash does not chain to predecessor");
        }

        let leaf = match hashing::from_hex(&proof.state_hash) {
            Ok(d) => d,
            Err(e) => return ChainVerification::fail(i, format!("malformed state_hash: {e}")),
        };
        leaves.push(leaf);

        let expected_root = merkle::compute_root(&leaves);
        let expected_root_hex = hashing::to_hex(&expected_root);
        if proof.merkle_root != expected_root_hex {
            return ChainVerification::fail(i, "merkle_root does not match cumulative leaves");
        }

        let siblings: Result<Vec<Digest>, _> =
            proof.merkle_proof.iter().map(|s| hashing::from_hex(s)).collect();
        let siblings = match siblings {
            Ok(s) => s,
            Err(e) => return ChainVerification::fail(i, format!("malformed merkle_proof: {e}")),
        };
        let merkle_proof = MerkleProof {
            leaf_index: i,
            siblings,
        };
        if !merkle_proof.verify(&leaf, &expected_root) {
            return ChainVerification::fail(i, "merkle_proof does not verify against merkle_root");
        }
    }

    ChainVerification::ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> (RsaPrivateKey, RsaPublicKey) {
        generate_keypair(2048).unwrap()
    }

    #[test]
    fn key_hex_roundtrip() {
        let (sk, pk) = test_keys();
        let sk_hex = private_key_to_hex(&sk).unwrap();
        let pk_hex = public_key_to_hex(&pk).unwrap();
        let sk2 = private_key_from_hex(&sk_hex).unwrap();
        let pk2 = public_key_from_hex(&pk_hex).unwrap();
        assert_eq!(sk.to_pkcs8_der().unwrap().as_bytes(), sk2.to_pkcs8_der().unwrap().as_bytes());
        assert_eq!(
            pk.to_public_key_der().unwrap().as_bytes(),
            pk2.to_public_key_der().unwrap().as_bytes()
        );
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let (sk, pk) = test_keys();
        let state_hash = hashing::to_hex(&hashing::sha256(b"hello world"));
        let sig = sign(&sk, &state_hash).unwrap();
        assert!(verify(&pk, &state_hash, &sig).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_hash() {
        let (sk, pk) = test_keys();
        let state_hash = hashing::to_hex(&hashing::sha256(b"hello world"));
        let sig = sign(&sk, &state_hash).unwrap();
        let other_hash = hashing::to_hex(&hashing::sha256(b"goodbye world"));
        assert!(verify(&pk, &other_hash, &sig).is_err());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let (sk, _pk) = test_keys();
        let (_sk2, pk2) = test_keys();
        let state_hash = hashing::to_hex(&hashing::sha256(b"hello world"));
        let sig = sign(&sk, &state_hash).unwrap();
        assert!(verify(&pk2, &state_hash, &sig).is_err());
    }

    fn build_chain(sk: &RsaPrivateKey, n: usize) -> Vec<Proof> {
        let mut proofs = Vec::new();
        let mut leaves: Vec<Digest> = Vec::new();
        let mut prev_hash = String::new();
        for i in 0..n {
            let state_hash_bytes = hashing::sha256(format!("transition-{i}").as_bytes());
            let state_hash = hashing::to_hex(&state_hash_bytes);
            leaves.push(state_hash_bytes);
            let root = merkle::compute_root(&leaves);
            let proof_struct = merkle::build_proof(&leaves, i).unwrap();
            let signature = sign(sk, &state_hash).unwrap();
            proofs.push(Proof {
                state_hash: state_hash.clone(),
                prev_hash: prev_hash.clone(),
                merkle_root: hashing::to_hex(&root),
                merkle_proof: proof_struct.to_hex_vec(),
                signature,
                timestamp: i as u64,
            });
            prev_hash = state_hash;
        }
        proofs
    }

    #[test]
    fn verify_chain_accepts_valid_chain() {
        let (sk, pk) = test_keys();
        let proofs = build_chain(&sk, 4);
        let result = verify_chain(&proofs, &pk);
        assert!(result.ok);
        assert_eq!(result.failed_at, None);
    }

    #[test]
    fn verify_chain_detects_tampered_state_hash() {
        let (sk, pk) = test_keys();
        let mut proofs = build_chain(&sk, 4);
        let mut bytes = hex::decode(&proofs[1].state_hash).unwrap();
        bytes[0] ^= 0xFF;
        proofs[1].state_hash = hex::encode(bytes);
        let result = verify_chain(&proofs, &pk);
        assert!(!result.ok);
        assert!(result.failed_at.unwrap() <= 2);
    }

    #[test]
    fn verify_chain_detects_broken_prev_hash_link() {
        let (sk, pk) = test_keys();
        let mut proofs = build_chain(&sk, 3);
        proofs[2].prev_hash = proofs[0].state_hash.clone();
        let result = verify_chain(&proofs, &pk);
        assert_eq!(result.failed_at, Some(2));
    }

    #[test]
    fn verify_chain_empty_is_ok() {
        let (_sk, pk) = test_keys();
        let result = verify_chain(&[], &pk);
        assert!(result.ok);
    }
}
