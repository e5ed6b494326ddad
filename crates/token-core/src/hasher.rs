//! One-way secret hashing and constant-time verification
//!
//! Only the SHA-256 digest of a secret is ever persisted. Hashing is
//! deterministic and unsalted: the store must find a record by digest
//! equality on every request, and the secret itself carries 256 bits of
//! entropy, so a salt would add nothing here.
//!
//! Verification compares digests with `subtle::ConstantTimeEq` so timing
//! cannot reveal how much of a digest matched.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hashes secrets and verifies them against stored digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenHasher;

impl TokenHasher {
    /// Compute the hex-encoded SHA-256 digest of a plaintext secret.
    ///
    /// Same input always yields the same output; this is what makes
    /// lookup-by-digest possible.
    pub fn hash(&self, secret: &str) -> String {
        hex::encode(Sha256::digest(secret.as_bytes()))
    }

    /// Check a plaintext secret against a stored digest in constant time.
    ///
    /// Recomputes the digest and compares byte-for-byte without
    /// short-circuiting. A digest of the wrong length is simply unequal.
    pub fn verify(&self, secret: &str, digest: &str) -> bool {
        let computed = self.hash(secret);
        bool::from(computed.as_bytes().ct_eq(digest.as_bytes()))
    }
}
