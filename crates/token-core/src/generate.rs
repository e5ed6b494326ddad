//! Plaintext secret generation
//!
//! Secrets are the bearer credential itself, so they come from the OS
//! CSPRNG and nowhere else. If the OS source is unavailable the generator
//! fails — it never degrades to a weaker source.
//!
//! The generator is a trait rather than a free function so callers can
//! inject a deterministic implementation in tests.

use common::Secret;
use rand::TryRng;
use rand::rngs::SysRng;

use crate::error::{Error, Result};

/// Raw entropy per secret, before hex encoding.
///
/// 32 bytes / 256 bits, encoded to a 64-character hex string. Collisions
/// across independently generated secrets are negligible at this length.
pub const SECRET_BYTES: usize = 32;

/// Source of plaintext token secrets.
pub trait SecretGenerator: Send + Sync {
    /// Produce a fresh random secret, hex-encoded.
    fn generate(&self) -> Result<Secret<String>>;
}

/// Production generator backed by the operating system CSPRNG.
#[derive(Debug, Default)]
pub struct OsSecretGenerator;

impl SecretGenerator for OsSecretGenerator {
    fn generate(&self) -> Result<Secret<String>> {
        let mut bytes = [0u8; SECRET_BYTES];
        SysRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::Randomness(e.to_string()))?;
        Ok(Secret::new(hex::encode(bytes)))
    }
}
