//! Personal access token primitives
//!
//! The building blocks of the token lifecycle, with no knowledge of
//! storage or the request pipeline. This crate is a standalone library —
//! it can be tested and used independently of the manager and store
//! crates.
//!
//! Token flow:
//! 1. A `SecretGenerator` produces a random plaintext secret
//! 2. `TokenHasher::hash()` derives the digest that is persisted
//! 3. The plaintext goes to the caller once; only the digest survives
//! 4. On each request, `TokenHasher` recomputes the digest for lookup
//!    and `TokenRecord::is_valid_at()` decides expiry

pub mod error;
pub mod generate;
pub mod hasher;
pub mod record;

pub use error::{Error, Result};
pub use generate::{OsSecretGenerator, SECRET_BYTES, SecretGenerator};
pub use hasher::TokenHasher;
pub use record::{OwnerRef, TokenRecord};
