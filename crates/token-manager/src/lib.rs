//! Access token lifecycle and authentication core
//!
//! Orchestrates issuance, validation, revocation and the expiry sweep on
//! top of a `TokenStore`, and exposes the `Authenticator` boundary
//! adapter that a request pipeline calls with a raw `Authorization`
//! header value.
//!
//! Token lifecycle:
//! 1. `TokenManager::issue()` generates a secret, stores only its digest,
//!    and hands the plaintext back exactly once
//! 2. Each request goes through `Authenticator::authenticate()` →
//!    `TokenManager::find_valid()` → digest lookup → expiry check
//! 3. Successful authentication updates `last_used_at` best-effort
//! 4. Tokens die by `revoke()`, `revoke_all()` or the out-of-band
//!    `purge_expired()` sweep — revocation is physical removal, there is
//!    no separate revoked flag
//!
//! The manager holds no per-request state; every operation is stateless
//! apart from the store, so instances can be shared freely across tasks
//! and processes.

pub mod authenticator;
pub mod error;
pub mod manager;

pub use authenticator::{AuthSuccess, Authenticator, extract_bearer};
pub use error::{AuthError, Error, Result};
pub use manager::{IssuedToken, TokenManager};
