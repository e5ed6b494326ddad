//! Request-boundary authentication over bearer tokens
//!
//! Bridges a raw `Authorization` header value to a resolved principal.
//! The caller supplies a resolver closure that turns the token's owner
//! reference into its own principal type; this crate never knows what a
//! user looks like.
//!
//! Every failure sub-case (missing header, malformed scheme, unknown or
//! expired token, unresolvable owner) collapses into the same
//! `AuthError::InvalidToken` so responses cannot be used to probe which
//! stage rejected the request.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use token_core::{OwnerRef, TokenRecord};
use tracing::debug;

use crate::error::AuthError;
use crate::manager::TokenManager;

/// Extract the credential from an `Authorization` header value.
///
/// Accepts `Bearer <token>` with one or more whitespace characters
/// after the case-sensitive scheme. Returns `None` for any other
/// scheme, a missing credential, or a credential containing internal
/// whitespace.
pub fn extract_bearer(header_value: &str) -> Option<&str> {
    let rest = header_value.strip_prefix("Bearer")?;
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// A successful authentication: the resolved principal plus the record
/// the request authenticated with.
#[derive(Debug)]
pub struct AuthSuccess<P> {
    pub principal: P,
    pub record: TokenRecord,
}

/// Authenticates requests by their `Authorization` header.
pub struct Authenticator {
    manager: Arc<TokenManager>,
}

impl Authenticator {
    pub fn new(manager: Arc<TokenManager>) -> Self {
        Self { manager }
    }

    /// Authenticate a request from its raw `Authorization` header
    /// value, resolving the token's owner to a principal via `resolve`.
    ///
    /// On success the record's `last_used_at` is updated best-effort
    /// before the principal is resolved. A resolver returning `None`
    /// (owner no longer exists) is an `InvalidToken`, not an error.
    pub async fn authenticate<P, F, Fut>(
        &self,
        header_value: Option<&str>,
        resolve: F,
    ) -> std::result::Result<AuthSuccess<P>, AuthError>
    where
        F: FnOnce(OwnerRef) -> Fut,
        Fut: Future<Output = Option<P>>,
    {
        let Some(secret) = header_value.and_then(extract_bearer) else {
            counter!("auth_failures_total").increment(1);
            debug!("authentication rejected, missing or malformed bearer header");
            return Err(AuthError::InvalidToken);
        };

        let Some(mut record) = self.manager.find_valid(secret).await? else {
            counter!("auth_failures_total").increment(1);
            debug!("authentication rejected, unknown or expired token");
            return Err(AuthError::InvalidToken);
        };

        self.manager.touch(&mut record).await;

        let Some(principal) = resolve(record.owner.clone()).await else {
            counter!("auth_failures_total").increment(1);
            debug!(token_id = %record.id, "authentication rejected, owner not resolvable");
            return Err(AuthError::InvalidToken);
        };

        counter!("auth_successes_total").increment(1);
        Ok(AuthSuccess { principal, record })
    }
}
