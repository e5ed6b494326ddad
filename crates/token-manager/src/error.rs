//! Error types for token lifecycle operations

/// Errors from token manager operations.
///
/// Generation and store failures propagate to the caller; they are
/// infrastructure problems, never authentication outcomes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token generation failed: {0}")]
    Generation(String),

    #[error("token store error: {0}")]
    Store(#[from] token_store::Error),
}

/// Result alias for manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication outcome errors at the request boundary.
///
/// Every authentication sub-case (missing header, malformed scheme,
/// empty secret, unknown digest, expired record, unresolvable owner)
/// collapses into `InvalidToken` so a caller cannot learn which one
/// occurred. Infrastructure failures stay distinguishable — they are a
/// 5xx concern, not a 401.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid or expired API token")]
    InvalidToken,

    #[error(transparent)]
    Infrastructure(#[from] Error),
}
