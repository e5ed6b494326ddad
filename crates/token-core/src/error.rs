//! Error types for token primitives

/// Errors from secret generation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("secure randomness unavailable: {0}")]
    Randomness(String),
}

/// Result alias for token primitive operations.
pub type Result<T> = std::result::Result<T, Error>;
