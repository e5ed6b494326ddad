//! Token persistence abstraction
//!
//! Defines the `TokenStore` trait that decouples the token manager from
//! how records are persisted. Two implementations ship here:
//! `MemoryStore` (in-process, for tests and embedding) and `FileStore`
//! (JSON file with atomic writes). A database-backed store implements
//! the same trait.
//!
//! The store is the single source of truth for digest uniqueness: `save`
//! rejects a record whose `secret_hash` already belongs to a different
//! record, so a digest can never validate two distinct secrets. The
//! store only persists what it is given — it never creates or disposes
//! records on its own initiative.
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn TokenStore>`).

pub mod file;
pub mod memory;
mod table;

pub use file::FileStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use token_core::{OwnerRef, TokenRecord};
use uuid::Uuid;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("secret hash already present for a different token")]
    DuplicateHash,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("store parse error: {0}")]
    Parse(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Abstraction over token record persistence.
///
/// All operations involve at least one store round-trip and may suspend
/// on I/O; callers treat them as latency-bearing, never as pure
/// functions. Expiry filters take an explicit `now` so one evaluation
/// uses one consistent timestamp.
pub trait TokenStore: Send + Sync {
    /// Insert or update a record.
    ///
    /// Fails with [`Error::DuplicateHash`] if the record's `secret_hash`
    /// is already held by a record with a different id.
    fn save<'a>(
        &'a self,
        record: &'a TokenRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Delete a record by id. Returns whether it existed; deleting an
    /// absent record is not an error.
    fn remove(&self, id: Uuid) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>>;

    /// Look up a record by secret digest. O(1) against the digest index.
    fn find_by_hash<'a>(
        &'a self,
        secret_hash: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TokenRecord>>> + Send + 'a>>;

    /// All records for an owner, expired or not.
    fn find_by_owner<'a>(
        &'a self,
        owner: &'a OwnerRef,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TokenRecord>>> + Send + 'a>>;

    /// Records for an owner that are still valid at `now`, filtered
    /// store-side.
    fn find_active_by_owner<'a>(
        &'a self,
        owner: &'a OwnerRef,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TokenRecord>>> + Send + 'a>>;

    /// Delete every record for an owner in one round-trip. Returns the
    /// number removed.
    fn delete_by_owner<'a>(
        &'a self,
        owner: &'a OwnerRef,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>>;

    /// Delete every record whose expiry has passed as of `now`, across
    /// all owners. Returns the number removed.
    fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>>;
}
