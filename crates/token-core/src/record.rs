//! Persisted token records and polymorphic owner references
//!
//! A `TokenRecord` is the stored side of a bearer token: the digest, the
//! owning principal, and the lifecycle timestamps. The plaintext secret
//! is never part of the record.
//!
//! Owners are referenced by a type discriminator plus an opaque id
//! (`OwnerRef`) instead of a typed pointer, so storage stays ignorant of
//! concrete principal types. Resolving an `OwnerRef` back to a live
//! principal is the authentication boundary's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Polymorphic reference to a token's owning principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Type discriminator, e.g. "user" or "service-account"
    pub owner_type: String,
    /// Opaque identifier within that type
    pub owner_id: String,
}

impl OwnerRef {
    pub fn new(owner_type: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id: owner_id.into(),
        }
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.owner_type, self.owner_id)
    }
}

/// A persisted access token.
///
/// Created only by the token manager at issuance; mutated only by
/// `last_used_at` updates on successful authentication; destroyed by
/// revocation or the expiry sweep. There are no other mutation paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Unique id, assigned at creation
    pub id: Uuid,
    /// Optional human-readable label
    pub name: Option<String>,
    /// Hex SHA-256 digest of the plaintext secret; unique across records
    pub secret_hash: String,
    /// Owning principal
    pub owner: OwnerRef,
    /// Set once at construction
    pub created_at: DateTime<Utc>,
    /// `None` means the token never expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Updated on successful authentication
    pub last_used_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Construct a fresh record. The id and creation timestamp are
    /// assigned here and never change afterwards.
    pub fn new(
        owner: OwnerRef,
        name: Option<String>,
        secret_hash: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            secret_hash,
            owner,
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
        }
    }

    /// Whether the token has expired as of `now`.
    ///
    /// Callers capture a single `now` per evaluation so one check never
    /// races against itself.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    /// Validity is purely a function of `expires_at` and `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now)
    }
}
