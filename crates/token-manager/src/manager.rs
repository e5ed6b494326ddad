//! Token issuance, validation, revocation and the expiry sweep
//!
//! The manager exclusively owns the create/destroy lifecycle of token
//! records; the store only persists what it is handed. Validation is
//! anti-enumeration by design: an unknown secret and an expired one are
//! indistinguishable from the caller's side, both are simply `None`.
//!
//! Digest uniqueness is enforced by the store. When an insert collides
//! (a different record already holds the digest), issuance regenerates
//! the secret and retries a bounded number of times before giving up —
//! a collision is a generation problem, never an authentication one.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::Secret;
use metrics::counter;
use token_core::{OwnerRef, SecretGenerator, TokenHasher, TokenRecord};
use token_store::TokenStore;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Bounded retries for a digest collision at issuance.
const MAX_ISSUE_ATTEMPTS: u32 = 3;

/// The one-time result of issuing a token.
///
/// `secret` is the only copy of the plaintext that will ever exist; it
/// cannot be retrieved again once dropped.
#[derive(Debug)]
pub struct IssuedToken {
    pub secret: Secret<String>,
    pub record: TokenRecord,
}

/// Orchestrates the token lifecycle against an injected store and
/// secret generator.
///
/// Holds no in-memory session state between calls; safe to share via
/// `Arc` across concurrent tasks and across processes.
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    generator: Arc<dyn SecretGenerator>,
    hasher: TokenHasher,
    default_ttl: Option<Duration>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>, generator: Arc<dyn SecretGenerator>) -> Self {
        Self {
            store,
            generator,
            hasher: TokenHasher,
            default_ttl: None,
        }
    }

    /// Apply a service-wide expiry to tokens issued without an explicit
    /// one. Without this, such tokens never expire.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Issue a new token for `owner`.
    ///
    /// Returns the plaintext secret (available only here) together with
    /// the persisted record. `expires_at` of `None` falls back to the
    /// manager's default TTL, if any.
    pub async fn issue(
        &self,
        owner: &OwnerRef,
        name: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedToken> {
        let expires_at = expires_at.or_else(|| self.default_ttl.map(|ttl| Utc::now() + ttl));

        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let secret = self
                .generator
                .generate()
                .map_err(|e| Error::Generation(e.to_string()))?;
            let secret_hash = self.hasher.hash(secret.expose());
            let record = TokenRecord::new(
                owner.clone(),
                name.map(str::to_owned),
                secret_hash,
                expires_at,
            );

            match self.store.save(&record).await {
                Ok(()) => {
                    counter!("tokens_issued_total").increment(1);
                    info!(token_id = %record.id, owner = %owner, "issued access token");
                    return Ok(IssuedToken { secret, record });
                }
                Err(token_store::Error::DuplicateHash) => {
                    warn!(attempt, owner = %owner, "digest collision at issuance, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::Generation(format!(
            "digest collision persisted after {MAX_ISSUE_ATTEMPTS} attempts"
        )))
    }

    /// Issue a token that expires `ttl` from now.
    ///
    /// A zero TTL produces a token that is already expired — useful for
    /// exercising the expiry path end to end.
    pub async fn issue_with_ttl(
        &self,
        owner: &OwnerRef,
        name: Option<&str>,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        self.issue(owner, name, Some(Utc::now() + ttl)).await
    }

    /// Find the record a plaintext secret authenticates, if any.
    ///
    /// Returns `None` both for an unknown secret and for a known but
    /// expired one — the two cases are deliberately indistinguishable.
    /// Store failures propagate; they are not authentication outcomes.
    pub async fn find_valid(&self, secret: &str) -> Result<Option<TokenRecord>> {
        let secret_hash = self.hasher.hash(secret);
        let record = self.store.find_by_hash(&secret_hash).await?;

        let now = Utc::now();
        Ok(record.filter(|r| r.is_valid_at(now)))
    }

    /// Record that the token was just used. Best-effort: a store
    /// failure is logged and swallowed so it never turns an
    /// already-successful authentication into a failure.
    pub async fn touch(&self, record: &mut TokenRecord) {
        record.last_used_at = Some(Utc::now());
        if let Err(e) = self.store.save(record).await {
            warn!(token_id = %record.id, error = %e, "failed to persist last-used timestamp");
        }
    }

    /// Revoke one token. Idempotent: revoking an already-absent record
    /// is a no-op, not an error.
    pub async fn revoke(&self, record: &TokenRecord) -> Result<()> {
        if self.store.remove(record.id).await? {
            counter!("tokens_revoked_total").increment(1);
            info!(token_id = %record.id, owner = %record.owner, "revoked access token");
        } else {
            debug!(token_id = %record.id, "revoke of absent token, no-op");
        }
        Ok(())
    }

    /// Revoke every token belonging to `owner` in one store round-trip.
    /// Returns the number removed, zero if none existed.
    pub async fn revoke_all(&self, owner: &OwnerRef) -> Result<u64> {
        let removed = self.store.delete_by_owner(owner).await?;
        if removed > 0 {
            counter!("tokens_revoked_total").increment(removed);
            info!(owner = %owner, removed, "revoked all access tokens for owner");
        }
        Ok(removed)
    }

    /// The owner's tokens that are currently valid.
    pub async fn active_tokens(&self, owner: &OwnerRef) -> Result<Vec<TokenRecord>> {
        Ok(self.store.find_active_by_owner(owner, Utc::now()).await?)
    }

    /// Delete every expired token across all owners. Meant for periodic
    /// out-of-band invocation, not the request path. Returns the number
    /// removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = self.store.delete_expired(Utc::now()).await?;
        counter!("tokens_purged_total").increment(removed);
        info!(removed, "purged expired access tokens");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use token_core::OsSecretGenerator;
    use token_store::MemoryStore;
    use uuid::Uuid;

    /// Generator that replays a fixed sequence of secrets.
    struct SeqGenerator {
        values: Mutex<Vec<String>>,
    }

    impl SeqGenerator {
        fn new(values: &[&str]) -> Self {
            let mut values: Vec<String> = values.iter().map(|s| s.to_string()).collect();
            values.reverse();
            Self {
                values: Mutex::new(values),
            }
        }
    }

    impl SecretGenerator for SeqGenerator {
        fn generate(&self) -> token_core::Result<Secret<String>> {
            let mut values = self.values.lock().unwrap();
            match values.pop() {
                Some(v) => Ok(Secret::new(v)),
                None => Err(token_core::Error::Randomness("sequence exhausted".into())),
            }
        }
    }

    /// Store wrapper whose saves can be switched to fail.
    struct FlakyStore {
        inner: MemoryStore,
        fail_saves: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_saves: AtomicBool::new(false),
            }
        }
    }

    impl TokenStore for FlakyStore {
        fn save<'a>(
            &'a self,
            record: &'a TokenRecord,
        ) -> Pin<Box<dyn Future<Output = token_store::Result<()>> + Send + 'a>> {
            Box::pin(async move {
                if self.fail_saves.load(Ordering::SeqCst) {
                    return Err(token_store::Error::Io("disk unplugged".into()));
                }
                self.inner.save(record).await
            })
        }

        fn remove(
            &self,
            id: Uuid,
        ) -> Pin<Box<dyn Future<Output = token_store::Result<bool>> + Send + '_>> {
            self.inner.remove(id)
        }

        fn find_by_hash<'a>(
            &'a self,
            secret_hash: &'a str,
        ) -> Pin<Box<dyn Future<Output = token_store::Result<Option<TokenRecord>>> + Send + 'a>>
        {
            self.inner.find_by_hash(secret_hash)
        }

        fn find_by_owner<'a>(
            &'a self,
            owner: &'a OwnerRef,
        ) -> Pin<Box<dyn Future<Output = token_store::Result<Vec<TokenRecord>>> + Send + 'a>>
        {
            self.inner.find_by_owner(owner)
        }

        fn find_active_by_owner<'a>(
            &'a self,
            owner: &'a OwnerRef,
            now: DateTime<Utc>,
        ) -> Pin<Box<dyn Future<Output = token_store::Result<Vec<TokenRecord>>> + Send + 'a>>
        {
            self.inner.find_active_by_owner(owner, now)
        }

        fn delete_by_owner<'a>(
            &'a self,
            owner: &'a OwnerRef,
        ) -> Pin<Box<dyn Future<Output = token_store::Result<u64>> + Send + 'a>> {
            self.inner.delete_by_owner(owner)
        }

        fn delete_expired(
            &self,
            now: DateTime<Utc>,
        ) -> Pin<Box<dyn Future<Output = token_store::Result<u64>> + Send + '_>> {
            self.inner.delete_expired(now)
        }
    }

    fn manager() -> TokenManager {
        TokenManager::new(
            Arc::new(MemoryStore::new()),
            Arc::new(OsSecretGenerator),
        )
    }

    fn owner() -> OwnerRef {
        OwnerRef::new("user", "u1")
    }

    #[tokio::test]
    async fn issue_returns_plaintext_and_record() {
        let manager = manager();
        let issued = manager
            .issue_with_ttl(&owner(), Some("cli"), Duration::days(30))
            .await
            .unwrap();

        let secret = issued.secret.expose();
        assert!(secret.len() >= 40, "secret too short: {}", secret.len());
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, &issued.record.secret_hash);
        assert_eq!(issued.record.secret_hash, TokenHasher.hash(secret));
        assert_eq!(issued.record.name.as_deref(), Some("cli"));
        assert!(issued.record.expires_at.is_some());
    }

    #[tokio::test]
    async fn find_valid_roundtrip() {
        let manager = manager();
        let issued = manager
            .issue_with_ttl(&owner(), Some("cli"), Duration::days(30))
            .await
            .unwrap();

        let found = manager
            .find_valid(issued.secret.expose())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, issued.record.id);

        let tampered = format!("{}x", issued.secret.expose());
        assert!(manager.find_valid(&tampered).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_and_unknown_are_indistinguishable() {
        let manager = manager();
        let issued = manager
            .issue_with_ttl(&owner(), None, Duration::zero())
            .await
            .unwrap();

        let expired = manager.find_valid(issued.secret.expose()).await.unwrap();
        let unknown = manager.find_valid("no-such-secret").await.unwrap();
        assert!(expired.is_none());
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn token_without_expiry_never_expires() {
        let manager = manager();
        let issued = manager.issue(&owner(), None, None).await.unwrap();
        assert!(issued.record.expires_at.is_none());

        let found = manager.find_valid(issued.secret.expose()).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn default_ttl_applies_when_no_expiry_given() {
        let manager = manager().with_default_ttl(Duration::hours(2));
        let issued = manager.issue(&owner(), None, None).await.unwrap();

        let expires = issued.record.expires_at.expect("default TTL must apply");
        let delta = expires - Utc::now();
        assert!(delta > Duration::hours(1) && delta <= Duration::hours(2));
    }

    #[tokio::test]
    async fn explicit_expiry_overrides_default_ttl() {
        let manager = manager().with_default_ttl(Duration::hours(2));
        let explicit = Utc::now() + Duration::days(90);
        let issued = manager.issue(&owner(), None, Some(explicit)).await.unwrap();
        assert_eq!(issued.record.expires_at, Some(explicit));
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let manager = manager();
        let issued = manager.issue(&owner(), None, None).await.unwrap();

        manager.revoke(&issued.record).await.unwrap();
        manager.revoke(&issued.record).await.unwrap();

        assert!(
            manager
                .find_valid(issued.secret.expose())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn revoke_all_empties_the_owner() {
        let manager = manager();
        let owner = owner();
        manager.issue(&owner, Some("a"), None).await.unwrap();
        manager.issue(&owner, Some("b"), None).await.unwrap();

        assert_eq!(manager.revoke_all(&owner).await.unwrap(), 2);
        assert!(manager.active_tokens(&owner).await.unwrap().is_empty());
        assert_eq!(manager.revoke_all(&owner).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn revoke_one_of_two_leaves_the_other() {
        let manager = manager();
        let owner = owner();
        let first = manager.issue(&owner, Some("laptop"), None).await.unwrap();
        let second = manager.issue(&owner, Some("ci"), None).await.unwrap();

        manager.revoke(&first.record).await.unwrap();

        let active = manager.active_tokens(&owner).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.record.id);
        assert_eq!(active[0].name.as_deref(), Some("ci"));
    }

    #[tokio::test]
    async fn purge_removes_exactly_the_expired() {
        let manager = manager();
        let owner = owner();
        manager
            .issue_with_ttl(&owner, Some("stale-1"), Duration::zero())
            .await
            .unwrap();
        manager
            .issue_with_ttl(&owner, Some("stale-2"), Duration::zero())
            .await
            .unwrap();
        let live = manager
            .issue_with_ttl(&owner, Some("live"), Duration::days(1))
            .await
            .unwrap();
        let eternal = manager.issue(&owner, Some("eternal"), None).await.unwrap();

        assert_eq!(manager.purge_expired().await.unwrap(), 2);
        assert_eq!(manager.purge_expired().await.unwrap(), 0);

        let active = manager.active_tokens(&owner).await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(
            manager
                .find_valid(live.secret.expose())
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            manager
                .find_valid(eternal.secret.expose())
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn digest_collision_regenerates_and_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let generator = SeqGenerator::new(&["aaaa", "aaaa", "bbbb"]);
        let manager = TokenManager::new(store.clone(), Arc::new(generator));

        let first = manager.issue(&owner(), None, None).await.unwrap();
        // Second issuance draws "aaaa" again, collides, retries with "bbbb".
        let second = manager.issue(&owner(), None, None).await.unwrap();

        assert_ne!(first.record.secret_hash, second.record.secret_hash);
        assert_eq!(second.secret.expose(), "bbbb");
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn persistent_collision_becomes_generation_error() {
        let generator = SeqGenerator::new(&["cccc", "cccc", "cccc", "cccc"]);
        let manager = TokenManager::new(Arc::new(MemoryStore::new()), Arc::new(generator));

        manager.issue(&owner(), None, None).await.unwrap();
        let err = manager.issue(&owner(), None, None).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn generator_failure_surfaces_as_generation_error() {
        let generator = SeqGenerator::new(&[]);
        let manager = TokenManager::new(Arc::new(MemoryStore::new()), Arc::new(generator));

        let err = manager.issue(&owner(), None, None).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[tokio::test]
    async fn touch_sets_and_persists_last_used() {
        let manager = manager();
        let mut issued = manager.issue(&owner(), None, None).await.unwrap();
        assert!(issued.record.last_used_at.is_none());

        manager.touch(&mut issued.record).await;
        assert!(issued.record.last_used_at.is_some());

        let stored = manager
            .find_valid(issued.secret.expose())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_used_at, issued.record.last_used_at);
    }

    #[tokio::test]
    async fn touch_failure_is_swallowed() {
        let store = Arc::new(FlakyStore::new());
        let manager = TokenManager::new(store.clone(), Arc::new(OsSecretGenerator));
        let mut issued = manager.issue(&owner(), None, None).await.unwrap();

        store.fail_saves.store(true, Ordering::SeqCst);
        manager.touch(&mut issued.record).await;

        // The in-memory copy is updated even though persistence failed.
        assert!(issued.record.last_used_at.is_some());
    }
}
