//! In-process token store
//!
//! Backs the record table with a tokio `Mutex` and nothing else. Used by
//! tests throughout the workspace and suitable for embedding when
//! persistence across restarts is not needed.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use token_core::{OwnerRef, TokenRecord};
use uuid::Uuid;

use crate::table::TableState;
use crate::{Result, TokenStore};

/// Token store holding all records in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<TableState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState::new()),
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl TokenStore for MemoryStore {
    fn save<'a>(
        &'a self,
        record: &'a TokenRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move { self.state.lock().await.upsert(record).map(|_| ()) })
    }

    fn remove(&self, id: Uuid) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>> {
        Box::pin(async move { Ok(self.state.lock().await.remove(id).is_some()) })
    }

    fn find_by_hash<'a>(
        &'a self,
        secret_hash: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TokenRecord>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.state.lock().await.get_by_hash(secret_hash)) })
    }

    fn find_by_owner<'a>(
        &'a self,
        owner: &'a OwnerRef,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TokenRecord>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.state.lock().await.owned_by(owner)) })
    }

    fn find_active_by_owner<'a>(
        &'a self,
        owner: &'a OwnerRef,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TokenRecord>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.state.lock().await.active_owned_by(owner, now)) })
    }

    fn delete_by_owner<'a>(
        &'a self,
        owner: &'a OwnerRef,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(async move { Ok(self.state.lock().await.remove_owned_by(owner).len() as u64) })
    }

    fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
        Box::pin(async move { Ok(self.state.lock().await.remove_expired(now).len() as u64) })
    }
}
