//! In-memory record table shared by the memory and file stores
//!
//! Keeps the primary map keyed by id plus a digest index so
//! lookup-by-hash is O(1) and digest uniqueness is enforced on every
//! upsert.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use token_core::{OwnerRef, TokenRecord};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Default)]
pub(crate) struct TableState {
    records: HashMap<Uuid, TokenRecord>,
    by_hash: HashMap<String, Uuid>,
}

impl TableState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Rebuild the digest index from a loaded record map.
    pub(crate) fn from_records(records: HashMap<Uuid, TokenRecord>) -> Self {
        let by_hash = records
            .iter()
            .map(|(id, record)| (record.secret_hash.clone(), *id))
            .collect();
        Self { records, by_hash }
    }

    /// Insert or update, enforcing digest uniqueness. Returns the record
    /// previously held under this id, if any, so a failed persistence
    /// attempt can be rolled back.
    pub(crate) fn upsert(&mut self, record: &TokenRecord) -> Result<Option<TokenRecord>> {
        if let Some(holder) = self.by_hash.get(&record.secret_hash)
            && *holder != record.id
        {
            return Err(Error::DuplicateHash);
        }
        // An update may carry a new digest; drop the stale index entry.
        if let Some(previous) = self.records.get(&record.id)
            && previous.secret_hash != record.secret_hash
        {
            self.by_hash.remove(&previous.secret_hash);
        }
        self.by_hash.insert(record.secret_hash.clone(), record.id);
        Ok(self.records.insert(record.id, record.clone()))
    }

    /// Remove by id, returning the removed record so it can be restored
    /// if the removal fails to persist.
    pub(crate) fn remove(&mut self, id: Uuid) -> Option<TokenRecord> {
        let record = self.records.remove(&id)?;
        self.by_hash.remove(&record.secret_hash);
        Some(record)
    }

    /// Put a previously removed record back, digest index included.
    ///
    /// Only for undoing a mutation under the same lock; the digest
    /// cannot have been taken by anyone else in between.
    pub(crate) fn restore(&mut self, record: TokenRecord) {
        self.by_hash.insert(record.secret_hash.clone(), record.id);
        self.records.insert(record.id, record);
    }

    pub(crate) fn get_by_hash(&self, secret_hash: &str) -> Option<TokenRecord> {
        self.by_hash
            .get(secret_hash)
            .and_then(|id| self.records.get(id))
            .cloned()
    }

    pub(crate) fn owned_by(&self, owner: &OwnerRef) -> Vec<TokenRecord> {
        let mut records: Vec<TokenRecord> = self
            .records
            .values()
            .filter(|record| record.owner == *owner)
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.created_at, record.id));
        records
    }

    pub(crate) fn active_owned_by(&self, owner: &OwnerRef, now: DateTime<Utc>) -> Vec<TokenRecord> {
        let mut records: Vec<TokenRecord> = self
            .records
            .values()
            .filter(|record| record.owner == *owner && record.is_valid_at(now))
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.created_at, record.id));
        records
    }

    pub(crate) fn remove_owned_by(&mut self, owner: &OwnerRef) -> Vec<TokenRecord> {
        let ids: Vec<Uuid> = self
            .records
            .values()
            .filter(|record| record.owner == *owner)
            .map(|record| record.id)
            .collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub(crate) fn remove_expired(&mut self, now: DateTime<Utc>) -> Vec<TokenRecord> {
        let ids: Vec<Uuid> = self
            .records
            .values()
            .filter(|record| record.is_expired_at(now))
            .map(|record| record.id)
            .collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub(crate) fn records(&self) -> &HashMap<Uuid, TokenRecord> {
        &self.records
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
