//! File-backed token store
//!
//! Persists the record map as a JSON file. All writes use atomic
//! temp-file + rename to prevent corruption on crash, and the file is
//! created 0600 since digests and owner references are access-control
//! data. A tokio `Mutex` serializes mutations from concurrent requests.
//!
//! Memory and disk must never diverge: when the disk write fails, the
//! in-memory mutation is rolled back before the error propagates. A
//! removal that did not reach disk would otherwise report the record as
//! gone while it still authenticates after the next load.
//!
//! The digest index lives only in memory and is rebuilt at load time;
//! the file holds nothing but the records themselves.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use token_core::{OwnerRef, TokenRecord};
use tracing::{debug, info};
use uuid::Uuid;

use crate::table::TableState;
use crate::{Error, Result, TokenStore};

/// Token store persisting records to a single JSON file.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<TableState>,
}

impl FileStore {
    /// Load records from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` so future loads
    /// skip the cold-start path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let records: HashMap<Uuid, TokenRecord> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), tokens = records.len(), "loaded token records");
            TableState::from_records(records)
        } else {
            info!(path = %path.display(), "token file not found, starting empty");
            let state = TableState::new();
            write_atomic(&path, state.records()).await?;
            state
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }
}

impl TokenStore for FileStore {
    fn save<'a>(
        &'a self,
        record: &'a TokenRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let previous = state.upsert(record)?;
            if let Err(e) = write_atomic(&self.path, state.records()).await {
                state.remove(record.id);
                if let Some(previous) = previous {
                    state.restore(previous);
                }
                return Err(e);
            }
            Ok(())
        })
    }

    fn remove(&self, id: Uuid) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let Some(removed) = state.remove(id) else {
                return Ok(false);
            };
            if let Err(e) = write_atomic(&self.path, state.records()).await {
                state.restore(removed);
                return Err(e);
            }
            Ok(true)
        })
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
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let removed = state.remove_owned_by(owner);
            if removed.is_empty() {
                return Ok(0);
            }
            let count = removed.len() as u64;
            if let Err(e) = write_atomic(&self.path, state.records()).await {
                for record in removed {
                    state.restore(record);
                }
                return Err(e);
            }
            Ok(count)
        })
    }

    fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let removed = state.remove_expired(now);
            if removed.is_empty() {
                return Ok(0);
            }
            let count = removed.len() as u64;
            if let Err(e) = write_atomic(&self.path, state.records()).await {
                for record in removed {
                    state.restore(record);
                }
                return Err(e);
            }
            Ok(count)
        })
    }
}

/// Write the record map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it
/// over the target. Sets 0600 permissions (owner read/write only).
async fn write_atomic(path: &Path, records: &HashMap<Uuid, TokenRecord>) -> Result<()> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| Error::Parse(format!("serializing token records: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token file path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token records");
    Ok(())
}
