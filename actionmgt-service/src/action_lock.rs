//! Per-action write serialization
//!
//! A write reads the stored row, mints new secret references, writes and
//! then releases the references of the row it read. Two writers to the same
//! action that both read the same row would each release that row's
//! references, and the references written by the loser would never be
//! released. Holding an [`ActionWriteGuard`] across read, write and release
//! makes the row a writer releases the row it overwrote.
//!
//! Reads take no lock. Entries are removed when their last guard drops.

use actionmgt_core::{ActionMgtResult, EntityId, StorageError, TenantId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockKey = (TenantId, EntityId);
type LockMap = HashMap<LockKey, Arc<AsyncMutex<()>>>;

#[derive(Debug, Default)]
pub struct ActionLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl ActionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to one action.
    pub async fn acquire(
        &self,
        tenant_id: TenantId,
        action_id: &str,
    ) -> ActionMgtResult<ActionWriteGuard> {
        let key = (tenant_id, action_id.to_string());
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| StorageError::LockPoisoned)?;
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        Ok(ActionWriteGuard {
            key: Some(key),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        })
    }

    /// Actions with a writer holding or waiting for their lock.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[must_use = "the action is unlocked as soon as the guard drops"]
pub struct ActionWriteGuard {
    key: Option<LockKey>,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ActionWriteGuard {
    fn drop(&mut self) {
        // Unlock before the map check so a waiter's clone is the only one left.
        drop(self.guard.take());
        let (Some(key), Ok(mut locks)) = (self.key.take(), self.locks.lock()) else {
            return;
        };
        if locks
            .get(&key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&key);
        }
    }
}

impl std::fmt::Debug for ActionWriteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionWriteGuard")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
