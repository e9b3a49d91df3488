use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::{Lock, LockError, LockGuard, LockManager};

/// In-memory lock backed by `Mutex<bool>`.
pub struct InMemoryLock {
    state: Mutex<bool>,
}

impl InMemoryLock {
    pub fn new() -> Self {
        InMemoryLock {
            state: Mutex::new(false),
        }
    }
}

impl Default for InMemoryLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Lock for InMemoryLock {
    fn try_lock(&self) -> Result<bool, LockError> {
        let mut locked = self
            .state
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        if *locked {
            Ok(false)
        } else {
            *locked = true;
            Ok(true)
        }
    }

    fn unlock(&self) -> Result<(), LockError> {
        let mut locked = self
            .state
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        *locked = false;
        Ok(())
    }

    fn is_locked(&self) -> Result<bool, LockError> {
        self.state
            .lock()
            .map(|locked| *locked)
            .map_err(|e| LockError::Poisoned(e.to_string()))
    }
}

type LockTable = Arc<Mutex<HashMap<String, Arc<InMemoryLock>>>>;

/// In-memory lock manager backed by a `HashMap<String, Arc<InMemoryLock>>`.
///
/// Entries are created lazily on first use and evicted as soon as nobody
/// holds or references them, so the table only ever contains keys that are
/// being worked on right now.
#[derive(Clone, Default)]
pub struct InMemoryLockManager {
    locks: LockTable,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Drop our handle on `lock` and remove the table entry if it was the last one.
///
/// Runs under the table mutex so no other caller can clone the entry between
/// the reference-count check and the removal.
fn evict_if_idle(table: &LockTable, key: &str, lock: Arc<InMemoryLock>) {
    let mut locks = table.lock().unwrap_or_else(PoisonError::into_inner);
    drop(lock);
    let idle = locks
        .get(key)
        .map(|entry| Arc::strong_count(entry) == 1 && !entry.is_locked().unwrap_or(true))
        .unwrap_or(false);
    if idle {
        locks.remove(key);
    }
}

impl LockManager for InMemoryLockManager {
    fn try_acquire(&self, key: &str) -> Result<Option<LockGuard>, LockError> {
        if key.is_empty() {
            return Err(LockError::InvalidKey("empty key".into()));
        }

        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| LockError::Poisoned("lock manager map poisoned".into()))?;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(InMemoryLock::new()))
                .clone()
        };

        if !lock.try_lock()? {
            debug!(key, "lock already held");
            evict_if_idle(&self.locks, key, lock);
            return Ok(None);
        }

        let table = Arc::clone(&self.locks);
        let owned_key = key.to_string();
        Ok(Some(LockGuard::new(key, move || {
            if let Err(e) = lock.unlock() {
                debug!(key = %owned_key, error = %e, "unlock failed");
            }
            evict_if_idle(&table, &owned_key, lock);
        })))
    }

    fn len(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}
