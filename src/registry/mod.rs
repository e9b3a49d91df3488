//! Registry - the workflows that mutate children and squad assignments.
//!
//! `Registry<S>` holds the store, the lock manager and the clock. Nothing
//! here is global: tests build a registry around an [`InMemoryStore`] and
//! whatever lock manager or clock they need.
//!
//! ## Concurrency
//!
//! - Registration and assignment run check-then-insert sequences. They take a
//!   non-blocking per-key lock first, so two requests for the same key inside
//!   this process cannot interleave; the loser gets `AlreadyInProgress`.
//! - Updates never lock. They compare the caller's version with the stored
//!   one and write through [`DocumentStore::conditional_update`], which the
//!   store evaluates atomically.
//! - The lock only covers one process. Across instances, registration
//!   re-reads the key after inserting and backs out if another record
//!   appeared, so the store stays the final arbiter.
//!
//! ## Example
//!
//! ```ignore
//! use sporttag::registry::Registry;
//! use sporttag::store::InMemoryStore;
//!
//! let registry = Registry::new(InMemoryStore::new(), deadline);
//! let created = registry.register(new_child).await?;
//! let updated = registry.update(UpdateMode::MarkPaid, request).await?;
//! ```
//!
//! [`InMemoryStore`]: crate::store::InMemoryStore

mod assignment;
mod error;
mod registration;
mod update;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::lock::{InMemoryLockManager, LockGuard, LockManager};
use crate::model::{BusinessKey, Child};
use crate::store::{DocumentStore, Filter, Record, Versioned};

pub use assignment::AssignmentRequest;
pub use error::RegistryError;
pub use registration::NewChild;
pub use update::{UpdateMode, UpdateRequest, UPDATABLE_FIELDS};

/// Identity and concurrency token of a record after a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub id: String,
    pub version: u64,
}

/// Entry point for every workflow.
pub struct Registry<S> {
    store: S,
    locks: Arc<dyn LockManager>,
    clock: Arc<dyn Clock>,
    deadline: DateTime<Utc>,
}

impl<S: DocumentStore> Registry<S> {
    /// A registry with an in-memory lock table and the system clock.
    pub fn new(store: S, deadline: DateTime<Utc>) -> Self {
        Self {
            store,
            locks: Arc::new(InMemoryLockManager::new()),
            clock: Arc::new(SystemClock),
            deadline,
        }
    }

    /// Use a different lock manager.
    pub fn with_lock_manager(mut self, locks: Arc<dyn LockManager>) -> Self {
        self.locks = locks;
        self
    }

    /// Use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locks(&self) -> &dyn LockManager {
        self.locks.as_ref()
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Every registered child with its id and version.
    pub async fn list(&self) -> Result<Vec<Versioned<Child>>, RegistryError> {
        Ok(self.store.find::<Child>(&Filter::new()).await?)
    }

    /// Take the lock for `key` or fail with `AlreadyInProgress`.
    fn acquire(&self, key: &str) -> Result<LockGuard, RegistryError> {
        self.locks
            .try_acquire(key)?
            .ok_or_else(|| RegistryError::AlreadyInProgress(key.to_string()))
    }

    /// The single record matching `filter`, if any.
    ///
    /// More than one match means the uniqueness invariant is already broken;
    /// that is reported, never repaired.
    async fn find_unique<R: Record>(
        &self,
        filter: &Filter,
        described_as: &str,
    ) -> Result<Option<Versioned<R>>, RegistryError> {
        let mut matches = self.store.find::<R>(filter).await?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            n => {
                tracing::error!(key = described_as, matches = n, "uniqueness invariant violated");
                Err(RegistryError::DataInconsistency {
                    key: described_as.to_string(),
                    matches: n,
                })
            }
        }
    }
}

/// Reject a key with empty fields. `context` names the payload part.
fn validate_key(key: &BusinessKey, context: &str) -> Result<(), RegistryError> {
    let missing = key.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::InvalidInput(format!(
            "{context}: missing required field(s) {}",
            missing.join(", ")
        )))
    }
}
