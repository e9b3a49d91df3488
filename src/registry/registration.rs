//! Registration - create a child exactly once per business key.

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{validate_key, Receipt, Registry, RegistryError};
use crate::model::{BusinessKey, Child};
use crate::store::{DocumentStore, Fields, Versioned};

/// Registration payload: the business key plus any extra attributes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewChild {
    #[serde(flatten)]
    pub key: BusinessKey,
    #[serde(flatten)]
    pub attributes: Fields,
}

impl NewChild {
    pub fn new(key: BusinessKey) -> Self {
        Self {
            key,
            attributes: Fields::new(),
        }
    }
}

impl<S: DocumentStore> Registry<S> {
    /// Register a new child.
    ///
    /// Gates, in order: field validation, the per-key lock, the deadline,
    /// the duplicate check, the insert, and a post-insert re-read. The lock
    /// is held from the second gate to the end and released on every path.
    pub async fn register(&self, input: NewChild) -> Result<Receipt, RegistryError> {
        validate_key(&input.key, "registration")?;

        let lock_key = input.key.lock_key();
        let _guard = self.acquire(&lock_key).inspect_err(|_| {
            info!(key = %input.key, "registration already in progress");
        })?;

        if self.clock.now() > self.deadline {
            info!(key = %input.key, deadline = %self.deadline, "registration after deadline");
            return Err(RegistryError::RegistrationClosed {
                deadline: self.deadline,
            });
        }

        let described = input.key.to_string();
        if let Some(existing) = self
            .find_unique::<Child>(&input.key.filter(), &described)
            .await?
        {
            debug!(key = %input.key, id = %existing.id, "duplicate registration");
            return Err(RegistryError::DuplicateRecord(described));
        }

        let saved = self
            .store
            .insert(&Child::new(input.key, input.attributes))
            .await?;
        self.confirm_sole_record(&saved).await?;

        info!(id = %saved.id, key = %saved.data.key, "child registered");
        Ok(Receipt {
            id: saved.id,
            version: saved.version,
        })
    }

    /// Re-read the key after inserting, to settle races with other processes
    /// that slipped past their own lock.
    ///
    /// When several records carry the key, the oldest one (first in store
    /// order) survives. Every racer picks the same survivor, so exactly one
    /// registration stands and the others delete their own record. If the
    /// re-read itself fails, the insert stands and a warning is logged.
    async fn confirm_sole_record(&self, saved: &Versioned<Child>) -> Result<(), RegistryError> {
        let matches = match self.store.find::<Child>(&saved.data.key.filter()).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(
                    id = %saved.id,
                    key = %saved.data.key,
                    error = %e,
                    "post-insert check failed, keeping registration"
                );
                return Ok(());
            }
        };

        let survivor = matches.first().map_or(saved.id.as_str(), |oldest| oldest.id.as_str());
        if survivor == saved.id {
            if matches.len() > 1 {
                info!(id = %saved.id, matches = matches.len(), "won concurrent registration");
            }
            return Ok(());
        }

        warn!(
            id = %saved.id,
            survivor,
            key = %saved.data.key,
            matches = matches.len(),
            "concurrent registration detected after insert, backing out"
        );
        self.store.delete::<Child>(&saved.id).await?;
        Err(RegistryError::DuplicateRecord(saved.data.key.to_string()))
    }
}
