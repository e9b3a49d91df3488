//! InMemoryStore - HashMap-backed document store for testing and development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{
    to_fields, DocumentStore, Fields, Filter, Record, StoreError, Versioned, WriteOutcome,
};

/// Internal stored representation of a document.
struct StoredDocument {
    fields: Fields,
    version: u64,
}

/// In-memory document store backed by a HashMap.
///
/// Storage key is `"COLLECTION:id"`. Clone-friendly via Arc. Every call
/// holds the storage lock for its whole duration, so each operation is
/// atomic the same way a single remote request is.
#[derive(Clone)]
pub struct InMemoryStore {
    storage: Arc<RwLock<HashMap<String, StoredDocument>>>,
    next_id: Arc<AtomicU64>,
    writes: Arc<AtomicU64>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of successful inserts, updates and deletes so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Insert a document under a caller-chosen id, bypassing any checks.
    ///
    /// Lets tests seed states the workflows would never produce, such as
    /// two children sharing a business key.
    pub fn seed<R: Record>(&self, id: &str, record: &R, version: u64) -> Result<(), StoreError> {
        let fields = to_fields(record)?;
        let mut storage = self.storage.write().map_err(|_| StoreError::Poisoned)?;
        storage.insert(Self::make_key(R::COLLECTION, id), StoredDocument { fields, version });
        Ok(())
    }

    fn make_key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }

    fn generate_id(&self) -> String {
        format!("{:010}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn merge(target: &mut Fields, changes: &Fields) {
    for (field, value) in changes {
        target.insert(field.clone(), value.clone());
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find<R: Record>(&self, filter: &Filter) -> Result<Vec<Versioned<R>>, StoreError> {
        let storage = self.storage.read().map_err(|_| StoreError::Poisoned)?;

        let prefix = format!("{}:", R::COLLECTION);
        let mut results = Vec::new();

        for (key, stored) in storage.iter() {
            let Some(id) = key.strip_prefix(&prefix) else {
                continue;
            };
            if !filter.matches(&stored.fields) {
                continue;
            }
            let data: R = serde_json::from_value(stored.fields.clone().into())?;
            results.push(Versioned {
                id: id.to_string(),
                data,
                version: stored.version,
            });
        }

        // Generated ids are zero-padded and increasing, so id order is creation order.
        results.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(results)
    }

    async fn insert<R: Record>(&self, record: &R) -> Result<Versioned<R>, StoreError> {
        let fields = to_fields(record)?;
        let id = self.generate_id();

        let mut storage = self.storage.write().map_err(|_| StoreError::Poisoned)?;
        storage.insert(
            Self::make_key(R::COLLECTION, &id),
            StoredDocument { fields, version: 1 },
        );
        self.record_write();

        Ok(Versioned {
            id,
            data: record.clone(),
            version: 1,
        })
    }

    async fn update<R: Record>(
        &self,
        id: &str,
        changes: &Fields,
    ) -> Result<WriteOutcome, StoreError> {
        let mut storage = self.storage.write().map_err(|_| StoreError::Poisoned)?;

        match storage.get_mut(&Self::make_key(R::COLLECTION, id)) {
            Some(stored) => {
                merge(&mut stored.fields, changes);
                stored.version += 1;
                self.record_write();
                Ok(WriteOutcome::Applied {
                    version: stored.version,
                })
            }
            None => Ok(WriteOutcome::NotApplied),
        }
    }

    async fn conditional_update<R: Record>(
        &self,
        id: &str,
        expected_version: u64,
        changes: &Fields,
    ) -> Result<WriteOutcome, StoreError> {
        let mut storage = self.storage.write().map_err(|_| StoreError::Poisoned)?;

        let Some(stored) = storage.get_mut(&Self::make_key(R::COLLECTION, id)) else {
            return Ok(WriteOutcome::NotApplied);
        };
        if stored.version != expected_version {
            return Ok(WriteOutcome::NotApplied);
        }

        merge(&mut stored.fields, changes);
        stored.version += 1;
        self.record_write();

        Ok(WriteOutcome::Applied {
            version: stored.version,
        })
    }

    async fn delete<R: Record>(&self, id: &str) -> Result<bool, StoreError> {
        let mut storage = self.storage.write().map_err(|_| StoreError::Poisoned)?;
        let existed = storage.remove(&Self::make_key(R::COLLECTION, id)).is_some();
        if existed {
            self.record_write();
        }
        Ok(existed)
    }
}
