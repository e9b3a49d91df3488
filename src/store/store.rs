//! DocumentStore - the operations workflows may issue against the store.

use async_trait::async_trait;

use super::{Fields, Filter, Record, StoreError, Versioned, WriteOutcome};

/// Abstract document storage.
///
/// Every method is a single round trip. Implementations own no
/// cross-request state beyond the documents themselves.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents of `R` matching `filter`, oldest first. Multiplicity
    /// matters to callers, so this never collapses duplicates.
    async fn find<R: Record>(&self, filter: &Filter) -> Result<Vec<Versioned<R>>, StoreError>;

    /// Insert a new document with version 1 and return it with its generated id.
    async fn insert<R: Record>(&self, record: &R) -> Result<Versioned<R>, StoreError>;

    /// Apply `changes` to document `id` without a version check, advancing
    /// the version by one. `NotApplied` if the document does not exist.
    async fn update<R: Record>(&self, id: &str, changes: &Fields)
        -> Result<WriteOutcome, StoreError>;

    /// Apply `changes` only if document `id` is still at `expected_version`,
    /// advancing the version by one.
    async fn conditional_update<R: Record>(
        &self,
        id: &str,
        expected_version: u64,
        changes: &Fields,
    ) -> Result<WriteOutcome, StoreError>;

    /// Delete document `id`. Returns `true` if it existed.
    async fn delete<R: Record>(&self, id: &str) -> Result<bool, StoreError>;
}
