//! Document store contract - the remote system of record.
//!
//! The store only offers equality-filtered reads and single-document writes.
//! There are no multi-document transactions; the only atomic primitive is
//! [`DocumentStore::conditional_update`], which applies a change only if the
//! stored version still equals the caller's expectation.
//!
//! ## Example
//!
//! ```ignore
//! use sporttag::store::{DocumentStore, Filter, InMemoryStore, WriteOutcome};
//!
//! let store = InMemoryStore::new();
//! let saved = store.insert(&child).await?;
//! let found = store.find::<Child>(&Filter::new().eq("lastName", "Muster")).await?;
//! match store.conditional_update::<Child>(&saved.id, saved.version, &changes).await? {
//!     WriteOutcome::Applied { version } => println!("now at {version}"),
//!     WriteOutcome::NotApplied => println!("someone else got there first"),
//! }
//! ```

mod in_memory;
#[cfg(feature = "parse")]
mod parse;
#[allow(clippy::module_inception)]
mod store;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use in_memory::InMemoryStore;
#[cfg(feature = "parse")]
pub use parse::ParseStore;
pub use store::DocumentStore;

/// A set of field values, as written to or read from the store.
pub type Fields = Map<String, Value>;

/// Trait for types persisted as documents.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection (Parse class) this record lives in.
    const COLLECTION: &'static str;
}

/// A record together with its store-assigned identity and concurrency token.
///
/// Serializes flat: `{"id": ..., "version": ..., <record fields>}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Versioned<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
    pub version: u64,
}

/// Result of a write that may be refused by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write happened; `version` is the token now stored.
    Applied { version: u64 },
    /// The target did not exist or its version no longer matched.
    NotApplied,
}

/// Equality predicate over document fields. All entries must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Filter(Fields);

impl Filter {
    /// An empty filter matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    /// Whether `document` satisfies every equality in this filter.
    pub fn matches(&self, document: &Fields) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }
}

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached (connect failure, timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The store answered with a non-success status.
    #[error("store rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    /// The store answered with something we could not interpret.
    #[error("invalid store response: {0}")]
    InvalidResponse(String),
    /// A record could not be converted to or from its document form.
    #[error("record serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    /// In-process storage lock poisoned.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Serialize a record into its top-level document fields.
pub(crate) fn to_fields<R: Record>(record: &R) -> Result<Fields, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidResponse(format!(
            "{} must serialize to an object, got {}",
            R::COLLECTION,
            other
        ))),
    }
}
