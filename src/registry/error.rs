//! Outcomes a workflow can end in besides success.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::lock::LockError;
use crate::store::StoreError;

/// Error type for registry workflows.
///
/// Variants fall into four groups: input errors (never worth retrying),
/// concurrency conflicts (the caller should re-read and retry), consistency
/// violations (more than one record carries a business key) and
/// collaborator failures (the store or the lock table misbehaved).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed payload or a required field missing.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// An update touched a field outside the allow-list.
    #[error("field may not be updated: {0}")]
    InvalidField(String),
    /// Another request is working on the same key right now.
    #[error("already in progress: {0}")]
    AlreadyInProgress(String),
    /// The registration deadline has passed.
    #[error("registration closed at {deadline}")]
    RegistrationClosed { deadline: DateTime<Utc> },
    /// A record with this business key already exists.
    #[error("already exists: {0}")]
    DuplicateRecord(String),
    /// More than one record matches a key that must be unique.
    #[error("data inconsistency: {matches} records match {key}")]
    DataInconsistency { key: String, matches: usize },
    /// No record matches.
    #[error("not found: {0}")]
    NotFound(String),
    /// The record changed since the caller read it.
    #[error("record changed since version {expected}")]
    StaleVersion { expected: u64 },
    /// Mark-paid on a record that is already paid.
    #[error("child is already marked as paid")]
    AlreadyPaid,
    /// A full update identical to the stored record.
    #[error("update would not change anything")]
    NoEffectiveChange,
    /// Store error (unreachable, rejected, unreadable answer).
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Lock table error.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
}

impl RegistryError {
    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            RegistryError::InvalidInput(_) | RegistryError::InvalidField(_) => 400,
            RegistryError::RegistrationClosed { .. } => 403,
            RegistryError::NotFound(_) => 404,
            RegistryError::AlreadyInProgress(_)
            | RegistryError::DuplicateRecord(_)
            | RegistryError::DataInconsistency { .. }
            | RegistryError::StaleVersion { .. }
            | RegistryError::AlreadyPaid
            | RegistryError::NoEffectiveChange => 409,
            RegistryError::Store(StoreError::Serde(_) | StoreError::Poisoned) => 500,
            RegistryError::Store(_) => 502,
            RegistryError::Lock(_) => 500,
        }
    }

    /// Stable machine-readable name for the outcome.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::InvalidInput(_) => "INVALID_INPUT",
            RegistryError::InvalidField(_) => "INVALID_FIELD",
            RegistryError::AlreadyInProgress(_) => "ALREADY_IN_PROGRESS",
            RegistryError::RegistrationClosed { .. } => "REGISTRATION_CLOSED",
            RegistryError::DuplicateRecord(_) => "DUPLICATE_RECORD",
            RegistryError::DataInconsistency { .. } => "DATA_INCONSISTENCY",
            RegistryError::NotFound(_) => "NOT_FOUND",
            RegistryError::StaleVersion { .. } => "STALE_VERSION",
            RegistryError::AlreadyPaid => "ALREADY_PAID",
            RegistryError::NoEffectiveChange => "NO_EFFECTIVE_CHANGE",
            RegistryError::Store(_) => "STORE_FAILURE",
            RegistryError::Lock(_) => "INTERNAL",
        }
    }
}
