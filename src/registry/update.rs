//! Update-by-business-key with optimistic concurrency.
//!
//! The caller names the child by its business key and states the version it
//! last saw. The version is compared twice: once against the record just
//! read, and once more by the store itself as the predicate of the
//! conditional write. Together the two checks close the read-modify-write
//! window without any lock.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{validate_key, Receipt, Registry, RegistryError};
use crate::lock::LockGuard;
use crate::model::{BusinessKey, Child};
use crate::store::{DocumentStore, Fields, Versioned, WriteOutcome};

/// Field names an update may touch.
pub const UPDATABLE_FIELDS: &[&str] = &["firstName", "lastName", "birthYear", "gender", "paid"];

/// Which kind of change the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Partial update: set `paid = true` and nothing else.
    MarkPaid,
    /// Full update: all four key fields and `paid` are replaced.
    Replace,
}

/// Update payload: who, what, and the version the caller last observed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateRequest {
    #[serde(default)]
    pub search: BusinessKey,
    #[serde(default)]
    pub update: Fields,
    #[serde(default)]
    pub expected_version: u64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MarkPaid {
    paid: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Replacement {
    first_name: String,
    last_name: String,
    birth_year: u16,
    gender: String,
    paid: bool,
}

impl Replacement {
    fn key(&self) -> BusinessKey {
        BusinessKey::new(
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.birth_year,
            self.gender.as_str(),
        )
    }
}

impl<S: DocumentStore> Registry<S> {
    /// Update the child identified by `request.search`.
    pub async fn update(
        &self,
        mode: UpdateMode,
        request: UpdateRequest,
    ) -> Result<Receipt, RegistryError> {
        validate_key(&request.search, "search")?;
        if request.expected_version == 0 {
            return Err(RegistryError::InvalidInput(
                "expectedVersion missing or invalid".into(),
            ));
        }

        let described = request.search.to_string();
        let current = self
            .find_unique::<Child>(&request.search.filter(), &described)
            .await?
            .ok_or_else(|| RegistryError::NotFound(described.clone()))?;

        if let Some(field) = request
            .update
            .keys()
            .find(|field| !UPDATABLE_FIELDS.contains(&field.as_str()))
        {
            return Err(RegistryError::InvalidField(field.clone()));
        }

        if current.version != request.expected_version {
            info!(
                id = %current.id,
                expected = request.expected_version,
                current = current.version,
                "stale update rejected"
            );
            return Err(RegistryError::StaleVersion {
                expected: request.expected_version,
            });
        }

        // The guard (if any) protects a business-key change until the write lands.
        let (changes, _guard) = match mode {
            UpdateMode::MarkPaid => (mark_paid_changes(&current, request.update)?, None),
            UpdateMode::Replace => self.replacement_changes(&current, request.update).await?,
        };

        match self
            .store
            .conditional_update::<Child>(&current.id, current.version, &changes)
            .await?
        {
            WriteOutcome::Applied { version } => {
                info!(id = %current.id, version, ?mode, "child updated");
                Ok(Receipt {
                    id: current.id,
                    version,
                })
            }
            WriteOutcome::NotApplied => {
                info!(id = %current.id, expected = current.version, "conditional write lost the race");
                Err(RegistryError::StaleVersion {
                    expected: request.expected_version,
                })
            }
        }
    }

    /// Validate a full replacement and build its change set.
    ///
    /// A replacement that moves the child to a different business key takes
    /// the lock for the new key and checks that no other child holds it, so
    /// an update cannot create a duplicate that registration would refuse.
    async fn replacement_changes(
        &self,
        current: &Versioned<Child>,
        update: Fields,
    ) -> Result<(Fields, Option<LockGuard>), RegistryError> {
        let replacement: Replacement = serde_json::from_value(Value::Object(update))
            .map_err(|e| RegistryError::InvalidInput(format!("full update: {e}")))?;
        let new_key = replacement.key();
        validate_key(&new_key, "update")?;

        if current.data.paid && !replacement.paid {
            return Err(RegistryError::InvalidInput(
                "paid cannot be reset once set".into(),
            ));
        }
        if new_key == current.data.key && replacement.paid == current.data.paid {
            debug!(id = %current.id, "full update without effect");
            return Err(RegistryError::NoEffectiveChange);
        }

        let guard = if new_key != current.data.key {
            let guard = self.acquire(&new_key.lock_key())?;
            let taken = self
                .store
                .find::<Child>(&new_key.filter())
                .await?
                .into_iter()
                .any(|other| other.id != current.id);
            if taken {
                return Err(RegistryError::DuplicateRecord(new_key.to_string()));
            }
            Some(guard)
        } else {
            None
        };

        let mut changes = Fields::new();
        changes.insert("firstName".into(), json!(new_key.first_name));
        changes.insert("lastName".into(), json!(new_key.last_name));
        changes.insert("birthYear".into(), json!(new_key.birth_year));
        changes.insert("gender".into(), json!(new_key.gender));
        changes.insert("paid".into(), json!(replacement.paid));
        Ok((changes, guard))
    }
}

/// Validate a mark-paid request and build its change set.
fn mark_paid_changes(current: &Versioned<Child>, update: Fields) -> Result<Fields, RegistryError> {
    let MarkPaid { paid } = serde_json::from_value(Value::Object(update)).map_err(|e| {
        RegistryError::InvalidInput(format!("partial update must be {{\"paid\": true}}: {e}"))
    })?;
    if !paid {
        return Err(RegistryError::InvalidInput(
            "partial update only allows paid = true".into(),
        ));
    }
    if current.data.paid {
        return Err(RegistryError::AlreadyPaid);
    }

    let mut changes = Fields::new();
    changes.insert("paid".into(), Value::Bool(true));
    Ok(changes)
}
