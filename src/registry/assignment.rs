//! Squad assignment - place a child in a squad, move it, or take it out.
//!
//! Every operation locks on the child id, so assign and unassign for the
//! same child never interleave within this process.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{Receipt, Registry, RegistryError};
use crate::model::SquadAssignment;
use crate::store::{DocumentStore, Fields, WriteOutcome};

/// Assignment payload. `position` is ignored by `unassign`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    #[serde(default)]
    pub child_id: String,
    #[serde(default)]
    pub squad_id: String,
    #[serde(default)]
    pub position: u32,
}

impl AssignmentRequest {
    pub fn new(child_id: impl Into<String>, squad_id: impl Into<String>, position: u32) -> Self {
        Self {
            child_id: child_id.into(),
            squad_id: squad_id.into(),
            position,
        }
    }

    fn validate_ids(&self) -> Result<(), RegistryError> {
        let mut missing = Vec::new();
        if self.child_id.trim().is_empty() {
            missing.push("childId");
        }
        if self.squad_id.trim().is_empty() {
            missing.push("squadId");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::InvalidInput(format!(
                "assignment: missing required field(s) {}",
                missing.join(", ")
            )))
        }
    }

    fn validate_placement(&self) -> Result<(), RegistryError> {
        self.validate_ids()?;
        if self.position == 0 {
            return Err(RegistryError::InvalidInput(
                "assignment: position must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn described(&self) -> String {
        format!("child {} in squad {}", self.child_id, self.squad_id)
    }
}

impl<S: DocumentStore> Registry<S> {
    /// Put a child into a squad. A child belongs to at most one squad.
    pub async fn assign(&self, request: AssignmentRequest) -> Result<Receipt, RegistryError> {
        request.validate_placement()?;
        let _guard = self.acquire(&SquadAssignment::lock_key(&request.child_id))?;

        let existing = self
            .store
            .find::<SquadAssignment>(&SquadAssignment::child_filter(&request.child_id))
            .await?;
        if let Some(current) = existing.first() {
            debug!(
                child = %request.child_id,
                squad = %current.data.squad_id,
                "child already assigned"
            );
            return Err(RegistryError::DuplicateRecord(format!(
                "child {} in squad {}",
                request.child_id, current.data.squad_id
            )));
        }

        let saved = self
            .store
            .insert(&SquadAssignment {
                child_id: request.child_id,
                squad_id: request.squad_id,
                position: request.position,
            })
            .await?;

        info!(
            id = %saved.id,
            child = %saved.data.child_id,
            squad = %saved.data.squad_id,
            position = saved.data.position,
            "child assigned"
        );
        Ok(Receipt {
            id: saved.id,
            version: saved.version,
        })
    }

    /// Move an assigned child to another position within its squad.
    pub async fn reposition(&self, request: AssignmentRequest) -> Result<Receipt, RegistryError> {
        request.validate_placement()?;
        let _guard = self.acquire(&SquadAssignment::lock_key(&request.child_id))?;

        let described = request.described();
        let current = self
            .find_unique::<SquadAssignment>(
                &SquadAssignment::placement_filter(&request.child_id, &request.squad_id),
                &described,
            )
            .await?
            .ok_or_else(|| RegistryError::NotFound(described.clone()))?;

        let mut changes = Fields::new();
        changes.insert("position".into(), Value::from(request.position));
        match self
            .store
            .update::<SquadAssignment>(&current.id, &changes)
            .await?
        {
            WriteOutcome::Applied { version } => {
                info!(id = %current.id, position = request.position, version, "child repositioned");
                Ok(Receipt {
                    id: current.id,
                    version,
                })
            }
            WriteOutcome::NotApplied => Err(RegistryError::NotFound(described)),
        }
    }

    /// Remove a child from a squad.
    pub async fn unassign(&self, request: AssignmentRequest) -> Result<(), RegistryError> {
        request.validate_ids()?;
        let _guard = self.acquire(&SquadAssignment::lock_key(&request.child_id))?;

        let described = request.described();
        let current = self
            .find_unique::<SquadAssignment>(
                &SquadAssignment::placement_filter(&request.child_id, &request.squad_id),
                &described,
            )
            .await?
            .ok_or_else(|| RegistryError::NotFound(described.clone()))?;

        if !self.store.delete::<SquadAssignment>(&current.id).await? {
            return Err(RegistryError::NotFound(described));
        }
        info!(id = %current.id, child = %request.child_id, "child unassigned");
        Ok(())
    }
}
