use serde::{Deserialize, Serialize};

use crate::store::{Filter, Record};

/// Placement of a child in a squad ("Riege") at a given position.
///
/// A child belongs to at most one squad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadAssignment {
    pub child_id: String,
    pub squad_id: String,
    pub position: u32,
}

impl SquadAssignment {
    /// Lock-table key. Assignments are serialized per child, since the
    /// one-squad-per-child rule spans every squad.
    pub fn lock_key(child_id: &str) -> String {
        format!("assignment:{child_id}")
    }

    pub fn child_filter(child_id: &str) -> Filter {
        Filter::new().eq("childId", child_id)
    }

    pub fn placement_filter(child_id: &str, squad_id: &str) -> Filter {
        Self::child_filter(child_id).eq("squadId", squad_id)
    }
}

impl Record for SquadAssignment {
    const COLLECTION: &'static str = "SquadAssignment";
}
