use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::{Fields, Filter, Record};

/// Attribute names a caller may not set through free-form extras.
const RESERVED_ATTRIBUTES: &[&str] = &[
    "id", "objectId", "version", "paid", "createdAt", "updatedAt", "ACL",
];

/// The natural key of a child: unique among all registered children.
///
/// Fields default to empty so a payload with a missing field still decodes
/// and is reported as a validation failure rather than a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessKey {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub birth_year: u16,
    #[serde(default)]
    pub gender: String,
}

impl BusinessKey {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        birth_year: u16,
        gender: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            birth_year,
            gender: gender.into(),
        }
    }

    /// Wire names of required fields that are empty or zero.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.first_name.trim().is_empty() {
            missing.push("firstName");
        }
        if self.last_name.trim().is_empty() {
            missing.push("lastName");
        }
        if self.birth_year == 0 {
            missing.push("birthYear");
        }
        if self.gender.trim().is_empty() {
            missing.push("gender");
        }
        missing
    }

    /// Lock-table key. Never persisted.
    ///
    /// Text fields are quoted and escaped, so a separator inside a name
    /// cannot make two different keys collide.
    pub fn lock_key(&self) -> String {
        format!(
            "child:{:?}|{:?}|{}|{:?}",
            self.first_name, self.last_name, self.birth_year, self.gender
        )
    }

    /// Equality filter selecting children with exactly this key.
    pub fn filter(&self) -> Filter {
        Filter::new()
            .eq("firstName", self.first_name.as_str())
            .eq("lastName", self.last_name.as_str())
            .eq("birthYear", self.birth_year)
            .eq("gender", self.gender.as_str())
    }
}

impl fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, {})",
            self.first_name, self.last_name, self.birth_year, self.gender
        )
    }
}

/// A registered child as stored in the `Child` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    #[serde(flatten)]
    pub key: BusinessKey,
    #[serde(default)]
    pub paid: bool,
    /// Extra attributes submitted at registration, stored as-is.
    #[serde(flatten)]
    pub attributes: Fields,
}

impl Child {
    /// A new, unpaid child. Reserved names are dropped from `attributes`.
    pub fn new(key: BusinessKey, mut attributes: Fields) -> Self {
        attributes.retain(|name, _| !RESERVED_ATTRIBUTES.contains(&name.as_str()));
        Self {
            key,
            paid: false,
            attributes,
        }
    }
}

impl Record for Child {
    const COLLECTION: &'static str = "Child";
}
