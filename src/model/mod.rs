//! Records persisted in the document store.

mod assignment;
mod child;

pub use assignment::SquadAssignment;
pub use child::{BusinessKey, Child};
