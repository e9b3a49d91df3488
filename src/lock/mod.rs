//! Per-key, non-blocking mutual exclusion.
//!
//! Workflows that run a check-then-act sequence against the store take a
//! [`LockGuard`] for the business key first. A second request for the same
//! key is turned away immediately instead of waiting.

mod error;
mod in_memory;
#[allow(clippy::module_inception)]
mod lock;
mod lock_manager;

pub use error::LockError;
pub use in_memory::{InMemoryLock, InMemoryLockManager};
pub use lock::Lock;
pub use lock_manager::{LockGuard, LockManager};
