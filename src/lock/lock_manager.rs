use std::fmt;

use super::LockError;

/// Per-key mutual exclusion for one process.
///
/// `try_acquire` is non-blocking: `Ok(None)` means another request holds the
/// key right now. The returned [`LockGuard`] releases the key when dropped,
/// so every exit path of the critical section (early return, `?`, panic
/// unwind, a cancelled future) gives the key back exactly once.
///
/// Implementations only serialize callers inside the same process. A
/// deployment with several instances still needs the store itself to decide
/// races between them.
pub trait LockManager: Send + Sync {
    /// Take the slot for `key` if it is free.
    fn try_acquire(&self, key: &str) -> Result<Option<LockGuard>, LockError>;

    /// Number of keys that currently have a table entry.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Release = Box<dyn FnOnce() + Send>;

/// Proof of holding a key. Dropping it releases the key.
pub struct LockGuard {
    key: String,
    release: Option<Release>,
}

impl LockGuard {
    /// Build a guard that runs `release` once, on drop or on [`LockGuard::release`].
    pub fn new(key: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            key: key.into(),
            release: Some(Box::new(release)),
        }
    }

    /// The key this guard holds.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release early. Equivalent to dropping the guard.
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("released", &self.release.is_none())
            .finish()
    }
}
